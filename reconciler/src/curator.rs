use crate::metrics_defs::INVITE_LINKS_SELECTED;
use crate::reconcile::StageOutcome;
use crate::store::{RecordStore, WriteOutcome};
use crate::types::{GroupInput, INVITE_LINKS_PARTITION, InviteLinkRecord, Record};
use crate::validation::is_invite_eligible;
use serde::Deserialize;
use serde_json::Value;
use shared::histogram;
use std::cmp::Ordering;

pub const DEFAULT_DOMAIN: &str = "DEFAULT";

/// Order in which eligible groups are ranked by membership before selection.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankingPolicy {
    /// Smallest groups first.
    #[default]
    MembershipAscending,
    /// Most popular groups first.
    MembershipDescending,
}

pub const DEFAULT_RANKING: RankingPolicy = RankingPolicy::MembershipAscending;

impl RankingPolicy {
    fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            RankingPolicy::MembershipAscending => a.total_cmp(&b),
            RankingPolicy::MembershipDescending => b.total_cmp(&a),
        }
    }
}

/// How many ranked groups make it into the aggregate, by eligible count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionTiers {
    /// Above this many eligible groups, `large_take` are selected.
    pub large_threshold: usize,
    pub large_take: usize,
    /// Above this many (and up to `large_threshold`), `small_take` are selected.
    pub small_threshold: usize,
    pub small_take: usize,
}

pub const DEFAULT_TIERS: SelectionTiers = SelectionTiers {
    large_threshold: 10,
    large_take: 10,
    small_threshold: 2,
    small_take: 2,
};

impl SelectionTiers {
    pub fn select_count(&self, eligible: usize) -> usize {
        if eligible > self.large_threshold {
            self.large_take
        } else if eligible > self.small_threshold {
            self.small_take
        } else {
            eligible
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurationPolicy {
    pub ranking: RankingPolicy,
    pub tiers: SelectionTiers,
}

impl Default for CurationPolicy {
    fn default() -> Self {
        CurationPolicy {
            ranking: DEFAULT_RANKING,
            tiers: DEFAULT_TIERS,
        }
    }
}

/// `promos.com.br` becomes `PROMOS`. An empty domain falls back to `DEFAULT`.
pub fn domain_key(domain: &str) -> String {
    let domain = if domain.is_empty() {
        DEFAULT_DOMAIN
    } else {
        domain
    };
    let upper = domain.to_uppercase();
    match upper.split_once('.') {
        Some((head, _)) => head.to_string(),
        None => upper,
    }
}

/// `SK|Name|InviteCode`. Pipes inside the parts are not escaped.
pub fn composite_code(group: &GroupInput) -> String {
    format!(
        "{}|{}|{}",
        code_part(&group.sk),
        code_part(&group.name),
        code_part(&group.invite_code)
    )
}

// Absent parts are empty; other non-string values render as JSON.
fn code_part(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Picks the featured invite links for `domain`, or `None` when no group is eligible.
pub fn curate_invite_links(
    inputs: &[GroupInput],
    domain: &str,
    policy: &CurationPolicy,
    timestamp: &str,
) -> Option<InviteLinkRecord> {
    let mut eligible: Vec<(f64, &GroupInput)> = inputs
        .iter()
        .filter(|group| is_invite_eligible(group))
        .filter_map(|group| Some((group.total_members.as_f64()?, group)))
        .collect();

    if eligible.is_empty() {
        return None;
    }

    // Stable, so equal membership keeps submission order.
    eligible.sort_by(|(a, _), (b, _)| policy.ranking.compare(*a, *b));

    let take = policy.tiers.select_count(eligible.len());
    let invite_codes = eligible
        .iter()
        .take(take)
        .map(|(_, group)| composite_code(group))
        .collect();

    Some(InviteLinkRecord {
        pk: INVITE_LINKS_PARTITION.to_string(),
        sk: domain_key(domain),
        invite_codes,
        updated: timestamp.to_string(),
    })
}

pub async fn update_invite_links(
    store: &dyn RecordStore,
    table: &str,
    inputs: &[GroupInput],
    domain: &str,
    policy: &CurationPolicy,
    timestamp: &str,
) -> StageOutcome {
    let Some(record) = curate_invite_links(inputs, domain, policy, timestamp) else {
        tracing::error!(domain, "no valid groups with invite codes");
        return StageOutcome::NoValidRecords;
    };

    histogram!(INVITE_LINKS_SELECTED).record(record.invite_codes.len() as f64);
    let selected = record.invite_codes.len();
    let key = record.sk.clone();

    let outcome = WriteOutcome::from_single(store.upsert(table, &Record::from(record)).await);
    match &outcome.cause {
        Some(e) => tracing::error!(error = %e, domain = %key, "invite links write failed"),
        None => tracing::info!(domain = %key, selected, "invite links updated"),
    }

    StageOutcome::Written(outcome)
}
