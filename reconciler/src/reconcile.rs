use crate::curator::{CurationPolicy, DEFAULT_DOMAIN, update_invite_links};
use crate::metrics_defs::{RECONCILE_DURATION, STAGE_OUTCOMES};
use crate::normalizer::update_groups;
use crate::store::{RecordStore, WriteOutcome};
use crate::types::{GroupInput, now_timestamp};
use serde::Deserialize;
use serde_json::Value;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

#[derive(thiserror::Error, Debug)]
pub enum PayloadError {
    #[error("Missing request body")]
    MissingBody,

    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid groups data")]
    InvalidGroups,

    #[error("Invalid domain")]
    InvalidDomain,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    groups: Value,
    #[serde(default)]
    domain: Value,
}

/// A parsed batch submission: at least one group and a domain.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconcilePayload {
    pub groups: Vec<GroupInput>,
    pub domain: String,
}

impl ReconcilePayload {
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        if body.is_empty() {
            return Err(PayloadError::MissingBody);
        }
        let raw: RawPayload = serde_json::from_slice(body)?;

        let groups = match raw.groups {
            Value::Array(groups) if !groups.is_empty() => {
                groups.into_iter().map(GroupInput::from_value).collect()
            }
            _ => return Err(PayloadError::InvalidGroups),
        };

        let domain = match raw.domain {
            Value::Null => DEFAULT_DOMAIN.to_string(),
            Value::String(domain) if domain.is_empty() => DEFAULT_DOMAIN.to_string(),
            Value::String(domain) => domain,
            _ => return Err(PayloadError::InvalidDomain),
        };

        Ok(ReconcilePayload { groups, domain })
    }
}

/// What one stage of a reconcile did.
#[derive(Debug)]
pub enum StageOutcome {
    /// Nothing in the batch qualified, so nothing was written.
    NoValidRecords,
    Written(WriteOutcome),
}

impl StageOutcome {
    pub fn succeeded(&self) -> bool {
        match self {
            StageOutcome::NoValidRecords => false,
            StageOutcome::Written(outcome) => outcome.succeeded,
        }
    }

    pub fn unprocessed_count(&self) -> usize {
        match self {
            StageOutcome::NoValidRecords => 0,
            StageOutcome::Written(outcome) => outcome.unprocessed_count,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            StageOutcome::NoValidRecords => "no_valid_records",
            StageOutcome::Written(outcome) if outcome.cause.is_some() => "failed",
            StageOutcome::Written(outcome) if !outcome.succeeded => "partial",
            StageOutcome::Written(_) => "succeeded",
        }
    }
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    pub groups: StageOutcome,
    pub invite_links: StageOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileStatus {
    Success,
    /// Exactly one of the two stages succeeded.
    Partial,
    Failure,
}

impl ReconcileOutcome {
    pub fn status(&self) -> ReconcileStatus {
        match (self.groups.succeeded(), self.invite_links.succeeded()) {
            (true, true) => ReconcileStatus::Success,
            (false, false) => ReconcileStatus::Failure,
            _ => ReconcileStatus::Partial,
        }
    }
}

/// Runs both stages of a batch against an explicitly supplied store.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    table: String,
    policy: CurationPolicy,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, table: impl Into<String>, policy: CurationPolicy) -> Self {
        Reconciler {
            store,
            table: table.into(),
            policy,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_ready()
    }

    pub async fn reconcile(&self, payload: &ReconcilePayload) -> ReconcileOutcome {
        let start = Instant::now();
        let timestamp = now_timestamp();

        // The stages are independent; neither outcome affects the other.
        let (groups, invite_links) = tokio::join!(
            update_groups(self.store.as_ref(), &self.table, &payload.groups, &timestamp),
            update_invite_links(
                self.store.as_ref(),
                &self.table,
                &payload.groups,
                &payload.domain,
                &self.policy,
                &timestamp,
            ),
        );

        counter!(STAGE_OUTCOMES, "stage" => "groups", "outcome" => groups.label()).increment(1);
        counter!(STAGE_OUTCOMES, "stage" => "invite_links", "outcome" => invite_links.label())
            .increment(1);

        let outcome = ReconcileOutcome {
            groups,
            invite_links,
        };
        let status = outcome.status();
        histogram!(RECONCILE_DURATION, "status" => status.as_str())
            .record(start.elapsed().as_secs_f64());
        tracing::info!(
            groups = payload.groups.len(),
            domain = %payload.domain,
            status = status.as_str(),
            "reconciled batch"
        );

        outcome
    }
}

impl ReconcileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileStatus::Success => "success",
            ReconcileStatus::Partial => "partial",
            ReconcileStatus::Failure => "failure",
        }
    }
}
