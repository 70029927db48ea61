use crate::metrics_defs::{GROUPS_REJECTED, GROUPS_STORED};
use crate::reconcile::StageOutcome;
use crate::store::{RecordStore, WriteOutcome};
use crate::types::{GROUP_PARTITION, GroupInput, GroupRecord, Record};
use crate::validation::is_storable_group;
use shared::counter;

/// Lazily turns the storable inputs into group records. Inputs without an
/// `Updated` value get `timestamp`, which is shared by the whole batch.
pub fn normalize_groups<'a>(
    inputs: &'a [GroupInput],
    timestamp: &'a str,
) -> impl Iterator<Item = GroupRecord> + 'a {
    inputs
        .iter()
        .filter(|group| is_storable_group(group))
        .filter_map(move |group| {
            Some(GroupRecord {
                pk: GROUP_PARTITION.to_string(),
                sk: group.sk()?.to_string(),
                name: group.name()?.to_string(),
                invite_code: group.invite_code().unwrap_or_default().to_string(),
                total_members: group.member_count()?,
                updated: group.updated().unwrap_or(timestamp).to_string(),
            })
        })
}

/// Normalizes the batch and writes every resulting record in one batch call.
pub async fn update_groups(
    store: &dyn RecordStore,
    table: &str,
    inputs: &[GroupInput],
    timestamp: &str,
) -> StageOutcome {
    let records: Vec<Record> = normalize_groups(inputs, timestamp)
        .map(Record::from)
        .collect();

    let rejected = inputs.len() - records.len();
    if rejected > 0 {
        counter!(GROUPS_REJECTED).increment(rejected as u64);
    }

    if records.is_empty() {
        tracing::error!(submitted = inputs.len(), "no valid groups to update");
        return StageOutcome::NoValidRecords;
    }

    let outcome = WriteOutcome::from_batch(store.batch_upsert(table, &records).await, records.len());
    counter!(GROUPS_STORED).increment((records.len() - outcome.unprocessed_count) as u64);

    match &outcome.cause {
        Some(e) => tracing::error!(error = %e, table, "group batch write failed"),
        None if outcome.unprocessed_count > 0 => tracing::warn!(
            unprocessed = outcome.unprocessed_count,
            submitted = records.len(),
            "group batch write left records unprocessed"
        ),
        None => tracing::info!(stored = records.len(), rejected, "groups updated"),
    }

    StageOutcome::Written(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testutils::{FailingStore, group_inputs};
    use serde_json::json;

    const NOW: &str = "2024-05-01T12:00:00.000Z";

    #[test]
    fn test_normalize_groups_defaults() {
        let inputs = group_inputs(json!([
            {"SK": "1@g.us", "Name": "One", "TotalMembers": 10},
            {"SK": "2@g.us", "Name": "Two", "TotalMembers": 20, "InviteCode": "abc",
             "Updated": "2023-01-01T00:00:00.000Z"},
        ]));

        let records: Vec<_> = normalize_groups(&inputs, NOW).collect();
        assert_eq!(
            records,
            vec![
                GroupRecord {
                    pk: "WHATSAPP#GROUP".into(),
                    sk: "1@g.us".into(),
                    name: "One".into(),
                    invite_code: "".into(),
                    total_members: 10,
                    updated: NOW.into(),
                },
                GroupRecord {
                    pk: "WHATSAPP#GROUP".into(),
                    sk: "2@g.us".into(),
                    name: "Two".into(),
                    invite_code: "abc".into(),
                    total_members: 20,
                    updated: "2023-01-01T00:00:00.000Z".into(),
                },
            ]
        );
    }

    #[test]
    fn test_normalize_groups_drops_invalid() {
        let inputs = group_inputs(json!([
            {"SK": "", "Name": "One", "TotalMembers": 10},
            {"SK": "2@g.us", "Name": " ", "TotalMembers": 10},
            {"SK": "3@g.us", "Name": "Three", "TotalMembers": -1},
            {"SK": "4@g.us", "Name": "Four"},
            "not a group",
            {"SK": "5@g.us", "Name": "Five", "TotalMembers": 0, "InviteCode": 99},
        ]));

        let records: Vec<_> = normalize_groups(&inputs, NOW).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sk, "5@g.us");
        assert_eq!(records[0].invite_code, "");
    }

    #[test]
    fn test_normalize_groups_accepts_integral_floats() {
        let inputs = group_inputs(json!([
            {"SK": "1@g.us", "Name": "One", "TotalMembers": 10.0},
            {"SK": "2@g.us", "Name": "Two", "TotalMembers": -0.0},
            {"SK": "3@g.us", "Name": "Three", "TotalMembers": 2.5},
            {"SK": "4@g.us", "Name": "Four", "TotalMembers": -1.0},
        ]));
        let counts: Vec<_> = normalize_groups(&inputs, NOW)
            .map(|record| (record.sk, record.total_members))
            .collect();
        assert_eq!(counts, vec![("1@g.us".into(), 10), ("2@g.us".into(), 0)]);

        let raw: serde_json::Value =
            serde_json::from_str(r#"[{"SK": "5@g.us", "Name": "Five", "TotalMembers": -0}]"#)
                .unwrap();
        let inputs = group_inputs(raw);
        let records: Vec<_> = normalize_groups(&inputs, NOW).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_members, 0);
    }

    #[test]
    fn test_normalize_groups_is_idempotent() {
        let inputs = group_inputs(json!([
            {"SK": "1@g.us", "Name": "One", "TotalMembers": 10, "InviteCode": "x"},
        ]));
        let first = serde_json::to_vec(&normalize_groups(&inputs, NOW).collect::<Vec<_>>()).unwrap();
        let second =
            serde_json::to_vec(&normalize_groups(&inputs, NOW).collect::<Vec<_>>()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_update_groups_writes_batch() {
        let store = MemoryStore::new();
        let inputs = group_inputs(json!([
            {"SK": "1@g.us", "Name": "One", "TotalMembers": 10},
            {"SK": "2@g.us", "Name": "Two", "TotalMembers": -10},
            {"SK": "3@g.us", "Name": "Three", "TotalMembers": 30},
        ]));

        let outcome = update_groups(&store, "groups", &inputs, NOW).await;
        assert!(outcome.succeeded());
        assert_eq!(store.records("groups").await.len(), 2);
        assert!(store.get("groups", GROUP_PARTITION, "2@g.us").await.is_none());
    }

    #[tokio::test]
    async fn test_update_groups_without_valid_groups_skips_store() {
        let store = FailingStore::default();
        let inputs = group_inputs(json!([{"SK": "1@g.us"}]));

        let outcome = update_groups(&store, "groups", &inputs, NOW).await;
        assert!(matches!(outcome, StageOutcome::NoValidRecords));
        assert_eq!(store.calls(), 0);

        let outcome = update_groups(&store, "groups", &[], NOW).await;
        assert!(matches!(outcome, StageOutcome::NoValidRecords));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_update_groups_reports_partial_writes() {
        let store = MemoryStore::new().with_max_batch_items(Some(1));
        let inputs = group_inputs(json!([
            {"SK": "1@g.us", "Name": "One", "TotalMembers": 10},
            {"SK": "2@g.us", "Name": "Two", "TotalMembers": 20},
        ]));

        let StageOutcome::Written(outcome) = update_groups(&store, "groups", &inputs, NOW).await
        else {
            panic!("expected a write");
        };
        assert!(!outcome.succeeded);
        assert_eq!(outcome.unprocessed_count, 1);
    }

    #[tokio::test]
    async fn test_update_groups_store_failure() {
        let store = FailingStore::default();
        let inputs = group_inputs(json!([
            {"SK": "1@g.us", "Name": "One", "TotalMembers": 10},
        ]));

        let StageOutcome::Written(outcome) = update_groups(&store, "groups", &inputs, NOW).await
        else {
            panic!("expected a write");
        };
        assert!(!outcome.succeeded);
        assert!(outcome.cause.is_some());
        assert_eq!(store.calls(), 1);
    }
}
