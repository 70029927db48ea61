use crate::store::{RecordStore, StoreError};
use crate::types::{GroupInput, Record};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A store whose every write fails. Counts the calls it receives.
#[derive(Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn batch_upsert(&self, _table: &str, _records: &[Record]) -> Result<usize, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("injected failure".into()))
    }

    async fn upsert(&self, _table: &str, _record: &Record) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("injected failure".into()))
    }

    fn is_ready(&self) -> bool {
        false
    }
}

pub fn group_inputs(groups: Value) -> Vec<GroupInput> {
    match groups {
        Value::Array(groups) => groups.into_iter().map(GroupInput::from_value).collect(),
        other => panic!("expected an array of groups, got {other}"),
    }
}
