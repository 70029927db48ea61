//! Record stores are the key-value collaborators the reconciler writes to.
//! The reconciler only issues writes; each store decides how much of a batch
//! it applies and reports the remainder as unprocessed.

use crate::config::StoreType;
use crate::types::{Record, RecordKey};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Best-effort bulk write. Returns the number of records that were not applied.
    async fn batch_upsert(&self, table: &str, records: &[Record]) -> Result<usize, StoreError>;

    /// Replaces a single record.
    async fn upsert(&self, table: &str, record: &Record) -> Result<(), StoreError>;

    fn is_ready(&self) -> bool {
        true
    }
}

/// The result of one store call, independent of the store's own response shape.
#[derive(Debug)]
pub struct WriteOutcome {
    pub succeeded: bool,
    pub unprocessed_count: usize,
    pub cause: Option<StoreError>,
}

impl WriteOutcome {
    pub fn from_batch(result: Result<usize, StoreError>, submitted: usize) -> Self {
        match result {
            Ok(unprocessed_count) => WriteOutcome {
                succeeded: unprocessed_count == 0,
                unprocessed_count,
                cause: None,
            },
            Err(e) => WriteOutcome {
                succeeded: false,
                unprocessed_count: submitted,
                cause: Some(e),
            },
        }
    }

    pub fn from_single(result: Result<(), StoreError>) -> Self {
        WriteOutcome::from_batch(result.map(|()| 0), 1)
    }
}

pub async fn get_store(store_type: &StoreType) -> Result<Arc<dyn RecordStore>, StoreError> {
    let store: Arc<dyn RecordStore> = match store_type {
        StoreType::Memory { max_batch_items } => {
            Arc::new(MemoryStore::new().with_max_batch_items(*max_batch_items))
        }
        StoreType::Filesystem { base_dir } => Arc::new(FilesystemStore::new(base_dir).await?),
    };
    Ok(store)
}

type Table = BTreeMap<RecordKey, Record>;

fn apply(table: &mut Table, records: &[Record]) {
    for record in records {
        table.insert(record.key(), record.clone());
    }
}

/// Keeps every table in process memory. Tables are created on first write.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
    max_batch_items: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records past this position in a batch are left unprocessed.
    pub fn with_max_batch_items(mut self, max_batch_items: Option<usize>) -> Self {
        self.max_batch_items = max_batch_items;
        self
    }

    pub async fn get(&self, table: &str, pk: &str, sk: &str) -> Option<Record> {
        let key = RecordKey {
            pk: pk.to_string(),
            sk: sk.to_string(),
        };
        self.tables.lock().await.get(table)?.get(&key).cloned()
    }

    /// All records of a table ordered by key.
    pub async fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn batch_upsert(&self, table: &str, records: &[Record]) -> Result<usize, StoreError> {
        let accepted = self
            .max_batch_items
            .map_or(records.len(), |max| max.min(records.len()));

        let mut tables = self.tables.lock().await;
        apply(tables.entry(table.to_string()).or_default(), &records[..accepted]);

        Ok(records.len() - accepted)
    }

    async fn upsert(&self, table: &str, record: &Record) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        apply(
            tables.entry(table.to_string()).or_default(),
            std::slice::from_ref(record),
        );
        Ok(())
    }
}

/// Persists each table as a JSON array in `{base_dir}/{table}.json`.
pub struct FilesystemStore {
    base_dir: PathBuf,
    // Serializes read-modify-write cycles on the table files.
    lock: Mutex<()>,
}

impl FilesystemStore {
    pub async fn new(base_dir: &str) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(base_dir).await?;
        Ok(FilesystemStore {
            base_dir: PathBuf::from(base_dir),
            lock: Mutex::new(()),
        })
    }

    fn table_path(&self, table: &str) -> Result<PathBuf, StoreError> {
        if table.is_empty() || table.contains(['/', '\\']) || table.starts_with('.') {
            return Err(StoreError::UnknownTable(table.to_string()));
        }
        Ok(self.base_dir.join(format!("{table}.json")))
    }

    async fn load(path: &Path) -> Result<Table, StoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Table::new()),
            Err(e) => return Err(e.into()),
        };
        let records: Vec<Record> = serde_json::from_slice(&bytes)?;
        let mut table = Table::new();
        apply(&mut table, &records);
        Ok(table)
    }

    async fn store(path: &Path, table: &Table) -> Result<(), StoreError> {
        let records: Vec<&Record> = table.values().collect();
        let bytes = serde_json::to_vec_pretty(&records)?;

        // Write next to the target and rename so readers never see a partial file.
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "stored table");
        Ok(())
    }

    async fn write(&self, table: &str, records: &[Record]) -> Result<(), StoreError> {
        let path = self.table_path(table)?;
        let _guard = self.lock.lock().await;

        let mut contents = Self::load(&path).await?;
        apply(&mut contents, records);
        Self::store(&path, &contents).await
    }

    pub async fn records(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let path = self.table_path(table)?;
        let _guard = self.lock.lock().await;
        Ok(Self::load(&path).await?.into_values().collect())
    }
}

#[async_trait]
impl RecordStore for FilesystemStore {
    async fn batch_upsert(&self, table: &str, records: &[Record]) -> Result<usize, StoreError> {
        self.write(table, records).await?;
        Ok(0)
    }

    async fn upsert(&self, table: &str, record: &Record) -> Result<(), StoreError> {
        self.write(table, std::slice::from_ref(record)).await
    }

    // Checked on every probe so a removed directory reports not ready.
    fn is_ready(&self) -> bool {
        self.base_dir.is_dir()
    }
}
