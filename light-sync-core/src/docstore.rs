//! Document-store mirror for synchronised rules.
//!
//! [`DocumentStore::upsert`] replaces the document whose key field matches,
//! or inserts it, as one atomic step. [`JsonFileStore`] keeps each collection
//! as a JSON object in `<dir>/<collection>.json`; writes go to a temp file in
//! the same directory and are renamed over the previous file, so a failed
//! write leaves the old state intact.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{store_io_err, StoreError};
use crate::synchronise::SyncReport;

/// Collection and key field used for rules.
pub const RULE_COLLECTION: &str = "Rule";
pub const RULE_KEY: &str = "ruleClass";

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait DocumentStore {
    /// Insert `document`, replacing any document in `collection` whose
    /// `key_field` has the same value.
    fn upsert(&self, collection: &str, key_field: &str, document: Value)
        -> Result<(), StoreError>;

    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    fn load(&self, path: &Path) -> Result<BTreeMap<String, Value>, StoreError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| store_io_err(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, path: &Path, documents: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| store_io_err(&self.dir, e))?;
        let json = serde_json::to_string_pretty(documents)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| store_io_err(&self.dir, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| store_io_err(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| store_io_err(path, e.error))?;
        Ok(())
    }
}

impl DocumentStore for JsonFileStore {
    fn upsert(
        &self,
        collection: &str,
        key_field: &str,
        document: Value,
    ) -> Result<(), StoreError> {
        let key = document
            .get(key_field)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::MissingKey(key_field.to_string()))?
            .to_string();

        let path = self.collection_path(collection);
        let mut documents = self.load(&path)?;
        let replaced = documents.insert(key.clone(), document).is_some();
        self.save(&path, &documents)?;
        debug!(collection, key = %key, replaced, "Upserted document");
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.collection_path(collection);
        Ok(self.load(&path)?.remove(key))
    }
}

/// Mirror every applied rule change in `report` into `store`.
///
/// Returns the number of documents written. Stops at the first store error.
pub fn mirror_rules<S>(store: &S, report: &SyncReport) -> Result<usize, StoreError>
where
    S: DocumentStore + ?Sized,
{
    let mut written = 0;
    for record in report.change_log.iter().filter(|r| r.is_applied()) {
        store.upsert(
            RULE_COLLECTION,
            RULE_KEY,
            json!({ RULE_KEY: record.id, "sourceCode": record.content }),
        )?;
        written += 1;
    }
    info!(written, "Mirrored rules into document store");
    Ok(written)
}
