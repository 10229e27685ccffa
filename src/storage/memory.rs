//! In-process document store
//!
//! Holds every database in ordered maps behind one lock. When opened with a
//! snapshot path, the full state is rewritten to that JSON file after each
//! successful mutation and reloaded on the next open.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::document::{Document, KeyFilter, Payload, WriteOp};
use super::store::DocumentStore;
use super::value::Value;
use crate::error::{Error, Result};
use tracing::debug;

type Collection = BTreeMap<Value, Payload>;
type Database = BTreeMap<String, Collection>;

/// Prior state of one thing a write batch touched
#[derive(Debug)]
enum Undo {
    /// Collection created implicitly by the batch
    Collection(String),
    /// Payload under `id` before the op ran; `None` if the key was absent
    Entry {
        collection: String,
        id: Value,
        prior: Option<Payload>,
    },
}

/// Ordered in-memory store with an optional JSON snapshot
#[derive(Debug, Default)]
pub struct MemoryStore {
    databases: RwLock<BTreeMap<String, Database>>,
    snapshot: Option<PathBuf>,
}

/// On-disk form of the store; keys are typed values, so collections are
/// written as document lists rather than JSON objects
#[derive(Serialize, Deserialize)]
struct SnapshotData {
    databases: BTreeMap<String, BTreeMap<String, Vec<Document>>>,
}

impl MemoryStore {
    /// Create an empty store that is never written to disk
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a snapshot file, loading it if it exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let databases = if path.exists() {
            Self::load_from_disk(&path)?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), databases = databases.len(), "opened store snapshot");
        Ok(Self {
            databases: RwLock::new(databases),
            snapshot: Some(path),
        })
    }

    fn load_from_disk(path: &Path) -> Result<BTreeMap<String, Database>> {
        let json = std::fs::read_to_string(path)?;
        let data: SnapshotData = serde_json::from_str(&json)?;

        let mut databases = BTreeMap::new();
        for (db_name, collections) in data.databases {
            let mut db = Database::new();
            for (name, docs) in collections {
                let collection = docs.into_iter().map(|d| (d.id, d.payload)).collect();
                db.insert(name, collection);
            }
            databases.insert(db_name, db);
        }
        Ok(databases)
    }

    fn save_to_disk(&self, databases: &BTreeMap<String, Database>) -> Result<()> {
        let path = match &self.snapshot {
            Some(path) => path,
            None => return Ok(()),
        };

        let data = SnapshotData {
            databases: databases
                .iter()
                .map(|(db_name, db)| {
                    let collections = db
                        .iter()
                        .map(|(name, coll)| {
                            let docs = coll
                                .iter()
                                .map(|(id, payload)| Document {
                                    id: id.clone(),
                                    payload: payload.clone(),
                                })
                                .collect();
                            (name.clone(), docs)
                        })
                        .collect();
                    (db_name.clone(), collections)
                })
                .collect(),
        };

        let json = serde_json::to_string(&data)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Database>>> {
        self.databases
            .read()
            .map_err(|_| Error::Internal("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Database>>> {
        self.databases
            .write()
            .map_err(|_| Error::Internal("store lock poisoned".to_string()))
    }

    /// Apply a batch in place, logging how to undo each step
    fn apply_logged(database: &mut Database, ops: &[WriteOp], undo: &mut Vec<Undo>) -> Result<()> {
        for op in ops {
            let name = op.collection();
            if !database.contains_key(name) {
                database.insert(name.to_string(), Collection::new());
                undo.push(Undo::Collection(name.to_string()));
            }
            if let Some(collection) = database.get_mut(name) {
                let id = op.key();
                undo.push(Undo::Entry {
                    collection: name.to_string(),
                    id: id.clone(),
                    prior: collection.get(id).cloned(),
                });
                Self::apply_one(collection, op)?;
            }
        }
        Ok(())
    }

    /// Replay an undo log backwards
    fn rollback(database: &mut Database, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            match step {
                Undo::Collection(name) => {
                    database.remove(&name);
                }
                Undo::Entry {
                    collection,
                    id,
                    prior,
                } => {
                    if let Some(coll) = database.get_mut(&collection) {
                        match prior {
                            Some(payload) => coll.insert(id, payload),
                            None => coll.remove(&id),
                        };
                    }
                }
            }
        }
    }

    /// Apply one operation to a collection; fails before mutating anything
    fn apply_one(collection: &mut Collection, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::InsertOne { collection: name, doc } => {
                if collection.contains_key(&doc.id) {
                    return Err(Error::DuplicateKey {
                        collection: name.clone(),
                        key: doc.id.to_string(),
                    });
                }
                collection.insert(doc.id.clone(), doc.payload.clone());
            }
            WriteOp::DeleteOne { id, .. } => {
                collection.remove(id);
            }
            WriteOp::Push {
                collection: name,
                id,
                value,
            } => match collection.get_mut(id) {
                Some(Payload::RowIds(ids)) => ids.push(value.clone()),
                _ => {
                    return Err(Error::Storage(format!(
                        "no index entry '{}' in collection '{}'",
                        id, name
                    )))
                }
            },
            WriteOp::Pull {
                collection: name,
                id,
                value,
            } => match collection.get_mut(id) {
                Some(Payload::RowIds(ids)) => ids.retain(|v| v != value),
                _ => {
                    return Err(Error::Storage(format!(
                        "no index entry '{}' in collection '{}'",
                        id, name
                    )))
                }
            },
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn list_databases(&self) -> Result<Vec<String>> {
        let databases = self.read()?;
        Ok(databases
            .iter()
            .filter(|(_, db)| !db.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn create_collection(&self, db: &str, collection: &str) -> Result<()> {
        let mut databases = self.write()?;
        let database = databases.entry(db.to_string()).or_default();
        if database.contains_key(collection) {
            return Ok(());
        }
        database.insert(collection.to_string(), Collection::new());
        self.save_to_disk(&databases)
    }

    fn drop_collection(&self, db: &str, collection: &str) -> Result<bool> {
        let mut databases = self.write()?;
        let existed = match databases.get_mut(db) {
            Some(database) => database.remove(collection).is_some(),
            None => false,
        };
        if let Some(database) = databases.get(db) {
            if database.is_empty() {
                databases.remove(db);
            }
        }
        if existed {
            self.save_to_disk(&databases)?;
        }
        Ok(existed)
    }

    fn drop_database(&self, db: &str) -> Result<()> {
        let mut databases = self.write()?;
        if databases.remove(db).is_some() {
            self.save_to_disk(&databases)?;
        }
        Ok(())
    }

    fn list_collections(&self, db: &str) -> Result<Vec<String>> {
        let databases = self.read()?;
        Ok(databases
            .get(db)
            .map(|database| database.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn find(&self, db: &str, collection: &str, filter: &KeyFilter) -> Result<Vec<Document>> {
        let databases = self.read()?;
        let coll = match databases.get(db).and_then(|d| d.get(collection)) {
            Some(coll) => coll,
            None => return Ok(Vec::new()),
        };

        let to_doc = |(id, payload): (&Value, &Payload)| Document {
            id: id.clone(),
            payload: payload.clone(),
        };

        let docs = match filter {
            KeyFilter::In(keys) => keys
                .iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .filter_map(|key| coll.get_key_value(key))
                .map(to_doc)
                .collect(),
            KeyFilter::Ne(v) => coll
                .range::<Value, _>((Bound::Unbounded, Bound::Excluded(v)))
                .chain(coll.range::<Value, _>((Bound::Excluded(v), Bound::Unbounded)))
                .map(to_doc)
                .collect(),
            _ => match filter.bounds() {
                Some(bounds) => coll.range::<Value, _>(bounds).map(to_doc).collect(),
                None => coll
                    .iter()
                    .filter(|(id, _)| filter.matches(id))
                    .map(to_doc)
                    .collect(),
            },
        };
        Ok(docs)
    }

    fn find_one(&self, db: &str, collection: &str, id: &Value) -> Result<Option<Document>> {
        let databases = self.read()?;
        Ok(databases
            .get(db)
            .and_then(|d| d.get(collection))
            .and_then(|coll| coll.get(id))
            .map(|payload| Document {
                id: id.clone(),
                payload: payload.clone(),
            }))
    }

    fn count_documents(&self, db: &str, collection: &str) -> Result<usize> {
        let databases = self.read()?;
        Ok(databases
            .get(db)
            .and_then(|d| d.get(collection))
            .map(|coll| coll.len())
            .unwrap_or(0))
    }

    fn apply(&self, db: &str, ops: &[WriteOp]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut databases = self.write()?;
        let created_db = !databases.contains_key(db);

        let mut undo = Vec::with_capacity(ops.len());
        let applied = Self::apply_logged(
            databases.entry(db.to_string()).or_default(),
            ops,
            &mut undo,
        );
        let result = match applied {
            Ok(()) => self.save_to_disk(&databases),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Some(database) = databases.get_mut(db) {
                Self::rollback(database, undo);
            }
            if created_db {
                databases.remove(db);
            }
            debug!(database = db, ops = ops.len(), "rolled back write batch");
            return Err(e);
        }
        Ok(())
    }
}
