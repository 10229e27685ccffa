//! Secondary index maintenance and lookup
//!
//! Every indexed column other than the row id owns a collection named
//! `index_<table>.<column>` whose documents map one column value to the ids
//! of the rows holding it. The row-id column is served by the base
//! collection itself.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::catalog::{index_collection_name, Column, TableDef};
use crate::error::Result;
use crate::protocol::Operator;
use crate::storage::{Document, DocumentStore, KeyFilter, Row, Value, WriteOp};

/// Conditions on one column, resolved together
pub type ColumnConditions = (String, Vec<(Operator, Value)>);

/// Key filter equivalent to `key <op> value`
pub fn key_filter(op: Operator, value: &Value) -> KeyFilter {
    let value = value.clone();
    match op {
        Operator::Eq => KeyFilter::Eq(value),
        Operator::Lt => KeyFilter::Lt(value),
        Operator::Gt => KeyFilter::Gt(value),
        Operator::Le => KeyFilter::Le(value),
        Operator::Ge => KeyFilter::Ge(value),
        Operator::Ne => KeyFilter::Ne(value),
    }
}

/// Index manager bound to one database
pub struct IndexManager<'a> {
    store: &'a dyn DocumentStore,
    database: &'a str,
}

impl<'a> IndexManager<'a> {
    pub fn new(store: &'a dyn DocumentStore, database: &'a str) -> Self {
        Self { store, database }
    }

    // ========== Maintenance ==========

    /// Index writes that accompany inserting `row`
    pub fn on_insert(&self, table: &TableDef, row: &Row) -> Result<Vec<WriteOp>> {
        let mut ops = Vec::new();
        for column in table.secondary_indexes() {
            let Some(value) = row.get(column.position) else {
                continue;
            };
            let collection = index_collection_name(table.name(), &column.name);
            let existing = self.store.find_one(self.database, &collection, value)?;
            let op = match existing {
                Some(_) => WriteOp::Push {
                    collection,
                    id: value.clone(),
                    value: row.id().clone(),
                },
                None => WriteOp::InsertOne {
                    collection,
                    doc: Document::row_ids(value.clone(), vec![row.id().clone()]),
                },
            };
            ops.push(op);
        }
        Ok(ops)
    }

    /// Index writes that accompany deleting `row`
    pub fn on_delete(&self, table: &TableDef, row: &Row) -> Result<Vec<WriteOp>> {
        let mut ops = Vec::new();
        for column in table.secondary_indexes() {
            let Some(value) = row.get(column.position) else {
                continue;
            };
            let collection = index_collection_name(table.name(), &column.name);
            let entry = self.store.find_one(self.database, &collection, value)?;
            let ids = match entry.as_ref().and_then(|doc| doc.payload.as_row_ids()) {
                Some(ids) => ids,
                None => {
                    warn!(
                        table = table.name(),
                        column = %column.name,
                        value = %value,
                        "index entry missing for deleted row"
                    );
                    continue;
                }
            };

            let op = if ids.iter().all(|id| id == row.id()) {
                WriteOp::DeleteOne {
                    collection,
                    id: value.clone(),
                }
            } else {
                WriteOp::Pull {
                    collection,
                    id: value.clone(),
                    value: row.id().clone(),
                }
            };
            ops.push(op);
        }
        Ok(ops)
    }

    /// Populate the index of a newly indexed column from the table's rows
    pub fn build(&self, table: &TableDef, column: &Column) -> Result<()> {
        if column.is_row_id() {
            return Ok(());
        }

        let collection = index_collection_name(table.name(), &column.name);
        let mut entries: BTreeMap<Value, Vec<Value>> = BTreeMap::new();
        for row in Row::scan(self.store, self.database, table, &KeyFilter::All)? {
            if let Some(value) = row.get(column.position) {
                entries
                    .entry(value.clone())
                    .or_default()
                    .push(row.id().clone());
            }
        }

        self.store.create_collection(self.database, &collection)?;
        let ops: Vec<WriteOp> = entries
            .into_iter()
            .map(|(value, ids)| WriteOp::InsertOne {
                collection: collection.clone(),
                doc: Document::row_ids(value, ids),
            })
            .collect();
        debug!(collection = %collection, entries = ops.len(), "built index");
        self.store.apply(self.database, &ops)
    }

    /// Drop every index collection of a table
    pub fn drop_all(&self, table: &TableDef) -> Result<()> {
        for column in table.secondary_indexes() {
            let collection = index_collection_name(table.name(), &column.name);
            self.store.drop_collection(self.database, &collection)?;
        }
        Ok(())
    }

    // ========== Lookup ==========

    /// Row ids whose `column` value satisfies `<op> value`
    pub fn lookup(
        &self,
        table: &TableDef,
        column: &Column,
        op: Operator,
        value: &Value,
    ) -> Result<BTreeSet<Value>> {
        let filter = key_filter(op, value);
        if column.is_row_id() {
            let docs = self.store.find(self.database, table.name(), &filter)?;
            return Ok(docs.into_iter().map(|doc| doc.id).collect());
        }

        let collection = index_collection_name(table.name(), &column.name);
        let docs = self.store.find(self.database, &collection, &filter)?;
        Ok(docs
            .iter()
            .filter_map(|doc| doc.payload.as_row_ids())
            .flat_map(|ids| ids.iter().cloned())
            .collect())
    }

    /// Does any row hold `value` in `column`?
    pub fn contains(&self, table: &TableDef, column: &Column, value: &Value) -> Result<bool> {
        if column.is_row_id() {
            return Ok(self
                .store
                .find_one(self.database, table.name(), value)?
                .is_some());
        }
        let collection = index_collection_name(table.name(), &column.name);
        Ok(self
            .store
            .find_one(self.database, &collection, value)?
            .and_then(|doc| doc.payload.as_row_ids().map(|ids| !ids.is_empty()))
            .unwrap_or(false))
    }

    /// Row ids satisfying every condition on one column
    pub fn lookup_all(
        &self,
        table: &TableDef,
        column: &Column,
        conditions: &[(Operator, Value)],
    ) -> Result<BTreeSet<Value>> {
        let mut result: Option<BTreeSet<Value>> = None;
        for (op, value) in conditions {
            let ids = self.lookup(table, column, *op, value)?;
            let merged = match result {
                Some(acc) => acc.intersection(&ids).cloned().collect(),
                None => ids,
            };
            if merged.is_empty() {
                return Ok(BTreeSet::new());
            }
            result = Some(merged);
        }
        Ok(result.unwrap_or_default())
    }

    /// Row ids satisfying every condition on every listed column.
    ///
    /// Returns `None` when no column is listed, meaning "no restriction".
    pub fn resolve(
        &self,
        table: &TableDef,
        columns: &[ColumnConditions],
    ) -> Result<Option<BTreeSet<Value>>> {
        let mut result: Option<BTreeSet<Value>> = None;
        for (name, conditions) in columns {
            let column = table.column(name)?;
            let ids = self.lookup_all(table, column, conditions)?;
            let merged = match result {
                Some(acc) => acc.intersection(&ids).cloned().collect(),
                None => ids,
            };
            if merged.is_empty() {
                return Ok(Some(BTreeSet::new()));
            }
            result = Some(merged);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::storage::MemoryStore;

    const DB: &str = "db";

    fn table() -> TableDef {
        let mut table = TableDef::new(
            "pets",
            vec![
                ("id".to_string(), DataType::Int),
                ("kind".to_string(), DataType::String),
                ("age".to_string(), DataType::Int),
            ],
        )
        .unwrap();
        table.column_mut("kind").unwrap().indexed = true;
        table.column_mut("age").unwrap().indexed = true;
        table
    }

    fn insert(store: &MemoryStore, table: &TableDef, id: i64, kind: &str, age: i64) -> Row {
        let row = Row::new(vec![Value::Int(id), Value::from(kind), Value::Int(age)]);
        let manager = IndexManager::new(store, DB);
        let mut ops = vec![WriteOp::InsertOne {
            collection: table.name().to_string(),
            doc: row.to_document(),
        }];
        ops.extend(manager.on_insert(table, &row).unwrap());
        store.apply(DB, &ops).unwrap();
        row
    }

    fn ids(values: &[i64]) -> BTreeSet<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    #[test]
    fn test_insert_maintains_entries() {
        let store = MemoryStore::new();
        let table = table();
        insert(&store, &table, 1, "cat", 3);
        insert(&store, &table, 2, "cat", 5);
        insert(&store, &table, 3, "dog", 3);

        let manager = IndexManager::new(&store, DB);
        let kind = table.column("kind").unwrap();
        assert_eq!(
            manager.lookup(&table, kind, Operator::Eq, &Value::from("cat")).unwrap(),
            ids(&[1, 2])
        );
        assert_eq!(
            manager.lookup(&table, kind, Operator::Ne, &Value::from("cat")).unwrap(),
            ids(&[3])
        );
        assert!(manager.contains(&table, kind, &Value::from("dog")).unwrap());
        assert!(!manager.contains(&table, kind, &Value::from("eel")).unwrap());
    }

    #[test]
    fn test_delete_removes_empty_entries() {
        let store = MemoryStore::new();
        let table = table();
        let first = insert(&store, &table, 1, "cat", 3);
        insert(&store, &table, 2, "cat", 4);

        let manager = IndexManager::new(&store, DB);
        let mut ops = vec![WriteOp::DeleteOne {
            collection: "pets".to_string(),
            id: Value::Int(1),
        }];
        ops.extend(manager.on_delete(&table, &first).unwrap());
        store.apply(DB, &ops).unwrap();

        let cat = store
            .find_one(DB, "index_pets.kind", &Value::from("cat"))
            .unwrap()
            .unwrap();
        assert_eq!(cat.payload.as_row_ids(), Some(&[Value::Int(2)][..]));
        assert!(store
            .find_one(DB, "index_pets.age", &Value::Int(3))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_same_column_conditions_intersect() {
        let store = MemoryStore::new();
        let table = table();
        for (id, age) in [(1, 1), (2, 4), (3, 6), (4, 8), (5, 10)] {
            insert(&store, &table, id, "cat", age);
        }

        let manager = IndexManager::new(&store, DB);
        let age = table.column("age").unwrap();
        let found = manager
            .lookup_all(
                &table,
                age,
                &[
                    (Operator::Gt, Value::Int(2)),
                    (Operator::Lt, Value::Int(10)),
                    (Operator::Ne, Value::Int(6)),
                ],
            )
            .unwrap();
        assert_eq!(found, ids(&[2, 4]));
    }

    #[test]
    fn test_resolve_across_columns() {
        let store = MemoryStore::new();
        let table = table();
        insert(&store, &table, 1, "cat", 3);
        insert(&store, &table, 2, "dog", 3);
        insert(&store, &table, 3, "dog", 7);

        let manager = IndexManager::new(&store, DB);
        let found = manager
            .resolve(
                &table,
                &[
                    ("kind".to_string(), vec![(Operator::Eq, Value::from("dog"))]),
                    ("age".to_string(), vec![(Operator::Eq, Value::Int(3))]),
                ],
            )
            .unwrap();
        assert_eq!(found, Some(ids(&[2])));

        let none = manager
            .resolve(
                &table,
                &[
                    ("id".to_string(), vec![(Operator::Ge, Value::Int(4))]),
                    ("kind".to_string(), vec![(Operator::Eq, Value::from("dog"))]),
                ],
            )
            .unwrap();
        assert_eq!(none, Some(BTreeSet::new()));
        assert_eq!(manager.resolve(&table, &[]).unwrap(), None);
    }

    #[test]
    fn test_build_backfills_existing_rows() {
        let store = MemoryStore::new();
        let mut table = table();
        table.column_mut("age").unwrap().indexed = false;
        insert(&store, &table, 1, "cat", 3);
        insert(&store, &table, 2, "dog", 3);

        table.column_mut("age").unwrap().indexed = true;
        let manager = IndexManager::new(&store, DB);
        manager.build(&table, table.column("age").unwrap()).unwrap();
        assert_eq!(
            manager
                .lookup(&table, table.column("age").unwrap(), Operator::Eq, &Value::Int(3))
                .unwrap(),
            ids(&[1, 2])
        );

        manager.drop_all(&table).unwrap();
        assert_eq!(store.list_collections(DB).unwrap(), vec!["pets"]);
    }
}
