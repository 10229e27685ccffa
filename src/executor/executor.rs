//! Query Executor for abkrdb
//!
//! The execution engine carries out one operation at a time against the
//! catalog and the document store. Row writes and their index maintenance are
//! submitted to the store as a single batch.

use std::sync::Arc;

use tracing::{debug, info};

use super::planner::Planner;
use crate::catalog::{Catalog, DataType};
use crate::constraint::{cast_literal, ConstraintEnforcer};
use crate::error::{Error, Result};
use crate::index::IndexManager;
use crate::protocol::{ColumnSpec, Predicate, Projection};
use crate::storage::{DocumentStore, KeyFilter, Row, Value, WriteOp};

/// Collection that keeps an empty database visible in the store
pub const PLACEHOLDER_COLLECTION: &str = "database created";

/// Query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Vec<Value>>,
    /// Number of affected rows (for INSERT/DELETE)
    pub affected_rows: usize,
    /// Message
    pub message: Option<String>,
}

impl QueryResult {
    /// Create a new empty result
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: 0,
            message: None,
        }
    }

    /// Create a result with a message
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::empty()
        }
    }

    /// Create a result with affected rows count
    pub fn with_affected_rows(count: usize, message: impl Into<String>) -> Self {
        Self {
            affected_rows: count,
            message: Some(message.into()),
            ..Self::empty()
        }
    }

    /// Create a tabular result
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            ..Self::empty()
        }
    }

    /// Does this result carry a table?
    pub fn is_table(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Execution Engine
pub struct ExecutionEngine {
    /// System catalog
    catalog: Arc<Catalog>,
    /// Backing document store
    store: Arc<dyn DocumentStore>,
}

impl ExecutionEngine {
    /// Create a new execution engine
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn DocumentStore>) -> Self {
        Self { catalog, store }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    fn indexes<'a>(&'a self, db: &'a str) -> IndexManager<'a> {
        IndexManager::new(self.store.as_ref(), db)
    }

    fn enforcer<'a>(&'a self, db: &'a str) -> ConstraintEnforcer<'a> {
        ConstraintEnforcer::new(&self.catalog, self.store.as_ref(), db)
    }

    // ========== Databases ==========

    pub fn create_database(&self, name: &str) -> Result<QueryResult> {
        if self.store.list_databases()?.iter().any(|db| db == name) {
            return Err(Error::DatabaseAlreadyExists(name.to_string()));
        }
        self.catalog.create_database(name)?;
        self.store.create_collection(name, PLACEHOLDER_COLLECTION)?;
        info!(database = name, "database created");
        Ok(QueryResult::with_message(format!("Database '{}' created", name)))
    }

    pub fn drop_database(&self, name: &str) -> Result<QueryResult> {
        self.catalog.drop_database(name)?;
        self.store.drop_database(name)?;
        info!(database = name, "database dropped");
        Ok(QueryResult::with_message(format!("Database '{}' dropped", name)))
    }

    /// Check that a database can be selected
    pub fn use_database(&self, name: &str) -> Result<QueryResult> {
        if !self.catalog.database_exists(name) {
            return Err(Error::DatabaseNotFound(name.to_string()));
        }
        Ok(QueryResult::with_message(format!("Using database '{}'", name)))
    }

    fn require_database(&self, db: &str) -> Result<()> {
        if !self.catalog.database_exists(db) {
            return Err(Error::DatabaseNotFound(db.to_string()));
        }
        Ok(())
    }

    // ========== Tables ==========

    pub fn create_table(&self, db: &str, name: &str, columns: &[ColumnSpec]) -> Result<QueryResult> {
        self.require_database(db)?;
        let columns: Vec<(String, DataType)> = columns
            .iter()
            .map(|c| (c.name.clone(), c.data_type))
            .collect();
        self.catalog.create_table(db, name, columns)?;
        self.store.create_collection(db, name)?;
        self.store.drop_collection(db, PLACEHOLDER_COLLECTION)?;
        info!(database = db, table = name, "table created");
        Ok(QueryResult::with_message(format!("Table '{}' created", name)))
    }

    pub fn drop_table(&self, db: &str, name: &str) -> Result<QueryResult> {
        self.require_database(db)?;
        let table = self.catalog.get_table(db, name)?;

        if let Some(child) = table.child_tables.iter().find(|r| r.table != name) {
            return Err(Error::ReferencedTable(name.to_string(), child.table.clone()));
        }

        for fk in table.foreign_keys.iter().filter(|fk| fk.table != name) {
            self.catalog.remove_child_references(db, &fk.table, name)?;
        }
        self.indexes(db).drop_all(&table)?;
        self.store.drop_collection(db, name)?;
        self.catalog.drop_table(db, name)?;

        if self.catalog.list_tables(db)?.is_empty() {
            self.store.create_collection(db, PLACEHOLDER_COLLECTION)?;
        }
        info!(database = db, table = name, "table dropped");
        Ok(QueryResult::with_message(format!("Table '{}' dropped", name)))
    }

    // ========== Rows ==========

    pub fn insert(&self, db: &str, table: &str, values: &[String]) -> Result<QueryResult> {
        self.require_database(db)?;
        let table = self.catalog.get_table(db, table)?;
        let enforcer = self.enforcer(db);

        let row = enforcer.validate_types(&table, values)?;
        enforcer.validate_unique(&table, &row)?;
        enforcer.validate_foreign_keys_on_insert(&table, &row)?;

        let mut ops = vec![WriteOp::InsertOne {
            collection: table.name().to_string(),
            doc: row.to_document(),
        }];
        ops.extend(self.indexes(db).on_insert(&table, &row)?);
        self.store.apply(db, &ops)?;

        debug!(database = db, table = table.name(), id = %row.id(), "row inserted");
        Ok(QueryResult::with_affected_rows(1, "1 row inserted"))
    }

    pub fn delete(&self, db: &str, table: &str, id: &str) -> Result<QueryResult> {
        self.require_database(db)?;
        let table = self.catalog.get_table(db, table)?;
        let id = cast_literal(table.row_id_column(), id)?;

        let doc = self
            .store
            .find_one(db, table.name(), &id)?
            .ok_or_else(|| Error::RowNotFound {
                table: table.name().to_string(),
                id: id.to_string(),
            })?;
        let row = Row::from_document(&table, &doc)?;

        self.enforcer(db).validate_no_orphan_on_delete(&table, &row)?;

        let mut ops = vec![WriteOp::DeleteOne {
            collection: table.name().to_string(),
            id: id.clone(),
        }];
        ops.extend(self.indexes(db).on_delete(&table, &row)?);
        self.store.apply(db, &ops)?;

        debug!(database = db, table = table.name(), id = %id, "row deleted");
        Ok(QueryResult::with_affected_rows(1, "1 row deleted"))
    }

    // ========== Constraints ==========

    pub fn add_primary_key(&self, db: &str, table: &str, column: &str) -> Result<QueryResult> {
        self.require_database(db)?;
        let def = self.catalog.get_table(db, table)?;
        let col = def.column(column)?;
        if col.primary_key {
            return Err(Error::AlreadyPrimaryKey(column.to_string()));
        }
        self.enforcer(db).validate_existing_unique(&def, col)?;

        let was_indexed = col.indexed;
        let updated = self.catalog.add_primary_key(db, table, column)?;
        if !was_indexed {
            self.indexes(db).build(&updated, updated.column(column)?)?;
        }
        Ok(QueryResult::with_message(format!(
            "Primary key added on {}.{}",
            table, column
        )))
    }

    pub fn add_unique(&self, db: &str, table: &str, column: &str) -> Result<QueryResult> {
        self.require_database(db)?;
        let def = self.catalog.get_table(db, table)?;
        let col = def.column(column)?;
        self.enforcer(db).validate_existing_unique(&def, col)?;

        let was_indexed = col.indexed;
        let updated = self.catalog.add_unique(db, table, column)?;
        if !was_indexed {
            self.indexes(db).build(&updated, updated.column(column)?)?;
        }
        Ok(QueryResult::with_message(format!(
            "Unique constraint added on {}.{}",
            table, column
        )))
    }

    pub fn add_index(&self, db: &str, table: &str, column: &str) -> Result<QueryResult> {
        self.require_database(db)?;
        let updated = self.catalog.add_index(db, table, column)?;
        self.indexes(db).build(&updated, updated.column(column)?)?;
        Ok(QueryResult::with_message(format!(
            "Index created on {}.{}",
            table, column
        )))
    }

    pub fn add_foreign_key(
        &self,
        db: &str,
        table: &str,
        column: &str,
        parent: &str,
        parent_column: &str,
    ) -> Result<QueryResult> {
        self.require_database(db)?;
        let child = self.catalog.get_table(db, table)?;
        let parent_def = self.catalog.get_table(db, parent)?;
        let child_col = child.column(column)?;
        let parent_col = parent_def.column(parent_column)?;

        if child_col.foreign_key {
            return Err(Error::AlreadyForeignKey(column.to_string()));
        }
        if child_col.data_type != parent_col.data_type {
            return Err(Error::ForeignKeyTypeMismatch {
                column: column.to_string(),
                expected: parent_col.data_type.to_string(),
                found: child_col.data_type.to_string(),
            });
        }
        self.enforcer(db)
            .validate_existing_references(&child, child_col, &parent_def, parent_col)?;

        self.catalog
            .add_foreign_key(db, table, column, parent, parent_column)?;
        Ok(QueryResult::with_message(format!(
            "Foreign key {}.{} -> {}.{} added",
            table, column, parent, parent_column
        )))
    }

    // ========== Queries ==========

    pub fn select(
        &self,
        db: &str,
        table: &str,
        projection: &Projection,
        predicates: &[Predicate],
    ) -> Result<QueryResult> {
        self.require_database(db)?;
        let plan = Planner::new(&self.catalog, db).plan_select(table, projection, predicates)?;

        let filter = match self.indexes(db).resolve(&plan.table, &plan.indexed)? {
            Some(ids) if ids.is_empty() => {
                return Ok(QueryResult::with_rows(plan.columns, Vec::new()));
            }
            Some(ids) => KeyFilter::In(ids.into_iter().collect()),
            None => KeyFilter::All,
        };
        debug!(
            table = plan.table.name(),
            indexed = plan.uses_index(),
            filters = plan.filters.len(),
            "executing select"
        );

        let rows = Row::scan(self.store.as_ref(), db, &plan.table, &filter)?
            .into_iter()
            .filter(|row| plan.filters.iter().all(|f| f.matches(row)))
            .map(|row| row.project(&plan.projection))
            .collect();

        Ok(QueryResult::with_rows(plan.columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use tempfile::TempDir;

    fn engine() -> (TempDir, ExecutionEngine) {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(Catalog::open(dir.path()).unwrap());
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let engine = ExecutionEngine::new(catalog, store);
        engine.create_database("db").unwrap();
        (dir, engine)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_placeholder_collection() {
        let (_dir, engine) = engine();
        assert_eq!(
            engine.store().list_collections("db").unwrap(),
            vec![PLACEHOLDER_COLLECTION]
        );

        engine
            .create_table("db", "t", &[ColumnSpec::new("id", DataType::Int)])
            .unwrap();
        assert_eq!(engine.store().list_collections("db").unwrap(), vec!["t"]);

        engine.drop_table("db", "t").unwrap();
        assert_eq!(
            engine.store().list_collections("db").unwrap(),
            vec![PLACEHOLDER_COLLECTION]
        );
        assert!(matches!(
            engine.create_database("db"),
            Err(Error::DatabaseAlreadyExists(_))
        ));
    }

    #[test]
    fn test_insert_select_delete() {
        let (_dir, engine) = engine();
        engine
            .create_table(
                "db",
                "t",
                &[
                    ColumnSpec::new("id", DataType::Int),
                    ColumnSpec::new("name", DataType::String),
                ],
            )
            .unwrap();
        engine.insert("db", "t", &strings(&["2", "b"])).unwrap();
        engine.insert("db", "t", &strings(&["1", "a"])).unwrap();

        let result = engine.select("db", "t", &Projection::All, &[]).unwrap();
        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Int(1), Value::from("a")],
                vec![Value::Int(2), Value::from("b")],
            ]
        );

        engine.delete("db", "t", "1").unwrap();
        assert!(matches!(
            engine.delete("db", "t", "1"),
            Err(Error::RowNotFound { .. })
        ));
        let result = engine.select("db", "t", &Projection::All, &[]).unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_drop_referenced_table() {
        let (_dir, engine) = engine();
        engine
            .create_table("db", "p", &[ColumnSpec::new("id", DataType::Int)])
            .unwrap();
        engine
            .create_table(
                "db",
                "c",
                &[
                    ColumnSpec::new("id", DataType::Int),
                    ColumnSpec::new("pid", DataType::Int),
                ],
            )
            .unwrap();
        engine.add_foreign_key("db", "c", "pid", "p", "id").unwrap();

        assert!(matches!(
            engine.drop_table("db", "p"),
            Err(Error::ReferencedTable(_, _))
        ));
        engine.drop_table("db", "c").unwrap();
        assert!(engine.catalog().get_table("db", "p").unwrap().child_tables.is_empty());
        engine.drop_table("db", "p").unwrap();
    }

    #[test]
    fn test_add_unique_on_populated_table() {
        let (_dir, engine) = engine();
        engine
            .create_table(
                "db",
                "t",
                &[
                    ColumnSpec::new("id", DataType::Int),
                    ColumnSpec::new("tag", DataType::String),
                ],
            )
            .unwrap();
        engine.insert("db", "t", &strings(&["1", "x"])).unwrap();
        engine.insert("db", "t", &strings(&["2", "x"])).unwrap();

        assert!(matches!(
            engine.add_unique("db", "t", "tag"),
            Err(Error::DuplicateValue { .. })
        ));
        engine.delete("db", "t", "2").unwrap();
        engine.add_unique("db", "t", "tag").unwrap();

        assert!(matches!(
            engine.insert("db", "t", &strings(&["3", "x"])),
            Err(Error::DuplicateValue { .. })
        ));
        let ids = engine
            .store()
            .find_one("db", "index_t.tag", &Value::from("x"))
            .unwrap()
            .unwrap();
        assert_eq!(ids.payload.as_row_ids(), Some(&[Value::Int(1)][..]));
    }
}
