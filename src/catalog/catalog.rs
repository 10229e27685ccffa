//! System Catalog for abkrdb
//!
//! Table metadata lives on disk, one JSON file per table at
//! `<root>/<database>/<table>.json`. Every mutation reads the whole file,
//! changes it in memory and writes it back. Mutations are serialized by a
//! catalog-wide writer lock; the server is assumed to be the only process
//! touching the directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::schema::{validate_name, CatalogRecord, ForeignKey, TableDef};
use super::types::DataType;
use crate::error::{Error, Result};

const TABLE_FILE_EXTENSION: &str = "json";

/// System Catalog - manages database directories and table metadata files
#[derive(Debug)]
pub struct Catalog {
    /// Directory holding one sub-directory per database
    root: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl Catalog {
    /// Open a catalog rooted at `root`, creating the directory if needed
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory of the catalog
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::Internal("catalog lock poisoned".to_string()))
    }

    /// Directory of a database; the name must be a plain identifier so the
    /// path stays under the root
    fn database_path(&self, db: &str) -> Result<PathBuf> {
        validate_name(db)?;
        Ok(self.root.join(db))
    }

    fn table_path(&self, db: &str, table: &str) -> Result<PathBuf> {
        validate_name(table)?;
        Ok(self
            .database_path(db)?
            .join(table)
            .with_extension(TABLE_FILE_EXTENSION))
    }

    // ========== Databases ==========

    /// Create the directory for a new database
    pub fn create_database(&self, db: &str) -> Result<()> {
        let _guard = self.lock()?;
        let path = self.database_path(db)?;
        if path.exists() {
            return Err(Error::DatabaseAlreadyExists(db.to_string()));
        }
        fs::create_dir_all(&path)?;
        debug!(database = db, "created catalog directory");
        Ok(())
    }

    /// Remove a database directory and every table file in it
    pub fn drop_database(&self, db: &str) -> Result<()> {
        let _guard = self.lock()?;
        let path = self.database_path(db)?;
        if !path.is_dir() {
            return Err(Error::DatabaseNotFound(db.to_string()));
        }
        fs::remove_dir_all(&path)?;
        debug!(database = db, "removed catalog directory");
        Ok(())
    }

    /// Check if a database directory exists
    pub fn database_exists(&self, db: &str) -> bool {
        matches!(self.database_path(db), Ok(path) if path.is_dir())
    }

    // ========== Tables ==========

    /// List all table names of a database, sorted
    pub fn list_tables(&self, db: &str) -> Result<Vec<String>> {
        let path = self.database_path(db)?;
        if !path.is_dir() {
            return Err(Error::DatabaseNotFound(db.to_string()));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TABLE_FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Check if a table exists
    pub fn table_exists(&self, db: &str, table: &str) -> bool {
        matches!(self.table_path(db, table), Ok(path) if path.is_file())
    }

    /// Get a table by name
    pub fn get_table(&self, db: &str, table: &str) -> Result<TableDef> {
        let path = self.table_path(db, table)?;
        if !path.is_file() {
            return Err(Error::TableNotFound(table.to_string()));
        }
        let json = fs::read_to_string(&path)?;
        let records: Vec<CatalogRecord> = serde_json::from_str(&json)?;
        TableDef::from_records(table, records)
    }

    fn write_table(&self, db: &str, table: &TableDef) -> Result<()> {
        let path = self.table_path(db, table.name())?;
        let json = serde_json::to_string_pretty(&table.to_records())?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Create a new table from (name, type) pairs; the first column becomes
    /// the primary key
    pub fn create_table(
        &self,
        db: &str,
        name: &str,
        columns: Vec<(String, DataType)>,
    ) -> Result<TableDef> {
        let _guard = self.lock()?;
        if !self.database_exists(db) {
            return Err(Error::DatabaseNotFound(db.to_string()));
        }
        if self.table_exists(db, name) {
            return Err(Error::TableAlreadyExists(name.to_string()));
        }

        let table = TableDef::new(name, columns)?;
        self.write_table(db, &table)?;
        debug!(database = db, table = name, "wrote catalog file");
        Ok(table)
    }

    /// Drop a table's catalog file, returning its last definition
    pub fn drop_table(&self, db: &str, name: &str) -> Result<TableDef> {
        let _guard = self.lock()?;
        let table = self.get_table(db, name)?;
        fs::remove_file(self.table_path(db, name)?)?;
        Ok(table)
    }

    /// Read-modify-write one table file under the writer lock
    pub fn update_table<T, F>(&self, db: &str, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut TableDef) -> Result<T>,
    {
        let _guard = self.lock()?;
        let mut table = self.get_table(db, name)?;
        let out = f(&mut table)?;
        self.write_table(db, &table)?;
        Ok(out)
    }

    /// Position of a column in its table
    pub fn column_index(&self, db: &str, table: &str, column: &str) -> Result<usize> {
        self.get_table(db, table)?.column_index(column)
    }

    /// Declared type of a column
    pub fn column_type(&self, db: &str, table: &str, column: &str) -> Result<DataType> {
        self.get_table(db, table)?.column_type(column)
    }

    // ========== Constraint Flags ==========

    /// Mark a column as primary key (also unique and indexed)
    pub fn add_primary_key(&self, db: &str, table: &str, column: &str) -> Result<TableDef> {
        self.update_table(db, table, |def| {
            let col = def.column_mut(column)?;
            if col.primary_key {
                return Err(Error::AlreadyPrimaryKey(column.to_string()));
            }
            col.primary_key = true;
            col.unique = true;
            col.indexed = true;
            let position = col.position;
            def.primary_keys.push((column.to_string(), position));
            Ok(def.clone())
        })
    }

    /// Mark a column as unique; the column gains an index if it lacks one
    pub fn add_unique(&self, db: &str, table: &str, column: &str) -> Result<TableDef> {
        self.update_table(db, table, |def| {
            let col = def.column_mut(column)?;
            col.unique = true;
            col.indexed = true;
            Ok(def.clone())
        })
    }

    /// Mark a column as indexed
    pub fn add_index(&self, db: &str, table: &str, column: &str) -> Result<TableDef> {
        self.update_table(db, table, |def| {
            let table_name = def.name.clone();
            let col = def.column_mut(column)?;
            if col.indexed {
                return Err(Error::AlreadyIndexed(column.to_string(), table_name));
            }
            col.indexed = true;
            Ok(def.clone())
        })
    }

    /// Record `child.column -> parent.parent_column` on both tables.
    ///
    /// Both files are rewritten under one hold of the writer lock.
    pub fn add_foreign_key(
        &self,
        db: &str,
        child: &str,
        column: &str,
        parent: &str,
        parent_column: &str,
    ) -> Result<ForeignKey> {
        let _guard = self.lock()?;
        let mut child_def = self.get_table(db, child)?;
        let mut parent_def = if parent == child {
            child_def.clone()
        } else {
            self.get_table(db, parent)?
        };

        let child_col = child_def.column(column)?;
        if child_col.foreign_key || child_def.foreign_keys.iter().any(|fk| fk.key.column == column) {
            return Err(Error::AlreadyForeignKey(column.to_string()));
        }
        let parent_col = parent_def.column(parent_column)?;
        if child_col.data_type != parent_col.data_type {
            return Err(Error::ForeignKeyTypeMismatch {
                column: column.to_string(),
                expected: parent_col.data_type.to_string(),
                found: child_col.data_type.to_string(),
            });
        }

        let fk = child_def.foreign_key_to(column, &parent_def, parent_column)?;
        let child_ref = ForeignKey {
            key: fk.column.clone(),
            table: child.to_string(),
            column: fk.key.clone(),
        };

        if parent == child {
            child_def.foreign_keys.push(fk.clone());
            child_def.child_tables.push(child_ref);
            child_def.column_mut(column)?.foreign_key = true;
            child_def.column_mut(parent_column)?.parent_table = true;
            self.write_table(db, &child_def)?;
        } else {
            child_def.foreign_keys.push(fk.clone());
            child_def.column_mut(column)?.foreign_key = true;
            parent_def.child_tables.push(child_ref);
            parent_def.column_mut(parent_column)?.parent_table = true;
            self.write_table(db, &child_def)?;
            self.write_table(db, &parent_def)?;
        }

        debug!(
            database = db,
            child, column, parent, parent_column, "recorded foreign key"
        );
        Ok(fk)
    }

    /// Remove every child reference `child` holds on `parent`
    pub fn remove_child_references(&self, db: &str, parent: &str, child: &str) -> Result<()> {
        self.update_table(db, parent, |def| {
            def.child_tables.retain(|r| r.table != child);
            let still_referenced: Vec<String> =
                def.child_tables.iter().map(|r| r.key.column.clone()).collect();
            let names: Vec<String> = def.column_names().iter().map(|s| s.to_string()).collect();
            for name in names {
                let col = def.column_mut(&name)?;
                col.parent_table = still_referenced.contains(&name);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Catalog) {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        catalog.create_database("shop").unwrap();
        (dir, catalog)
    }

    fn cols(spec: &[(&str, DataType)]) -> Vec<(String, DataType)> {
        spec.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    #[test]
    fn test_create_and_get_table() {
        let (_dir, catalog) = setup();
        catalog
            .create_table(
                "shop",
                "users",
                cols(&[("id", DataType::Int), ("name", DataType::String)]),
            )
            .unwrap();

        let table = catalog.get_table("shop", "users").unwrap();
        assert_eq!(table.name(), "users");
        assert_eq!(table.column_count(), 2);
        assert!(table.column("id").unwrap().primary_key);
        assert_eq!(catalog.list_tables("shop").unwrap(), vec!["users"]);
        assert_eq!(catalog.column_index("shop", "users", "name").unwrap(), 1);
        assert_eq!(
            catalog.column_type("shop", "users", "name").unwrap(),
            DataType::String
        );
    }

    #[test]
    fn test_table_already_exists() {
        let (_dir, catalog) = setup();
        catalog
            .create_table("shop", "t", cols(&[("id", DataType::Int)]))
            .unwrap();
        let result = catalog.create_table("shop", "t", cols(&[("id", DataType::Int)]));
        assert!(matches!(result, Err(Error::TableAlreadyExists(_))));
    }

    #[test]
    fn test_database_lifecycle() {
        let (_dir, catalog) = setup();
        assert!(catalog.database_exists("shop"));
        assert!(matches!(
            catalog.create_database("shop"),
            Err(Error::DatabaseAlreadyExists(_))
        ));

        catalog.drop_database("shop").unwrap();
        assert!(!catalog.database_exists("shop"));
        assert!(matches!(
            catalog.drop_database("shop"),
            Err(Error::DatabaseNotFound(_))
        ));
    }

    #[test]
    fn test_names_cannot_leave_root() {
        let outer = TempDir::new().unwrap();
        let catalog = Catalog::open(outer.path().join("data")).unwrap();
        fs::create_dir_all(outer.path().join("victim")).unwrap();

        assert!(matches!(
            catalog.create_database("../escaped"),
            Err(Error::InvalidName(_))
        ));
        assert!(!outer.path().join("escaped").exists());

        assert!(matches!(
            catalog.drop_database("../victim"),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(catalog.drop_database(".."), Err(Error::InvalidName(_))));
        assert!(outer.path().join("victim").is_dir());
        assert!(!catalog.database_exists(".."));

        catalog.create_database("shop").unwrap();
        assert!(matches!(
            catalog.create_table("shop", "../t", cols(&[("id", DataType::Int)])),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            catalog.get_table("shop", "../../x"),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn test_drop_table() {
        let (_dir, catalog) = setup();
        catalog
            .create_table("shop", "t", cols(&[("id", DataType::Int)]))
            .unwrap();
        assert!(catalog.table_exists("shop", "t"));

        catalog.drop_table("shop", "t").unwrap();
        assert!(!catalog.table_exists("shop", "t"));
        assert!(matches!(
            catalog.get_table("shop", "t"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_constraint_flags() {
        let (_dir, catalog) = setup();
        catalog
            .create_table(
                "shop",
                "users",
                cols(&[
                    ("id", DataType::Int),
                    ("email", DataType::String),
                    ("nick", DataType::String),
                ]),
            )
            .unwrap();

        assert!(matches!(
            catalog.add_primary_key("shop", "users", "id"),
            Err(Error::AlreadyPrimaryKey(_))
        ));

        let table = catalog.add_unique("shop", "users", "email").unwrap();
        let email = table.column("email").unwrap();
        assert!(email.unique && email.indexed);

        catalog.add_index("shop", "users", "nick").unwrap();
        assert!(matches!(
            catalog.add_index("shop", "users", "nick"),
            Err(Error::AlreadyIndexed(_, _))
        ));

        let table = catalog.add_primary_key("shop", "users", "nick").unwrap();
        assert_eq!(table.primary_keys.len(), 2);
    }

    #[test]
    fn test_foreign_key_records() {
        let (_dir, catalog) = setup();
        catalog
            .create_table("shop", "users", cols(&[("id", DataType::Int)]))
            .unwrap();
        catalog
            .create_table(
                "shop",
                "orders",
                cols(&[
                    ("id", DataType::Int),
                    ("user_id", DataType::Int),
                    ("note", DataType::String),
                ]),
            )
            .unwrap();

        let fk = catalog
            .add_foreign_key("shop", "orders", "user_id", "users", "id")
            .unwrap();
        assert_eq!(fk.key.column, "user_id");
        assert_eq!(fk.key.ordinal, 1);
        assert_eq!(fk.table, "users");

        let users = catalog.get_table("shop", "users").unwrap();
        assert_eq!(users.child_tables.len(), 1);
        assert_eq!(users.child_tables[0].table, "orders");
        assert!(users.column("id").unwrap().parent_table);

        assert!(matches!(
            catalog.add_foreign_key("shop", "orders", "user_id", "users", "id"),
            Err(Error::AlreadyForeignKey(_))
        ));
        assert!(matches!(
            catalog.add_foreign_key("shop", "orders", "note", "users", "id"),
            Err(Error::ForeignKeyTypeMismatch { .. })
        ));

        catalog
            .remove_child_references("shop", "users", "orders")
            .unwrap();
        let users = catalog.get_table("shop", "users").unwrap();
        assert!(users.child_tables.is_empty());
        assert!(!users.column("id").unwrap().parent_table);
    }
}
