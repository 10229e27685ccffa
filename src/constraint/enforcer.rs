//! Constraint enforcement
//!
//! Checks run before any row or constraint write reaches the store: literal
//! types, primary-key and unique values, and referential integrity in both
//! directions.

use std::collections::BTreeSet;

use crate::catalog::{Catalog, Column, TableDef};
use crate::error::{Error, Result};
use crate::index::IndexManager;
use crate::storage::{DocumentStore, KeyFilter, Row, Value};

/// Cast a literal to the declared type of `column`
pub fn cast_literal(column: &Column, literal: &str) -> Result<Value> {
    column
        .data_type
        .parse(literal)
        .ok_or_else(|| Error::TypeMismatch {
            column: column.name.clone(),
            expected: column.data_type.to_string(),
            value: literal.to_string(),
        })
}

/// Constraint checks for one database
pub struct ConstraintEnforcer<'a> {
    catalog: &'a Catalog,
    store: &'a dyn DocumentStore,
    database: &'a str,
}

impl<'a> ConstraintEnforcer<'a> {
    pub fn new(catalog: &'a Catalog, store: &'a dyn DocumentStore, database: &'a str) -> Self {
        Self {
            catalog,
            store,
            database,
        }
    }

    fn indexes(&self) -> IndexManager<'a> {
        IndexManager::new(self.store, self.database)
    }

    /// Does any row of `table` hold `value` in `column`? Uses the column's
    /// index when it has one, otherwise scans the table.
    fn value_exists(&self, table: &TableDef, column: &Column, value: &Value) -> Result<bool> {
        if column.indexed {
            return self.indexes().contains(table, column, value);
        }
        let rows = Row::scan(self.store, self.database, table, &KeyFilter::All)?;
        Ok(rows.iter().any(|row| row.get(column.position) == Some(value)))
    }

    // ========== Insert ==========

    /// Check arity and cast every literal to its column type
    pub fn validate_types(&self, table: &TableDef, values: &[String]) -> Result<Row> {
        if values.len() != table.column_count() {
            return Err(Error::ArityMismatch {
                table: table.name().to_string(),
                expected: table.column_count(),
                found: values.len(),
            });
        }

        let typed = table
            .columns()
            .zip(values)
            .map(|(column, literal)| cast_literal(column, literal))
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::new(typed))
    }

    /// Reject a row whose primary key or unique values already exist
    pub fn validate_unique(&self, table: &TableDef, row: &Row) -> Result<()> {
        if self
            .store
            .find_one(self.database, table.name(), row.id())?
            .is_some()
        {
            return Err(Error::DuplicatePrimaryKey {
                table: table.name().to_string(),
                value: row.id().to_string(),
            });
        }

        for column in table.columns().filter(|c| c.unique && !c.is_row_id()) {
            let Some(value) = row.get(column.position) else {
                continue;
            };
            if self.value_exists(table, column, value)? {
                return Err(Error::DuplicateValue {
                    table: table.name().to_string(),
                    column: column.name.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Reject a row whose foreign-key values have no parent row
    pub fn validate_foreign_keys_on_insert(&self, table: &TableDef, row: &Row) -> Result<()> {
        for fk in &table.foreign_keys {
            let position = table.column_index(&fk.key.column)?;
            let Some(value) = row.get(position) else {
                continue;
            };
            let parent = self.catalog.get_table(self.database, &fk.table)?;
            let parent_column = parent.column(&fk.column.column)?;
            if !self.value_exists(&parent, parent_column, value)? {
                return Err(Error::MissingParent {
                    value: value.to_string(),
                    table: parent.name().to_string(),
                    column: parent_column.name.clone(),
                });
            }
        }
        Ok(())
    }

    // ========== Delete ==========

    /// Reject deleting a row that any child row still references
    pub fn validate_no_orphan_on_delete(&self, table: &TableDef, row: &Row) -> Result<()> {
        for child_ref in &table.child_tables {
            let position = table.column_index(&child_ref.key.column)?;
            let Some(value) = row.get(position) else {
                continue;
            };
            let child = self.catalog.get_table(self.database, &child_ref.table)?;
            let child_column = child.column(&child_ref.column.column)?;
            if self.value_exists(&child, child_column, value)? {
                return Err(Error::DependentRows {
                    value: value.to_string(),
                    table: child.name().to_string(),
                    column: child_column.name.clone(),
                });
            }
        }
        Ok(())
    }

    // ========== Constraint Changes ==========

    /// Reject making `column` unique while existing values repeat
    pub fn validate_existing_unique(&self, table: &TableDef, column: &Column) -> Result<()> {
        let mut seen = BTreeSet::new();
        for row in Row::scan(self.store, self.database, table, &KeyFilter::All)? {
            if let Some(value) = row.get(column.position) {
                if !seen.insert(value.clone()) {
                    return Err(Error::DuplicateValue {
                        table: table.name().to_string(),
                        column: column.name.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Reject a new foreign key while existing child values have no parent
    pub fn validate_existing_references(
        &self,
        child: &TableDef,
        column: &Column,
        parent: &TableDef,
        parent_column: &Column,
    ) -> Result<()> {
        let rows = Row::scan(self.store, self.database, child, &KeyFilter::All)?;
        let values: BTreeSet<Value> = rows
            .iter()
            .filter_map(|row| row.get(column.position).cloned())
            .collect();
        for value in values {
            if !self.value_exists(parent, parent_column, &value)? {
                return Err(Error::MissingParent {
                    value: value.to_string(),
                    table: parent.name().to_string(),
                    column: parent_column.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::storage::{MemoryStore, WriteOp};
    use tempfile::TempDir;

    const DB: &str = "db";

    struct Fixture {
        _dir: TempDir,
        catalog: Catalog,
        store: MemoryStore,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        catalog.create_database(DB).unwrap();
        catalog
            .create_table(
                DB,
                "users",
                vec![
                    ("id".to_string(), DataType::Int),
                    ("email".to_string(), DataType::String),
                ],
            )
            .unwrap();
        catalog
            .create_table(
                DB,
                "orders",
                vec![
                    ("id".to_string(), DataType::Int),
                    ("user_id".to_string(), DataType::Int),
                ],
            )
            .unwrap();
        catalog
            .add_foreign_key(DB, "orders", "user_id", "users", "id")
            .unwrap();
        Fixture {
            _dir: dir,
            catalog,
            store: MemoryStore::new(),
        }
    }

    fn put(store: &MemoryStore, table: &str, row: Row) {
        store
            .apply(
                DB,
                &[WriteOp::InsertOne {
                    collection: table.to_string(),
                    doc: row.to_document(),
                }],
            )
            .unwrap();
    }

    #[test]
    fn test_validate_types() {
        let f = fixture();
        let enforcer = ConstraintEnforcer::new(&f.catalog, &f.store, DB);
        let users = f.catalog.get_table(DB, "users").unwrap();

        let row = enforcer
            .validate_types(&users, &["7".to_string(), "a@x".to_string()])
            .unwrap();
        assert_eq!(row.id(), &Value::Int(7));

        assert!(matches!(
            enforcer.validate_types(&users, &["x".to_string(), "a@x".to_string()]),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            enforcer.validate_types(&users, &["1".to_string()]),
            Err(Error::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_unique() {
        let f = fixture();
        f.catalog.add_unique(DB, "users", "email").unwrap();
        let users = f.catalog.get_table(DB, "users").unwrap();
        let enforcer = ConstraintEnforcer::new(&f.catalog, &f.store, DB);

        let row = Row::new(vec![Value::Int(1), Value::from("a@x")]);
        put(&f.store, "users", row.clone());
        f.store
            .insert_one(
                DB,
                "index_users.email",
                crate::storage::Document::row_ids(Value::from("a@x"), vec![Value::Int(1)]),
            )
            .unwrap();

        assert!(matches!(
            enforcer.validate_unique(&users, &row),
            Err(Error::DuplicatePrimaryKey { .. })
        ));
        let same_email = Row::new(vec![Value::Int(2), Value::from("a@x")]);
        assert!(matches!(
            enforcer.validate_unique(&users, &same_email),
            Err(Error::DuplicateValue { .. })
        ));
        let fresh = Row::new(vec![Value::Int(2), Value::from("b@x")]);
        enforcer.validate_unique(&users, &fresh).unwrap();
    }

    #[test]
    fn test_foreign_keys() {
        let f = fixture();
        let users = f.catalog.get_table(DB, "users").unwrap();
        let orders = f.catalog.get_table(DB, "orders").unwrap();
        let enforcer = ConstraintEnforcer::new(&f.catalog, &f.store, DB);

        let order = Row::new(vec![Value::Int(10), Value::Int(1)]);
        assert!(matches!(
            enforcer.validate_foreign_keys_on_insert(&orders, &order),
            Err(Error::MissingParent { .. })
        ));

        let user = Row::new(vec![Value::Int(1), Value::from("a@x")]);
        put(&f.store, "users", user.clone());
        enforcer
            .validate_foreign_keys_on_insert(&orders, &order)
            .unwrap();
        put(&f.store, "orders", order);

        assert!(matches!(
            enforcer.validate_no_orphan_on_delete(&users, &user),
            Err(Error::DependentRows { .. })
        ));
    }

    #[test]
    fn test_existing_data_checks() {
        let f = fixture();
        let users = f.catalog.get_table(DB, "users").unwrap();
        let orders = f.catalog.get_table(DB, "orders").unwrap();
        let enforcer = ConstraintEnforcer::new(&f.catalog, &f.store, DB);

        put(&f.store, "users", Row::new(vec![Value::Int(1), Value::from("same")]));
        put(&f.store, "users", Row::new(vec![Value::Int(2), Value::from("same")]));
        assert!(matches!(
            enforcer.validate_existing_unique(&users, users.column("email").unwrap()),
            Err(Error::DuplicateValue { .. })
        ));

        put(&f.store, "orders", Row::new(vec![Value::Int(5), Value::Int(9)]));
        assert!(matches!(
            enforcer.validate_existing_references(
                &orders,
                orders.column("user_id").unwrap(),
                &users,
                users.column("id").unwrap(),
            ),
            Err(Error::MissingParent { .. })
        ));
    }
}
