use std::sync::Arc;

use abkrdb::catalog::{index_collection_name, Catalog, DataType};
use abkrdb::error::{Error, ErrorCode};
use abkrdb::executor::ExecutionEngine;
use abkrdb::protocol::{ColumnSpec, Operator, Predicate, Projection};
use abkrdb::storage::{DocumentStore, MemoryStore, Value};
use tempfile::TempDir;

const DB: &str = "shop";

fn engine() -> (TempDir, ExecutionEngine) {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(Catalog::open(dir.path()).unwrap());
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let engine = ExecutionEngine::new(catalog, store);
    engine.create_database(DB).unwrap();
    (dir, engine)
}

fn values(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn users_and_orders(engine: &ExecutionEngine) {
    engine
        .create_table(
            DB,
            "users",
            &[
                ColumnSpec::new("id", DataType::Int),
                ColumnSpec::new("name", DataType::String),
            ],
        )
        .unwrap();
    engine
        .create_table(
            DB,
            "orders",
            &[
                ColumnSpec::new("id", DataType::Int),
                ColumnSpec::new("user_id", DataType::Int),
            ],
        )
        .unwrap();
    engine
        .add_foreign_key(DB, "orders", "user_id", "users", "id")
        .unwrap();
}

fn row_count(engine: &ExecutionEngine, table: &str) -> usize {
    engine
        .select(DB, table, &Projection::All, &[])
        .unwrap()
        .rows
        .len()
}

#[test]
fn test_duplicate_primary_key_rejected() {
    let (_dir, engine) = engine();
    users_and_orders(&engine);

    engine.insert(DB, "users", &values(&["1", "ann"])).unwrap();
    let err = engine.insert(DB, "users", &values(&["1", "bob"])).unwrap_err();

    assert!(matches!(err, Error::DuplicatePrimaryKey { .. }));
    assert_eq!(err.code(), ErrorCode::Uniqueness);
    assert_eq!(row_count(&engine, "users"), 1);
}

#[test]
fn test_unique_column_rejects_repeat() {
    let (_dir, engine) = engine();
    users_and_orders(&engine);

    engine.add_unique(DB, "users", "name").unwrap();
    engine.insert(DB, "users", &values(&["1", "ann"])).unwrap();
    let err = engine.insert(DB, "users", &values(&["2", "ann"])).unwrap_err();

    assert_eq!(err.code(), ErrorCode::Uniqueness);
    assert_eq!(row_count(&engine, "users"), 1);
}

#[test]
fn test_child_insert_needs_parent() {
    let (_dir, engine) = engine();
    users_and_orders(&engine);

    let err = engine.insert(DB, "orders", &values(&["10", "1"])).unwrap_err();
    assert!(matches!(err, Error::MissingParent { .. }));
    assert_eq!(err.code(), ErrorCode::ReferentialIntegrity);
    assert_eq!(row_count(&engine, "orders"), 0);

    engine.insert(DB, "users", &values(&["1", "ann"])).unwrap();
    engine.insert(DB, "orders", &values(&["10", "1"])).unwrap();
    assert_eq!(row_count(&engine, "orders"), 1);
}

#[test]
fn test_parent_delete_restricted() {
    let (_dir, engine) = engine();
    users_and_orders(&engine);

    engine.insert(DB, "users", &values(&["1", "ann"])).unwrap();
    engine.insert(DB, "orders", &values(&["10", "1"])).unwrap();

    let err = engine.delete(DB, "users", "1").unwrap_err();
    assert!(matches!(err, Error::DependentRows { .. }));
    assert_eq!(err.code(), ErrorCode::ReferentialIntegrity);
    assert_eq!(row_count(&engine, "users"), 1);

    engine.delete(DB, "orders", "10").unwrap();
    engine.delete(DB, "users", "1").unwrap();
    assert_eq!(row_count(&engine, "users"), 0);
}

#[test]
fn test_referenced_table_cannot_be_dropped() {
    let (_dir, engine) = engine();
    users_and_orders(&engine);

    let err = engine.drop_table(DB, "users").unwrap_err();
    assert!(matches!(err, Error::ReferencedTable(_, _)));

    engine.drop_table(DB, "orders").unwrap();
    engine.drop_table(DB, "users").unwrap();
}

#[test]
fn test_type_checks() {
    let (_dir, engine) = engine();
    users_and_orders(&engine);

    let err = engine.insert(DB, "users", &values(&["x", "ann"])).unwrap_err();
    assert_eq!(err.code(), ErrorCode::TypeMismatch);

    let err = engine.insert(DB, "users", &values(&["1"])).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { .. }));

    engine
        .create_table(
            DB,
            "notes",
            &[
                ColumnSpec::new("id", DataType::Int),
                ColumnSpec::new("owner", DataType::String),
            ],
        )
        .unwrap();
    let err = engine
        .add_foreign_key(DB, "notes", "owner", "users", "id")
        .unwrap_err();
    assert!(matches!(err, Error::ForeignKeyTypeMismatch { .. }));
}

#[test]
fn test_primary_key_added_to_populated_table() {
    let (_dir, engine) = engine();
    users_and_orders(&engine);
    engine.insert(DB, "users", &values(&["1", "ann"])).unwrap();
    engine.insert(DB, "users", &values(&["2", "bob"])).unwrap();

    engine.add_primary_key(DB, "users", "name").unwrap();
    let table = engine.catalog().get_table(DB, "users").unwrap();
    let column = table.column("name").unwrap();
    assert!(column.primary_key && column.unique && column.indexed);

    let entry = engine
        .store()
        .find_one(DB, &index_collection_name("users", "name"), &Value::from("bob"))
        .unwrap()
        .unwrap();
    assert_eq!(entry.payload.as_row_ids(), Some(&[Value::Int(2)][..]));

    let err = engine.insert(DB, "users", &values(&["3", "ann"])).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Uniqueness);
    let err = engine.add_primary_key(DB, "users", "name").unwrap_err();
    assert!(matches!(err, Error::AlreadyPrimaryKey(_)));
    assert_eq!(row_count(&engine, "users"), 2);
}

#[test]
fn test_primary_key_rejected_over_duplicates() {
    let (_dir, engine) = engine();
    users_and_orders(&engine);
    engine.insert(DB, "users", &values(&["1", "ann"])).unwrap();
    engine.insert(DB, "users", &values(&["2", "ann"])).unwrap();

    let err = engine.add_primary_key(DB, "users", "name").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Uniqueness);

    let table = engine.catalog().get_table(DB, "users").unwrap();
    assert!(!table.column("name").unwrap().primary_key);
    assert_eq!(
        engine
            .store()
            .count_documents(DB, &index_collection_name("users", "name"))
            .unwrap(),
        0
    );
}

#[test]
fn test_negative_zero_is_the_same_float() {
    let (_dir, engine) = engine();
    engine
        .create_table(
            DB,
            "points",
            &[
                ColumnSpec::new("x", DataType::Float),
                ColumnSpec::new("y", DataType::Float),
            ],
        )
        .unwrap();

    engine.insert(DB, "points", &values(&["0", "-0"])).unwrap();
    let err = engine.insert(DB, "points", &values(&["-0", "1"])).unwrap_err();
    assert!(matches!(err, Error::DuplicatePrimaryKey { .. }));

    let at_zero = [Predicate::new("y", Operator::Eq, "0")];
    let scanned = engine.select(DB, "points", &Projection::All, &at_zero).unwrap();
    assert_eq!(scanned.rows, vec![vec![Value::Float(0.0), Value::Float(0.0)]]);

    engine.add_index(DB, "points", "y").unwrap();
    let indexed = engine.select(DB, "points", &Projection::All, &at_zero).unwrap();
    assert_eq!(indexed.rows, scanned.rows);
    let below = [Predicate::new("y", Operator::Lt, "0")];
    assert!(engine
        .select(DB, "points", &Projection::All, &below)
        .unwrap()
        .rows
        .is_empty());
}
