//! Schema definitions for abkrdb
//!
//! This module defines table definitions, column metadata, foreign-key
//! records and the on-disk record layout of a table's catalog file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::types::DataType;
use crate::error::{Error, Result};

/// Column definition in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Column position (0-indexed, declaration order)
    pub position: usize,
    /// Is this a primary key column?
    pub primary_key: bool,
    /// Must values be distinct?
    pub unique: bool,
    /// Does the column have an index collection?
    pub indexed: bool,
    /// Does this column reference another table?
    pub foreign_key: bool,
    /// Is this column referenced by another table?
    pub parent_table: bool,
}

impl Column {
    /// Create a new column with no flags set
    pub fn new(name: impl Into<String>, data_type: DataType, position: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            position,
            primary_key: false,
            unique: false,
            indexed: false,
            foreign_key: false,
            parent_table: false,
        }
    }

    /// Set primary key flag; a primary key is always unique and indexed
    pub fn primary_key(mut self, pk: bool) -> Self {
        self.primary_key = pk;
        if pk {
            self.unique = true;
            self.indexed = true;
        }
        self
    }

    /// Set unique flag
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Set indexed flag
    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    /// Is this the row-id column? Its values are the document keys of the
    /// base collection, so it needs no separate index collection.
    pub fn is_row_id(&self) -> bool {
        self.position == 0
    }

    fn key_ref(&self) -> KeyRef {
        KeyRef {
            column: self.name.clone(),
            ordinal: self.position,
            data_type: self.data_type,
        }
    }
}

/// One side of a foreign-key relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRef {
    pub column: String,
    pub ordinal: usize,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

/// A foreign-key record.
///
/// Stored on the child as `key` = local column, `table`/`column` = referenced
/// parent column. The mirrored child reference on the parent uses the same
/// shape with the roles swapped: `key` = parent column, `table`/`column` =
/// referencing child column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub key: KeyRef,
    pub table: String,
    pub column: KeyRef,
}

/// Check a database, table or column name: non-empty `[A-Za-z0-9_]+`
pub fn validate_name(name: &str) -> Result<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

/// Name of the collection that indexes `column` of `table`.
///
/// `.` never appears in a valid name, so the result cannot collide with
/// another index or with a table collection.
pub fn index_collection_name(table: &str, column: &str) -> String {
    format!("index_{}.{}", table, column)
}

/// Table definition - full table metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    /// Table name
    pub name: String,
    /// Columns keyed by name, in declaration order
    columns: IndexMap<String, Column>,
    /// Primary key columns as (name, position)
    pub primary_keys: Vec<(String, usize)>,
    /// Foreign keys declared on this table
    pub foreign_keys: Vec<ForeignKey>,
    /// References from other tables into this one
    pub child_tables: Vec<ForeignKey>,
}

impl TableDef {
    /// Create a table definition from (name, type) pairs.
    ///
    /// The first column becomes the primary key.
    pub fn new(name: impl Into<String>, columns: Vec<(String, DataType)>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        if columns.is_empty() {
            return Err(Error::EmptyTable(name));
        }

        let mut map = IndexMap::with_capacity(columns.len());
        for (position, (col_name, data_type)) in columns.into_iter().enumerate() {
            validate_name(&col_name)?;
            if map.contains_key(&col_name) {
                return Err(Error::DuplicateColumn(col_name, name));
            }
            let column = Column::new(col_name.clone(), data_type, position).primary_key(position == 0);
            map.insert(col_name, column);
        }

        let pk_name = map
            .get_index(0)
            .map(|(n, _)| n.clone())
            .ok_or_else(|| Error::EmptyTable(name.clone()))?;

        Ok(Self {
            name,
            columns: map,
            primary_keys: vec![(pk_name, 0)],
            foreign_keys: Vec::new(),
            child_tables: Vec::new(),
        })
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get column by name
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string(), self.name.clone()))
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        let table = self.name.clone();
        self.columns
            .get_mut(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string(), table))
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.column(name).map(|c| c.position)
    }

    /// Declared type of a column by name
    pub fn column_type(&self, name: &str) -> Result<DataType> {
        self.column(name).map(|c| c.data_type)
    }

    /// The row-id column (always the first declared column)
    pub fn row_id_column(&self) -> &Column {
        // TableDef::new and from_records both reject empty column lists.
        &self.columns[0]
    }

    /// All columns in declaration order
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Get number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get column names in declaration order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_str()).collect()
    }

    /// Indexed columns that own an index collection (everything indexed but
    /// the row-id column)
    pub fn secondary_indexes(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .values()
            .filter(|c| c.indexed && !c.is_row_id())
    }

    /// Build the FK record for `column` referencing `parent.parent_column`
    pub fn foreign_key_to(
        &self,
        column: &str,
        parent: &TableDef,
        parent_column: &str,
    ) -> Result<ForeignKey> {
        Ok(ForeignKey {
            key: self.column(column)?.key_ref(),
            table: parent.name.clone(),
            column: parent.column(parent_column)?.key_ref(),
        })
    }

    /// Serialize into catalog file records
    pub fn to_records(&self) -> Vec<CatalogRecord> {
        let mut records = Vec::with_capacity(self.columns.len() + 1);
        records.push(CatalogRecord::Keys(KeysRecord {
            column_name: KEYS_RECORD_NAME.to_string(),
            primary_keys: self.primary_keys.clone(),
            foreign_keys: self.foreign_keys.clone(),
            child_tables: self.child_tables.clone(),
        }));
        for column in self.columns.values() {
            records.push(CatalogRecord::Column(ColumnRecord {
                column_name: column.name.clone(),
                data_type: column.data_type,
                index: column.indexed,
                unique: column.unique,
                primary_key: column.primary_key,
                foreign_key: column.foreign_key,
                parent_table: column.parent_table,
            }));
        }
        records
    }

    /// Rebuild a table definition from catalog file records
    pub fn from_records(name: impl Into<String>, records: Vec<CatalogRecord>) -> Result<Self> {
        let name = name.into();
        let mut records = records.into_iter();

        let keys = match records.next() {
            Some(CatalogRecord::Keys(keys)) => keys,
            _ => {
                return Err(Error::Storage(format!(
                    "catalog file for '{}' does not start with a keys record",
                    name
                )))
            }
        };

        let mut columns = IndexMap::new();
        for (position, record) in records.enumerate() {
            let record = match record {
                CatalogRecord::Column(record) => record,
                CatalogRecord::Keys(_) => {
                    return Err(Error::Storage(format!(
                        "catalog file for '{}' has more than one keys record",
                        name
                    )))
                }
            };
            let column = Column {
                name: record.column_name.clone(),
                data_type: record.data_type,
                position,
                primary_key: record.primary_key,
                unique: record.unique,
                indexed: record.index,
                foreign_key: record.foreign_key,
                parent_table: record.parent_table,
            };
            if columns.insert(record.column_name.clone(), column).is_some() {
                return Err(Error::DuplicateColumn(record.column_name, name));
            }
        }

        if columns.is_empty() {
            return Err(Error::EmptyTable(name));
        }

        Ok(Self {
            name,
            columns,
            primary_keys: keys.primary_keys,
            foreign_keys: keys.foreign_keys,
            child_tables: keys.child_tables,
        })
    }
}

const KEYS_RECORD_NAME: &str = "keys";

/// Leading table-level record of a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysRecord {
    pub column_name: String,
    pub primary_keys: Vec<(String, usize)>,
    pub foreign_keys: Vec<ForeignKey>,
    pub child_tables: Vec<ForeignKey>,
}

/// Per-column record of a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub column_name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub index: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub foreign_key: bool,
    pub parent_table: bool,
}

/// One entry of a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogRecord {
    Keys(KeysRecord),
    Column(ColumnRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDef {
        TableDef::new(
            "users",
            vec![
                ("id".to_string(), DataType::Int),
                ("name".to_string(), DataType::String),
                ("born".to_string(), DataType::Date),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_first_column_is_primary_key() {
        let table = users();
        let id = table.column("id").unwrap();
        assert!(id.primary_key && id.unique && id.indexed);
        assert!(id.is_row_id());

        let name = table.column("name").unwrap();
        assert!(!name.primary_key && !name.indexed);
        assert_eq!(table.primary_keys, vec![("id".to_string(), 0)]);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let result = TableDef::new(
            "t",
            vec![
                ("a".to_string(), DataType::Int),
                ("a".to_string(), DataType::String),
            ],
        );
        assert!(matches!(result, Err(Error::DuplicateColumn(_, _))));

        let result = TableDef::new("t", vec![]);
        assert!(matches!(result, Err(Error::EmptyTable(_))));
    }

    #[test]
    fn test_column_lookup() {
        let table = users();
        assert_eq!(table.column_index("born").unwrap(), 2);
        assert_eq!(table.column_type("name").unwrap(), DataType::String);
        assert!(matches!(
            table.column_index("missing"),
            Err(Error::ColumnNotFound(_, _))
        ));
        assert_eq!(table.column_names(), vec!["id", "name", "born"]);
    }

    #[test]
    fn test_records_round_trip() {
        let mut table = users();
        table.column_mut("name").unwrap().indexed = true;

        let json = serde_json::to_string(&table.to_records()).unwrap();
        let records: Vec<CatalogRecord> = serde_json::from_str(&json).unwrap();
        let restored = TableDef::from_records("users", records).unwrap();

        assert_eq!(restored, table);
        assert_eq!(
            restored.secondary_indexes().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["name"]
        );
    }

    #[test]
    fn test_names_are_validated() {
        assert!(validate_name("order_items2").is_ok());
        for bad in ["", "..", "../x", "a/b", "a.b", "database created", "x#y"] {
            assert!(
                matches!(validate_name(bad), Err(Error::InvalidName(_))),
                "{:?} accepted",
                bad
            );
        }

        let result = TableDef::new("a.b", vec![("id".to_string(), DataType::Int)]);
        assert!(matches!(result, Err(Error::InvalidName(_))));
        let result = TableDef::new("t", vec![("i d".to_string(), DataType::Int)]);
        assert!(matches!(result, Err(Error::InvalidName(_))));
    }

    #[test]
    fn test_index_names_do_not_collide() {
        assert_ne!(
            index_collection_name("a_b", "c"),
            index_collection_name("a", "b_c")
        );
        assert!(validate_name(&index_collection_name("t", "c")).is_err());
    }
}
