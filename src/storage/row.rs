//! Table rows
//!
//! A row holds one typed value per column, row id first. In the store the
//! row id becomes the document key and the remaining values are joined by
//! [`FIELD_DELIMITER`] into the document's blob.

use super::document::{Document, KeyFilter, Payload};
use super::store::DocumentStore;
use super::value::Value;
use crate::catalog::TableDef;
use crate::error::{Error, Result};

/// Separator between the non-key fields of a stored row
pub const FIELD_DELIMITER: char = '#';

/// A typed table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row from typed values in column order
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// The row id (primary-key value)
    pub fn id(&self) -> &Value {
        &self.values[0]
    }

    /// Get value at position
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// All values in column order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Project onto the given column positions
    pub fn project(&self, positions: &[usize]) -> Vec<Value> {
        positions
            .iter()
            .filter_map(|&i| self.values.get(i).cloned())
            .collect()
    }

    /// Encode as a base-collection document
    pub fn to_document(&self) -> Document {
        let blob = self.values[1..]
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(&FIELD_DELIMITER.to_string());
        Document::blob(self.id().clone(), blob)
    }

    /// Decode a base-collection document using the table's column types
    pub fn from_document(table: &TableDef, doc: &Document) -> Result<Self> {
        let blob = match &doc.payload {
            Payload::Blob(blob) => blob.as_str(),
            Payload::RowIds(_) => {
                return Err(Error::Storage(format!(
                    "document '{}' in table '{}' is not a row",
                    doc.id,
                    table.name()
                )))
            }
        };

        let fields: Vec<&str> = if table.column_count() == 1 {
            Vec::new()
        } else {
            blob.split(FIELD_DELIMITER).collect()
        };
        if fields.len() + 1 != table.column_count() {
            return Err(Error::Storage(format!(
                "row '{}' in table '{}' has {} fields, expected {}",
                doc.id,
                table.name(),
                fields.len(),
                table.column_count() - 1
            )));
        }

        let mut values = Vec::with_capacity(table.column_count());
        values.push(doc.id.clone());
        for (column, field) in table.columns().skip(1).zip(fields) {
            let value = column.data_type.parse(field).ok_or_else(|| {
                Error::Storage(format!(
                    "row '{}' in table '{}' holds '{}' in {} column '{}'",
                    doc.id,
                    table.name(),
                    field,
                    column.data_type,
                    column.name
                ))
            })?;
            values.push(value);
        }

        Ok(Self { values })
    }

    /// Load the rows of a table whose id matches `filter`, in id order
    pub fn scan(
        store: &dyn DocumentStore,
        db: &str,
        table: &TableDef,
        filter: &KeyFilter,
    ) -> Result<Vec<Self>> {
        store
            .find(db, table.name(), filter)?
            .iter()
            .map(|doc| Self::from_document(table, doc))
            .collect()
    }
}
