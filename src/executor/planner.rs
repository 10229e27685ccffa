//! Query Planner for abkrdb
//!
//! This module turns a SELECT request into a [`SelectPlan`]: predicate
//! literals are cast to their column types, conditions are grouped by column
//! and split into index-resolvable and scan-filtered sets, and the projection
//! is fixed in table-declaration order.

use indexmap::IndexMap;

use crate::catalog::{Catalog, TableDef};
use crate::constraint::cast_literal;
use crate::error::{Error, Result};
use crate::index::ColumnConditions;
use crate::protocol::{Operator, Predicate, Projection};
use crate::storage::{Row, Value};

/// Conditions on one unindexed column, by column position
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFilter {
    pub position: usize,
    pub conditions: Vec<(Operator, Value)>,
}

impl ScanFilter {
    /// Does the row satisfy every condition?
    pub fn matches(&self, row: &Row) -> bool {
        match row.get(self.position) {
            Some(value) => self.conditions.iter().all(|(op, rhs)| op.matches(value, rhs)),
            None => false,
        }
    }
}

/// Executable form of a SELECT
#[derive(Debug, Clone)]
pub struct SelectPlan {
    /// Table being read
    pub table: TableDef,
    /// Output column names
    pub columns: Vec<String>,
    /// Output column positions, parallel to `columns`
    pub projection: Vec<usize>,
    /// Conditions resolved through indexes
    pub indexed: Vec<ColumnConditions>,
    /// Conditions checked against scanned rows
    pub filters: Vec<ScanFilter>,
}

impl SelectPlan {
    /// Does the plan need index lookups?
    pub fn uses_index(&self) -> bool {
        !self.indexed.is_empty()
    }
}

/// Query Planner
pub struct Planner<'a> {
    catalog: &'a Catalog,
    database: &'a str,
}

impl<'a> Planner<'a> {
    /// Create a new planner
    pub fn new(catalog: &'a Catalog, database: &'a str) -> Self {
        Self { catalog, database }
    }

    /// Plan a SELECT against one table
    pub fn plan_select(
        &self,
        table: &str,
        projection: &Projection,
        predicates: &[Predicate],
    ) -> Result<SelectPlan> {
        let table = self.catalog.get_table(self.database, table)?;

        let (columns, positions) = self.plan_projection(&table, projection)?;

        // Group conditions per column, keeping first-mention order.
        let mut grouped: IndexMap<String, Vec<(Operator, Value)>> = IndexMap::new();
        for predicate in predicates {
            let column = table.column(&predicate.column)?;
            let value = cast_literal(column, &predicate.value)?;
            grouped
                .entry(column.name.clone())
                .or_default()
                .push((predicate.op, value));
        }

        let mut indexed = Vec::new();
        let mut filters = Vec::new();
        for (name, conditions) in grouped {
            let column = table.column(&name)?;
            if column.indexed {
                indexed.push((name, conditions));
            } else {
                filters.push(ScanFilter {
                    position: column.position,
                    conditions,
                });
            }
        }

        Ok(SelectPlan {
            table,
            columns,
            projection: positions,
            indexed,
            filters,
        })
    }

    fn plan_projection(
        &self,
        table: &TableDef,
        projection: &Projection,
    ) -> Result<(Vec<String>, Vec<usize>)> {
        let requested = match projection {
            Projection::All => {
                return Ok(table
                    .columns()
                    .map(|c| (c.name.clone(), c.position))
                    .unzip())
            }
            Projection::Columns(requested) => requested,
        };

        if requested.is_empty() {
            return Err(Error::Protocol("SELECT needs at least one column".to_string()));
        }
        for name in requested {
            table.column(name)?;
        }

        Ok(table
            .columns()
            .filter(|c| requested.contains(&c.name))
            .map(|c| (c.name.clone(), c.position))
            .unzip())
    }
}
