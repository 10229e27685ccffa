//! Command dispatch
//!
//! Maps each decoded [`Command`] onto exactly one execution-engine operation
//! and turns the outcome into exactly one [`Response`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::executor::{ExecutionEngine, QueryResult};
use crate::protocol::{Command, Response, ResultSet};
use crate::storage::DocumentStore;

/// Per-client state carried between requests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Currently selected database
    pub database: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The selected database, or a schema error when none is selected
    pub fn database(&self) -> Result<&str> {
        self.database.as_deref().ok_or(Error::NoDatabaseSelected)
    }
}

impl From<QueryResult> for Response {
    fn from(result: QueryResult) -> Self {
        if !result.is_table() {
            return Response::Done;
        }
        Response::Table(ResultSet {
            columns: result.columns,
            rows: result
                .rows
                .iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        })
    }
}

/// Command dispatcher
pub struct Dispatcher {
    engine: ExecutionEngine,
}

impl Dispatcher {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            engine: ExecutionEngine::new(catalog, store),
        }
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Decode a raw request and dispatch it
    pub fn handle_request(&self, session: &mut Session, request: &str) -> Response {
        match Command::decode(request) {
            Ok(command) => self.dispatch(session, command),
            Err(e) => {
                warn!(error = %e, "rejected request");
                Response::from(e)
            }
        }
    }

    /// Run one command and build its response
    pub fn dispatch(&self, session: &mut Session, command: Command) -> Response {
        let op = command.name();
        match self.execute(session, command) {
            Ok(result) => {
                debug!(op, rows = result.rows.len(), "request succeeded");
                Response::from(result)
            }
            Err(e) => {
                warn!(op, code = %e.code(), error = %e, "request failed");
                Response::from(e)
            }
        }
    }

    /// Run one command against the session
    pub fn execute(&self, session: &mut Session, command: Command) -> Result<QueryResult> {
        let engine = &self.engine;
        match command {
            Command::CreateDatabase { name } => engine.create_database(&name),
            Command::DropDatabase { name } => {
                let result = engine.drop_database(&name)?;
                if session.database.as_deref() == Some(name.as_str()) {
                    session.database = None;
                }
                Ok(result)
            }
            Command::UseDatabase { name } => {
                let result = engine.use_database(&name)?;
                session.database = Some(name);
                Ok(result)
            }
            Command::CreateTable { name, columns } => {
                engine.create_table(session.database()?, &name, &columns)
            }
            Command::DropTable { name } => engine.drop_table(session.database()?, &name),
            Command::Insert { table, values } => {
                engine.insert(session.database()?, &table, &values)
            }
            Command::Delete { table, id } => engine.delete(session.database()?, &table, &id),
            Command::AddPrimaryKey { table, column } => {
                engine.add_primary_key(session.database()?, &table, &column)
            }
            Command::AddForeignKey {
                table,
                column,
                parent,
                parent_column,
            } => engine.add_foreign_key(session.database()?, &table, &column, &parent, &parent_column),
            Command::AddUnique { table, column } => {
                engine.add_unique(session.database()?, &table, &column)
            }
            Command::AddIndex { table, column } => {
                engine.add_index(session.database()?, &table, &column)
            }
            Command::Select {
                table,
                projection,
                predicates,
            } => engine.select(session.database()?, &table, &projection, &predicates),
        }
    }
}
