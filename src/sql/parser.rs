//! Front-end parser and validity checker
//!
//! Turns one command line into a [`Statement`]. Lines that do not match a
//! known command shape are rejected here, before anything is sent to the
//! server.

use std::collections::HashSet;

use super::lexer::tokenize;
use super::token::Token;
use crate::catalog::validate_name;
use crate::error::{Error, Result};
use crate::protocol::command::keyword_type;
use crate::protocol::{ColumnSpec, Command, Keyword, Operator, Predicate, Projection};
use crate::storage::FIELD_DELIMITER;

/// A parsed command line
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// End the client session
    Exit,
    /// Send a command to the server
    Command(Command),
}

/// Parse one command line; `None` for a blank line
pub fn parse_line(line: &str) -> Result<Option<Statement>> {
    let mut parser = Parser::new(line)?;
    if parser.is_at_end() {
        return Ok(None);
    }
    parser.parse().map(Some)
}

/// Only a packed INSERT row can carry an empty value across the wire
fn empty_value() -> Error {
    Error::Protocol("an empty value is only allowed among several INSERT values".to_string())
}

/// Front-end parser
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser from a command line
    pub fn new(line: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(line)?,
            position: 0,
        })
    }

    /// Parse a single statement, rejecting trailing input
    pub fn parse(&mut self) -> Result<Statement> {
        let stmt = self.parse_statement()?;
        if !self.is_at_end() {
            return Err(Error::UnexpectedToken {
                expected: "end of command".to_string(),
                found: format!("{}", self.current()),
            });
        }
        Ok(stmt)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let keyword = self.current().keyword();
        let command = match keyword {
            Some(Keyword::Exit) => {
                self.advance();
                return Ok(Statement::Exit);
            }
            Some(Keyword::Use) => {
                self.advance();
                Command::UseDatabase {
                    name: self.expect_identifier()?,
                }
            }
            Some(Keyword::Create) => self.parse_create()?,
            Some(Keyword::Drop) => self.parse_drop()?,
            Some(Keyword::Add) => self.parse_add()?,
            Some(Keyword::Insert) => self.parse_insert()?,
            Some(Keyword::Delete) => self.parse_delete()?,
            Some(Keyword::Select) => self.parse_select()?,
            _ => {
                return Err(Error::UnexpectedToken {
                    expected: "EXIT, USE, CREATE, DROP, ADD, INSERT, DELETE or SELECT".to_string(),
                    found: format!("{}", self.current()),
                })
            }
        };
        Ok(Statement::Command(command))
    }

    // ========== DDL ==========

    fn parse_create(&mut self) -> Result<Command> {
        self.expect(Keyword::Create)?;
        if self.check(Keyword::Database) {
            self.advance();
            return Ok(Command::CreateDatabase {
                name: self.expect_identifier()?,
            });
        }

        self.expect(Keyword::Table)?;
        let name = self.expect_identifier()?;
        let mut columns = Vec::new();
        let mut seen = HashSet::new();
        while !self.is_at_end() {
            let data_type = self
                .current()
                .keyword()
                .and_then(keyword_type)
                .ok_or_else(|| Error::UnexpectedToken {
                    expected: "column type".to_string(),
                    found: format!("{}", self.current()),
                })?;
            self.advance();
            let column = self.expect_identifier()?;
            if !seen.insert(column.clone()) {
                return Err(Error::DuplicateColumn(column, name));
            }
            columns.push(ColumnSpec::new(column, data_type));
        }
        if columns.is_empty() {
            return Err(Error::EmptyTable(name));
        }
        Ok(Command::CreateTable { name, columns })
    }

    fn parse_drop(&mut self) -> Result<Command> {
        self.expect(Keyword::Drop)?;
        if self.check(Keyword::Database) {
            self.advance();
            return Ok(Command::DropDatabase {
                name: self.expect_identifier()?,
            });
        }
        self.expect(Keyword::Table)?;
        Ok(Command::DropTable {
            name: self.expect_identifier()?,
        })
    }

    fn parse_add(&mut self) -> Result<Command> {
        self.expect(Keyword::Add)?;
        let kind = self.current().keyword();
        self.advance();
        let table = self.expect_identifier()?;
        let column = self.expect_identifier()?;
        match kind {
            Some(Keyword::Pk) => Ok(Command::AddPrimaryKey { table, column }),
            Some(Keyword::Uq) => Ok(Command::AddUnique { table, column }),
            Some(Keyword::Index) => Ok(Command::AddIndex { table, column }),
            Some(Keyword::Fk) => Ok(Command::AddForeignKey {
                table,
                column,
                parent: self.expect_identifier()?,
                parent_column: self.expect_identifier()?,
            }),
            _ => Err(Error::UnexpectedToken {
                expected: "PK, FK, UQ or INDEX".to_string(),
                found: match kind {
                    Some(keyword) => keyword.to_string(),
                    None => "a name".to_string(),
                },
            }),
        }
    }

    // ========== DML ==========

    fn parse_insert(&mut self) -> Result<Command> {
        self.expect(Keyword::Insert)?;
        self.expect(Keyword::Into)?;
        let table = self.expect_identifier()?;
        self.expect(Keyword::Values)?;

        let mut values = Vec::new();
        while !self.is_at_end() {
            let value = self.expect_literal()?;
            if value.contains(FIELD_DELIMITER) {
                return Err(Error::Protocol(format!(
                    "values may not contain '{}'",
                    FIELD_DELIMITER
                )));
            }
            values.push(value);
        }
        if values.is_empty() {
            return Err(Error::UnexpectedEnd("at least one value".to_string()));
        }
        if values.len() == 1 && values[0].is_empty() {
            return Err(empty_value());
        }
        Ok(Command::Insert { table, values })
    }

    fn parse_delete(&mut self) -> Result<Command> {
        self.expect(Keyword::Delete)?;
        self.expect(Keyword::From)?;
        let table = self.expect_identifier()?;
        self.expect(Keyword::Where)?;
        let id = self.expect_literal()?;
        if id.is_empty() {
            return Err(empty_value());
        }
        Ok(Command::Delete { table, id })
    }

    fn parse_select(&mut self) -> Result<Command> {
        self.expect(Keyword::Select)?;

        let projection = if self.check(Keyword::All) {
            self.advance();
            Projection::All
        } else {
            let mut columns = Vec::new();
            while !self.is_at_end() && !self.check(Keyword::From) {
                columns.push(self.expect_identifier()?);
            }
            if columns.is_empty() {
                return Err(Error::UnexpectedToken {
                    expected: "* or column names".to_string(),
                    found: format!("{}", self.current()),
                });
            }
            Projection::Columns(columns)
        };

        self.expect(Keyword::From)?;
        let table = self.expect_identifier()?;
        self.reject_join()?;

        let mut predicates = Vec::new();
        if self.check(Keyword::Where) {
            self.advance();
            loop {
                predicates.push(self.parse_predicate()?);
                if self.check(Keyword::Or) {
                    return Err(Error::Protocol("OR conditions are not supported".to_string()));
                }
                self.reject_join()?;
                if !self.check(Keyword::And) {
                    break;
                }
                self.advance();
            }
        }

        Ok(Command::Select {
            table,
            projection,
            predicates,
        })
    }

    fn parse_predicate(&mut self) -> Result<Predicate> {
        let column = self.expect_identifier()?;
        let op = self
            .current()
            .keyword()
            .and_then(Operator::from_keyword)
            .ok_or_else(|| Error::UnexpectedToken {
                expected: "comparison operator".to_string(),
                found: format!("{}", self.current()),
            })?;
        self.advance();
        let value = self.expect_literal()?;
        if value.is_empty() {
            return Err(empty_value());
        }
        Ok(Predicate { column, op, value })
    }

    fn reject_join(&self) -> Result<()> {
        if let Token::Word(word) = self.current() {
            if word.eq_ignore_ascii_case("join") {
                return Err(Error::Protocol("joins are not supported".to_string()));
            }
        }
        Ok(())
    }

    // ========== Helpers ==========

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    fn check(&self, keyword: Keyword) -> bool {
        self.current().keyword() == Some(keyword)
    }

    fn expect(&mut self, keyword: Keyword) -> Result<()> {
        if self.check(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(Error::UnexpectedToken {
                expected: format!("{}", keyword),
                found: format!("{}", self.current()),
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current().clone() {
            Token::Word(name) => {
                validate_name(&name)?;
                self.advance();
                Ok(name)
            }
            Token::Eof => Err(Error::UnexpectedEnd("a name".to_string())),
            other => Err(Error::UnexpectedToken {
                expected: "a name".to_string(),
                found: format!("{}", other),
            }),
        }
    }

    /// A literal may be any word, including one that spells a keyword
    fn expect_literal(&mut self) -> Result<String> {
        match self.current() {
            Token::Eof => Err(Error::UnexpectedEnd("a value".to_string())),
            token => {
                let text = token.text().to_string();
                self.advance();
                Ok(text)
            }
        }
    }
}
