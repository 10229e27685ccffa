//! Request commands
//!
//! A [`Command`] is one decoded request. `encode` produces the space-separated
//! token form sent by clients and `decode` parses it back on the server.

use std::fmt;

use super::keyword::Keyword;
use crate::catalog::DataType;
use crate::error::{Error, Result};
use crate::storage::{Value, FIELD_DELIMITER};

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
}

impl Operator {
    pub fn from_keyword(keyword: Keyword) -> Option<Self> {
        match keyword {
            Keyword::Eq => Some(Operator::Eq),
            Keyword::Lt => Some(Operator::Lt),
            Keyword::Gt => Some(Operator::Gt),
            Keyword::Le => Some(Operator::Le),
            Keyword::Ge => Some(Operator::Ge),
            Keyword::Ne => Some(Operator::Ne),
            _ => None,
        }
    }

    pub fn keyword(self) -> Keyword {
        match self {
            Operator::Eq => Keyword::Eq,
            Operator::Lt => Keyword::Lt,
            Operator::Gt => Keyword::Gt,
            Operator::Le => Keyword::Le,
            Operator::Ge => Keyword::Ge,
            Operator::Ne => Keyword::Ne,
        }
    }

    /// Evaluate `lhs <op> rhs`
    pub fn matches(self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            Operator::Eq => lhs == rhs,
            Operator::Lt => lhs < rhs,
            Operator::Gt => lhs > rhs,
            Operator::Le => lhs <= rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// A single `column <op> literal` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: String,
    pub op: Operator,
    /// Untyped literal; cast against the column type by the planner
    pub value: String,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: Operator, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }
}

/// Requested result columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

/// Column declaration of CREATE TABLE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Keyword naming a column type
pub fn type_keyword(data_type: DataType) -> Keyword {
    match data_type {
        DataType::Int => Keyword::Int,
        DataType::Float => Keyword::Float,
        DataType::Bit => Keyword::Bit,
        DataType::Date => Keyword::Date,
        DataType::DateTime => Keyword::DateTime,
        DataType::String => Keyword::String,
    }
}

/// Column type named by a keyword
pub fn keyword_type(keyword: Keyword) -> Option<DataType> {
    match keyword {
        Keyword::Int => Some(DataType::Int),
        Keyword::Float => Some(DataType::Float),
        Keyword::Bit => Some(DataType::Bit),
        Keyword::Date => Some(DataType::Date),
        Keyword::DateTime => Some(DataType::DateTime),
        Keyword::String => Some(DataType::String),
        _ => None,
    }
}

/// A decoded request
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
    UseDatabase {
        name: String,
    },
    CreateTable {
        name: String,
        columns: Vec<ColumnSpec>,
    },
    DropTable {
        name: String,
    },
    Insert {
        table: String,
        values: Vec<String>,
    },
    Delete {
        table: String,
        id: String,
    },
    AddPrimaryKey {
        table: String,
        column: String,
    },
    AddForeignKey {
        table: String,
        column: String,
        parent: String,
        parent_column: String,
    },
    AddUnique {
        table: String,
        column: String,
    },
    AddIndex {
        table: String,
        column: String,
    },
    Select {
        table: String,
        projection: Projection,
        predicates: Vec<Predicate>,
    },
}

impl Command {
    /// Short operation name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateDatabase { .. } => "create_database",
            Command::DropDatabase { .. } => "drop_database",
            Command::UseDatabase { .. } => "use_database",
            Command::CreateTable { .. } => "create_table",
            Command::DropTable { .. } => "drop_table",
            Command::Insert { .. } => "insert",
            Command::Delete { .. } => "delete",
            Command::AddPrimaryKey { .. } => "add_primary_key",
            Command::AddForeignKey { .. } => "add_foreign_key",
            Command::AddUnique { .. } => "add_unique",
            Command::AddIndex { .. } => "add_index",
            Command::Select { .. } => "select",
        }
    }

    /// Encode as a wire request
    pub fn encode(&self) -> String {
        let mut out = TokenWriter::default();
        match self {
            Command::CreateDatabase { name } => {
                out.keyword(Keyword::Create).keyword(Keyword::Database).word(name);
            }
            Command::DropDatabase { name } => {
                out.keyword(Keyword::Drop).keyword(Keyword::Database).word(name);
            }
            Command::UseDatabase { name } => {
                out.keyword(Keyword::Use).word(name);
            }
            Command::CreateTable { name, columns } => {
                out.keyword(Keyword::Create).keyword(Keyword::Table).word(name);
                for column in columns {
                    out.keyword(type_keyword(column.data_type)).word(&column.name);
                }
            }
            Command::DropTable { name } => {
                out.keyword(Keyword::Drop).keyword(Keyword::Table).word(name);
            }
            Command::Insert { table, values } => {
                out.keyword(Keyword::Insert)
                    .word(table)
                    .word(&values.join(&FIELD_DELIMITER.to_string()));
            }
            Command::Delete { table, id } => {
                out.keyword(Keyword::Delete)
                    .keyword(Keyword::From)
                    .word(table)
                    .keyword(Keyword::Where)
                    .word(id);
            }
            Command::AddPrimaryKey { table, column } => {
                out.keyword(Keyword::Add).keyword(Keyword::Pk).word(table).word(column);
            }
            Command::AddForeignKey {
                table,
                column,
                parent,
                parent_column,
            } => {
                out.keyword(Keyword::Add)
                    .keyword(Keyword::Fk)
                    .word(table)
                    .word(column)
                    .word(parent)
                    .word(parent_column);
            }
            Command::AddUnique { table, column } => {
                out.keyword(Keyword::Add).keyword(Keyword::Uq).word(table).word(column);
            }
            Command::AddIndex { table, column } => {
                out.keyword(Keyword::Add).keyword(Keyword::Index).word(table).word(column);
            }
            Command::Select {
                table,
                projection,
                predicates,
            } => {
                out.keyword(Keyword::Select);
                match projection {
                    Projection::All => {
                        out.keyword(Keyword::All);
                    }
                    Projection::Columns(columns) => {
                        out.keyword(Keyword::Columns);
                        for column in columns {
                            out.word(column);
                        }
                    }
                }
                out.keyword(Keyword::From).word(table);
                for (i, predicate) in predicates.iter().enumerate() {
                    out.keyword(if i == 0 { Keyword::Where } else { Keyword::And })
                        .word(&predicate.column)
                        .keyword(predicate.op.keyword())
                        .word(&predicate.value);
                }
            }
        }
        out.finish()
    }

    /// Decode a wire request
    pub fn decode(request: &str) -> Result<Self> {
        Decoder::new(request).decode()
    }
}

#[derive(Default)]
struct TokenWriter {
    tokens: Vec<String>,
}

impl TokenWriter {
    fn keyword(&mut self, keyword: Keyword) -> &mut Self {
        self.tokens.push(keyword.code().to_string());
        self
    }

    fn word(&mut self, word: &str) -> &mut Self {
        self.tokens.push(word.to_string());
        self
    }

    fn finish(self) -> String {
        self.tokens.join(" ")
    }
}

/// Positional decoder over request tokens
struct Decoder<'a> {
    tokens: Vec<&'a str>,
    position: usize,
}

impl<'a> Decoder<'a> {
    fn new(request: &'a str) -> Self {
        Self {
            tokens: request.split_whitespace().collect(),
            position: 0,
        }
    }

    fn decode(&mut self) -> Result<Command> {
        let first = self
            .current()
            .ok_or_else(|| Error::UnexpectedEnd("an operation code".to_string()))?;
        let op = Keyword::from_token(first)
            .ok_or_else(|| Error::UnknownOperation(first.to_string()))?;
        self.advance();

        let command = match op {
            Keyword::Create => self.decode_create()?,
            Keyword::Drop => self.decode_drop()?,
            Keyword::Use => Command::UseDatabase {
                name: self.expect_word("database name")?,
            },
            Keyword::Insert => self.decode_insert()?,
            Keyword::Delete => self.decode_delete()?,
            Keyword::Add => self.decode_add()?,
            Keyword::Select => self.decode_select()?,
            _ => return Err(Error::UnknownOperation(first.to_string())),
        };

        self.expect_end()?;
        Ok(command)
    }

    fn decode_create(&mut self) -> Result<Command> {
        match self.expect_keyword("DATABASE or TABLE")? {
            Keyword::Database => Ok(Command::CreateDatabase {
                name: self.expect_word("database name")?,
            }),
            Keyword::Table => {
                let name = self.expect_word("table name")?;
                let mut columns = Vec::new();
                while !self.is_at_end() {
                    let keyword = self.expect_keyword("column type")?;
                    let data_type = keyword_type(keyword).ok_or_else(|| Error::UnexpectedToken {
                        expected: "column type".to_string(),
                        found: keyword.to_string(),
                    })?;
                    let column = self.expect_word("column name")?;
                    columns.push(ColumnSpec::new(column, data_type));
                }
                if columns.is_empty() {
                    return Err(Error::UnexpectedEnd("column type".to_string()));
                }
                Ok(Command::CreateTable { name, columns })
            }
            other => Err(Error::UnexpectedToken {
                expected: "DATABASE or TABLE".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn decode_drop(&mut self) -> Result<Command> {
        match self.expect_keyword("DATABASE or TABLE")? {
            Keyword::Database => Ok(Command::DropDatabase {
                name: self.expect_word("database name")?,
            }),
            Keyword::Table => Ok(Command::DropTable {
                name: self.expect_word("table name")?,
            }),
            other => Err(Error::UnexpectedToken {
                expected: "DATABASE or TABLE".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn decode_insert(&mut self) -> Result<Command> {
        let table = self.expect_word("table name")?;
        let packed = self.expect_word("row values")?;
        let values = packed.split(FIELD_DELIMITER).map(str::to_string).collect();
        Ok(Command::Insert { table, values })
    }

    fn decode_delete(&mut self) -> Result<Command> {
        self.expect(Keyword::From)?;
        let table = self.expect_word("table name")?;
        self.expect(Keyword::Where)?;
        let id = self.expect_word("row id")?;
        Ok(Command::Delete { table, id })
    }

    fn decode_add(&mut self) -> Result<Command> {
        let kind = self.expect_keyword("PK, FK, UQ or INDEX")?;
        let table = self.expect_word("table name")?;
        let column = self.expect_word("column name")?;
        match kind {
            Keyword::Pk => Ok(Command::AddPrimaryKey { table, column }),
            Keyword::Uq => Ok(Command::AddUnique { table, column }),
            Keyword::Index => Ok(Command::AddIndex { table, column }),
            Keyword::Fk => Ok(Command::AddForeignKey {
                table,
                column,
                parent: self.expect_word("referenced table name")?,
                parent_column: self.expect_word("referenced column name")?,
            }),
            other => Err(Error::UnexpectedToken {
                expected: "PK, FK, UQ or INDEX".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn decode_select(&mut self) -> Result<Command> {
        let projection = match self.expect_keyword("* or a column list")? {
            Keyword::All => Projection::All,
            Keyword::Columns => {
                let mut columns = Vec::new();
                while !self.is_at_end() && !self.check(Keyword::From) {
                    columns.push(self.expect_word("column name")?);
                }
                if columns.is_empty() {
                    return Err(Error::Protocol("SELECT needs at least one column".to_string()));
                }
                Projection::Columns(columns)
            }
            other => {
                return Err(Error::UnexpectedToken {
                    expected: "* or a column list".to_string(),
                    found: other.to_string(),
                })
            }
        };

        self.expect(Keyword::From)?;
        let table = self.expect_word("table name")?;
        self.reject_join()?;

        let mut predicates = Vec::new();
        if !self.is_at_end() {
            self.expect(Keyword::Where)?;
            loop {
                let column = self.expect_word("column name")?;
                let keyword = self.expect_keyword("comparison operator")?;
                let op = Operator::from_keyword(keyword).ok_or_else(|| Error::UnexpectedToken {
                    expected: "comparison operator".to_string(),
                    found: keyword.to_string(),
                })?;
                let value = self.expect_word("literal")?;
                predicates.push(Predicate { column, op, value });

                if self.is_at_end() {
                    break;
                }
                if self.check(Keyword::Or) {
                    return Err(Error::Protocol("OR conditions are not supported".to_string()));
                }
                self.reject_join()?;
                self.expect(Keyword::And)?;
            }
        }

        Ok(Command::Select {
            table,
            projection,
            predicates,
        })
    }

    fn reject_join(&self) -> Result<()> {
        match self.current() {
            Some(token) if token.eq_ignore_ascii_case("join") => {
                Err(Error::Protocol("joins are not supported".to_string()))
            }
            _ => Ok(()),
        }
    }

    // ========== Helpers ==========

    fn current(&self) -> Option<&'a str> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn check(&self, keyword: Keyword) -> bool {
        self.current().and_then(Keyword::from_token) == Some(keyword)
    }

    fn expect(&mut self, keyword: Keyword) -> Result<()> {
        match self.current() {
            Some(_) if self.check(keyword) => {
                self.advance();
                Ok(())
            }
            Some(token) => Err(Error::UnexpectedToken {
                expected: keyword.to_string(),
                found: token.to_string(),
            }),
            None => Err(Error::UnexpectedEnd(keyword.to_string())),
        }
    }

    fn expect_keyword(&mut self, expected: &str) -> Result<Keyword> {
        let token = self
            .current()
            .ok_or_else(|| Error::UnexpectedEnd(expected.to_string()))?;
        let keyword = Keyword::from_token(token).ok_or_else(|| Error::UnexpectedToken {
            expected: expected.to_string(),
            found: token.to_string(),
        })?;
        self.advance();
        Ok(keyword)
    }

    fn expect_word(&mut self, expected: &str) -> Result<String> {
        let token = self
            .current()
            .ok_or_else(|| Error::UnexpectedEnd(expected.to_string()))?;
        self.advance();
        Ok(token.to_string())
    }

    fn expect_end(&self) -> Result<()> {
        match self.current() {
            None => Ok(()),
            Some(token) => Err(Error::UnexpectedToken {
                expected: "end of request".to_string(),
                found: token.to_string(),
            }),
        }
    }
}
