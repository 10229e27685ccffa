//! Keyword codes
//!
//! Requests travel as space-separated tokens; every keyword, operator and
//! type name is sent as its decimal code.

use std::fmt;

/// Protocol keywords and their wire codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Keyword {
    // ========== Commands ==========
    Exit = 1,
    Create = 2,
    Drop = 3,
    Database = 4,
    Table = 5,
    Index = 6,
    Use = 7,
    Insert = 8,
    Delete = 9,
    Add = 10,
    Pk = 11,
    Fk = 12,
    Uq = 13,
    Into = 14,
    Values = 15,
    From = 16,
    Where = 17,
    All = 18,
    Select = 19,
    Columns = 20,

    // ========== Operators ==========
    Eq = 21,
    Lt = 22,
    Gt = 23,
    Le = 24,
    Ge = 25,
    Ne = 26,
    And = 27,
    Or = 28,

    // ========== Types ==========
    Int = 29,
    Float = 30,
    Bit = 31,
    Date = 32,
    DateTime = 33,
    String = 34,
}

const ALL_KEYWORDS: [Keyword; 34] = [
    Keyword::Exit,
    Keyword::Create,
    Keyword::Drop,
    Keyword::Database,
    Keyword::Table,
    Keyword::Index,
    Keyword::Use,
    Keyword::Insert,
    Keyword::Delete,
    Keyword::Add,
    Keyword::Pk,
    Keyword::Fk,
    Keyword::Uq,
    Keyword::Into,
    Keyword::Values,
    Keyword::From,
    Keyword::Where,
    Keyword::All,
    Keyword::Select,
    Keyword::Columns,
    Keyword::Eq,
    Keyword::Lt,
    Keyword::Gt,
    Keyword::Le,
    Keyword::Ge,
    Keyword::Ne,
    Keyword::And,
    Keyword::Or,
    Keyword::Int,
    Keyword::Float,
    Keyword::Bit,
    Keyword::Date,
    Keyword::DateTime,
    Keyword::String,
];

impl Keyword {
    /// Decimal wire code
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        ALL_KEYWORDS.iter().copied().find(|k| k.code() == code)
    }

    /// Parse a wire token as a keyword code
    pub fn from_token(token: &str) -> Option<Self> {
        token.parse::<u8>().ok().and_then(Self::from_code)
    }

    /// Map a front-end word (already lowercased) to its keyword
    pub fn from_word(word: &str) -> Option<Self> {
        let keyword = match word {
            "exit" | "stop" | "quit" => Keyword::Exit,
            "create" => Keyword::Create,
            "drop" => Keyword::Drop,
            "database" => Keyword::Database,
            "table" => Keyword::Table,
            "index" => Keyword::Index,
            "use" => Keyword::Use,
            "insert" => Keyword::Insert,
            "delete" => Keyword::Delete,
            "add" => Keyword::Add,
            "pk" => Keyword::Pk,
            "fk" => Keyword::Fk,
            "uq" => Keyword::Uq,
            "into" => Keyword::Into,
            "values" => Keyword::Values,
            "from" => Keyword::From,
            "where" => Keyword::Where,
            "*" => Keyword::All,
            "select" => Keyword::Select,
            "=" | "==" => Keyword::Eq,
            "<" => Keyword::Lt,
            ">" => Keyword::Gt,
            "<=" => Keyword::Le,
            ">=" => Keyword::Ge,
            "!=" | "<>" => Keyword::Ne,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "int" => Keyword::Int,
            "float" => Keyword::Float,
            "bit" => Keyword::Bit,
            "date" => Keyword::Date,
            "datetime" => Keyword::DateTime,
            "string" | "varchar" => Keyword::String,
            _ => return None,
        };
        Some(keyword)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Keyword::Exit => "EXIT",
            Keyword::Create => "CREATE",
            Keyword::Drop => "DROP",
            Keyword::Database => "DATABASE",
            Keyword::Table => "TABLE",
            Keyword::Index => "INDEX",
            Keyword::Use => "USE",
            Keyword::Insert => "INSERT",
            Keyword::Delete => "DELETE",
            Keyword::Add => "ADD",
            Keyword::Pk => "PK",
            Keyword::Fk => "FK",
            Keyword::Uq => "UQ",
            Keyword::Into => "INTO",
            Keyword::Values => "VALUES",
            Keyword::From => "FROM",
            Keyword::Where => "WHERE",
            Keyword::All => "*",
            Keyword::Select => "SELECT",
            Keyword::Columns => "COLUMNS",
            Keyword::Eq => "=",
            Keyword::Lt => "<",
            Keyword::Gt => ">",
            Keyword::Le => "<=",
            Keyword::Ge => ">=",
            Keyword::Ne => "!=",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Int => "INT",
            Keyword::Float => "FLOAT",
            Keyword::Bit => "BIT",
            Keyword::Date => "DATE",
            Keyword::DateTime => "DATETIME",
            Keyword::String => "STRING",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_dense() {
        for code in 1..=34u8 {
            assert_eq!(Keyword::from_code(code).unwrap().code(), code);
        }
        assert_eq!(Keyword::from_code(0), None);
        assert_eq!(Keyword::from_code(35), None);
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(Keyword::Eq.code(), 21);
        assert_eq!(Keyword::Where.code(), 17);
        assert_eq!(Keyword::String.code(), 34);
        assert_eq!(Keyword::from_token("16"), Some(Keyword::From));
        assert_eq!(Keyword::from_token("users"), None);
    }

    #[test]
    fn test_word_aliases() {
        assert_eq!(Keyword::from_word("quit"), Some(Keyword::Exit));
        assert_eq!(Keyword::from_word("=="), Some(Keyword::Eq));
        assert_eq!(Keyword::from_word("<>"), Some(Keyword::Ne));
        assert_eq!(Keyword::from_word("varchar"), Some(Keyword::String));
        assert_eq!(Keyword::from_word("users"), None);
    }
}
