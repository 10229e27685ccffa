//! Front-end tokens
//!
//! A command line is split into keywords and plain words. Keywords remember
//! the text they were typed as, so a keyword can still be used as a literal
//! value.

use std::fmt;

use crate::protocol::Keyword;

/// Command-line token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A recognised keyword, operator or type name
    Keyword(Keyword, String),
    /// Identifier or literal
    Word(String),
    /// End of input
    Eof,
}

impl Token {
    /// Classify one stripped piece of input
    pub fn from_text(text: &str) -> Self {
        match Keyword::from_word(&text.to_lowercase()) {
            Some(keyword) => Token::Keyword(keyword, text.to_string()),
            None => Token::Word(text.to_string()),
        }
    }

    pub fn keyword(&self) -> Option<Keyword> {
        match self {
            Token::Keyword(keyword, _) => Some(*keyword),
            _ => None,
        }
    }

    /// Text as typed
    pub fn text(&self) -> &str {
        match self {
            Token::Keyword(_, text) | Token::Word(text) => text,
            Token::Eof => "",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(keyword, _) => write!(f, "{}", keyword),
            Token::Word(word) => write!(f, "{}", word),
            Token::Eof => write!(f, "end of input"),
        }
    }
}
