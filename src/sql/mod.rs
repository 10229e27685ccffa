//! Command-line front end
//!
//! This module turns typed command lines into protocol commands:
//! - Tokens
//! - Lexer
//! - Parser and validity checker

pub mod lexer;
pub mod parser;
pub mod token;

pub use lexer::tokenize;
pub use parser::{parse_line, Parser, Statement};
pub use token::Token;
