//! Front-end lexer
//!
//! Splits a command line on whitespace, commas and parentheses, then strips
//! surrounding quotes from each piece. A piece made only of quotes becomes an
//! empty word.

use nom::{
    bytes::complete::{take_till1, take_while1},
    combinator::opt,
    multi::many0,
    sequence::preceded,
    IResult,
};

use super::token::Token;
use crate::error::{Error, Result};

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '(' | ')' | ';')
}

fn is_quote(c: char) -> bool {
    matches!(c, '\'' | '"')
}

fn separator(input: &str) -> IResult<&str, &str> {
    take_while1(is_separator)(input)
}

fn piece(input: &str) -> IResult<&str, &str> {
    take_till1(is_separator)(input)
}

fn pieces(input: &str) -> IResult<&str, Vec<&str>> {
    let (input, found) = many0(preceded(opt(separator), piece))(input)?;
    let (input, _) = opt(separator)(input)?;
    Ok((input, found))
}

/// Tokenize a command line; the result always ends with [`Token::Eof`]
pub fn tokenize(line: &str) -> Result<Vec<Token>> {
    let (rest, found) =
        pieces(line).map_err(|e| Error::Protocol(format!("cannot tokenize input: {}", e)))?;
    if !rest.is_empty() {
        return Err(Error::Protocol(format!("unexpected input near '{}'", rest)));
    }

    let mut tokens: Vec<Token> = found
        .into_iter()
        .map(|piece| match piece.trim_matches(is_quote) {
            // `''` is an empty string literal
            "" => Token::Word(String::new()),
            text => Token::from_text(text),
        })
        .collect();
    tokens.push(Token::Eof);
    Ok(tokens)
}
