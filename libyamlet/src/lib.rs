//! YAML 1.2 parser producing a structured value tree.
//!
//! Scalars resolve under the core schema. Numbers that do not fit an `i64`
//! or an `f64` without loss become arbitrary-precision [`Decimal`]s. An
//! optional callback receives a `Pre` and a `Post` [`Event`] for every node,
//! including events replayed at alias sites.
//!
//! # Parsing Pipeline
//!
//! The parser operates in two phases:
//!
//! 1. **Lexer**: Converts source text into a token stream, scanning quoted,
//!    block and plain scalars under a block indentation threshold that the
//!    parser adjusts as it descends.
//!
//! 2. **Parser**: Pulls tokens on demand and builds one [`Value`] per
//!    document, resolving tags, anchors and aliases along the way.
//!
//! # Example
//!
//! ```
//! use libyamlet::{parse, Value};
//!
//! let value = parse("name: yamlet\nsizes: [1, 2.5]\n").unwrap();
//! assert_eq!(value.get("name"), Some(&Value::from("yamlet")));
//! assert_eq!(value.to_string(), r#"{"name":"yamlet","sizes":[1,2.5]}"#);
//! ```

mod decimal;
mod error;
mod event;
mod lexer;
mod parser;
mod scalar;
mod scanner;
mod value;

pub use decimal::{Decimal, DecimalError};
pub use error::{ParseContext, ParseError, Result};
pub use event::{Callback, CallbackRecord, Context, Event, Phase, ValueKind};
pub use lexer::{Lexer, ScalarStyle, Token, TokenKind};
pub use parser::Parser;
pub use scalar::interpret_scalar;
pub use value::Value;

/// Parse the first YAML document of a string and check that the rest of
/// the stream is well formed.
pub fn parse(input: &str) -> Result<Value> {
    parse_with_filename(input, None)
}

/// Parse a YAML document with a filename for error messages.
pub fn parse_with_filename(input: &str, filename: Option<&str>) -> Result<Value> {
    let mut parser = Parser::new(input);
    if let Some(name) = filename {
        parser = parser.with_filename(name);
    }
    let value = parser.parse()?;
    parser.validate_end_of_stream()?;
    Ok(value)
}

/// Parse the first document, reporting every node to `callback`.
///
/// Documents after the first are validated without producing events.
pub fn parse_with_callback<'c, F>(input: &str, callback: F) -> Result<Value>
where
    F: FnMut(&Event<'_>) + 'c,
{
    let mut parser = Parser::with_callback(input, callback);
    let value = parser.parse()?;
    parser.validate_end_of_stream()?;
    Ok(value)
}

/// Parse every document of a stream.
pub fn parse_all(input: &str) -> Result<Vec<Value>> {
    let mut parser = Parser::new(input);
    let mut documents = vec![parser.parse()?];
    while !parser.at_end() {
        documents.push(parser.parse()?);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        let docs = parse_all("--- 1\n--- [a]\n...\n--- {b: c}\n").unwrap();
        assert_eq!(docs, vec![Value::Integer(1), Value::from(vec![Value::from("a")]), parse("b: c").unwrap()]);
    }

    #[test]
    fn test_parse_all_crlf() {
        let docs = parse_all("a: 1\r\n---\r\nb: 2\r\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].get("b"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_parse_checks_later_documents() {
        let err = parse("--- 1\n--- {a: 1, a: 2}\n").unwrap_err();
        assert_eq!(err.to_string(), "Duplicate mapping key \"a\" at 2:12");
    }

    #[test]
    fn test_parse_with_callback_counts_nodes() {
        let mut count = 0;
        let value = parse_with_callback("[1, [2]]\n--- ignored", |_| count += 1).unwrap();
        assert_eq!(value.to_string(), "[1,[2]]");
        assert_eq!(count, 8);
    }
}
