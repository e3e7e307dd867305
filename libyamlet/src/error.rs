//! Error types for YAML parsing.

use thiserror::Error;

/// Result type for YAML parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse context carrying filename for error reporting.
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
    pub filename: Option<String>,
}

impl ParseContext {
    /// Create a new parse context.
    pub fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(String::from),
        }
    }

    /// Format a location suffix for error messages. Lines and columns are
    /// already 1-based.
    pub fn loc_suffix(&self, line: u64, column: u64) -> String {
        match &self.filename {
            Some(name) => format!(" at {}:{} of <{}>", line, column, name),
            None => format!(" at {}:{}", line, column),
        }
    }
}

/// Error type for YAML parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Lexical, structural or directive error.
    #[error("{reason}{location}")]
    Syntax {
        reason: String,
        line: u64,
        column: u64,
        location: String,
    },

    /// The same key appeared twice in one mapping.
    #[error("Duplicate mapping key \"{key}\"{location}")]
    DuplicateKey {
        key: String,
        line: u64,
        column: u64,
        location: String,
    },

    /// An alias referenced an anchor that was never declared.
    #[error("Unknown anchor \"{anchor}\"{location}")]
    UnknownAnchor {
        anchor: String,
        line: u64,
        column: u64,
        location: String,
    },
}

impl ParseError {
    /// Create an unlocated syntax error.
    pub fn syntax(reason: impl Into<String>) -> Self {
        ParseError::Syntax {
            reason: reason.into(),
            line: 0,
            column: 0,
            location: String::new(),
        }
    }

    /// Create an unlocated duplicate-key error.
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        ParseError::DuplicateKey {
            key: key.into(),
            line: 0,
            column: 0,
            location: String::new(),
        }
    }

    /// Create an unlocated unknown-anchor error.
    pub fn unknown_anchor(anchor: impl Into<String>) -> Self {
        ParseError::UnknownAnchor {
            anchor: anchor.into(),
            line: 0,
            column: 0,
            location: String::new(),
        }
    }

    /// Create an error with location information.
    pub fn with_location(self, ctx: &ParseContext, line: u64, column: u64) -> Self {
        let location = ctx.loc_suffix(line, column);
        match self {
            ParseError::Syntax { reason, .. } => ParseError::Syntax {
                reason,
                line,
                column,
                location,
            },
            ParseError::DuplicateKey { key, .. } => ParseError::DuplicateKey {
                key,
                line,
                column,
                location,
            },
            ParseError::UnknownAnchor { anchor, .. } => ParseError::UnknownAnchor {
                anchor,
                line,
                column,
                location,
            },
        }
    }

    /// 1-based line of the offending input.
    pub fn line(&self) -> u64 {
        match self {
            ParseError::Syntax { line, .. }
            | ParseError::DuplicateKey { line, .. }
            | ParseError::UnknownAnchor { line, .. } => *line,
        }
    }

    /// 1-based column of the offending input.
    pub fn column(&self) -> u64 {
        match self {
            ParseError::Syntax { column, .. }
            | ParseError::DuplicateKey { column, .. }
            | ParseError::UnknownAnchor { column, .. } => *column,
        }
    }

    /// The message without its location suffix.
    pub fn reason(&self) -> String {
        match self {
            ParseError::Syntax { reason, .. } => reason.clone(),
            ParseError::DuplicateKey { key, .. } => format!("Duplicate mapping key \"{}\"", key),
            ParseError::UnknownAnchor { anchor, .. } => format!("Unknown anchor \"{}\"", anchor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_suffix() {
        let ctx = ParseContext::new(None);
        let err = ParseError::syntax("Unexpected token").with_location(&ctx, 3, 7);
        assert_eq!(err.to_string(), "Unexpected token at 3:7");
        assert_eq!(err.line(), 3);
        assert_eq!(err.column(), 7);
    }

    #[test]
    fn test_location_suffix_with_filename() {
        let ctx = ParseContext::new(Some("doc.yaml"));
        let err = ParseError::duplicate_key("a").with_location(&ctx, 2, 1);
        assert_eq!(err.to_string(), "Duplicate mapping key \"a\" at 2:1 of <doc.yaml>");
        assert_eq!(err.reason(), "Duplicate mapping key \"a\"");
    }
}
