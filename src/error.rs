//! Error types for query translation.

use thiserror::Error;

/// The main error type for parse, normalize and render operations.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed token stream (unterminated quote, bracket or comment).
    #[error("Lexical error at position {position}: {message}")]
    Lex { position: usize, message: String },

    /// Well-formed tokens in an order the grammar does not accept.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Input uses a feature the parser or target dialect does not model.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// An operator or query item refers to more than one table where one is required.
    #[error("Ambiguous reference: {0}")]
    AmbiguousReference(String),

    /// The XML event stream or XML text could not be read or written.
    #[error("XML error: {0}")]
    Xml(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Create a lexical error at the given position.
    pub fn lex(position: usize, message: impl Into<String>) -> Self {
        Self::Lex {
            position,
            message: message.into(),
        }
    }

    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create an unsupported-construct error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create an ambiguous-reference error.
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::AmbiguousReference(message.into())
    }

    pub fn xml(message: impl std::fmt::Display) -> Self {
        Self::Xml(message.to_string())
    }
}

/// Result type alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryError::lex(5, "unterminated string");
        assert_eq!(
            err.to_string(),
            "Lexical error at position 5: unterminated string"
        );
    }

    #[test]
    fn test_unsupported_display() {
        let err = QueryError::unsupported("action 'add'");
        assert_eq!(err.to_string(), "Unsupported: action 'add'");
    }

    #[test]
    fn test_ambiguous_display() {
        let err = QueryError::ambiguous("between spans two tables");
        assert_eq!(err.to_string(), "Ambiguous reference: between spans two tables");
    }
}
