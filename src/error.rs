//! Error taxonomy of the engine.
//!
//! Syntax errors abort parsing at the first failure and carry a source
//! position plus the offending line. Resolution errors for distinct fields
//! are independent and are collected into a non-empty ordered set, so a
//! single `resolve` call can report several unrelated problems at once.

use crate::ast::Key;
use crate::config::Origin;
use std::error::Error as StdError;
use std::fmt;

/// A grammar-stage failure.
///
/// Rendered as `[<line>.<column>] failure: <message>` followed by a blank
/// line, the offending source line and a caret pointing at the column.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub line: u32,
    pub column: usize,
    pub message: String,
    pub source_line: String,
}

impl SyntaxError {
    pub(crate) fn new(input: &str, line: u32, column: usize, message: String) -> Self {
        let source_line = input.lines().nth(line.saturating_sub(1) as usize).unwrap_or("").to_owned();
        SyntaxError { line, column, message, source_line }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "[{}.{}] failure: {}", self.line, self.column, self.message)?;
        writeln!(f)?;
        writeln!(f, "{}", self.source_line)?;
        write!(f, "{}^", " ".repeat(self.column.saturating_sub(1)))
    }
}

impl StdError for SyntaxError {}

/// What went wrong while resolving one field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolverErrorKind {
    #[error("Missing required reference: '{0}'")]
    MissingReference(Key),
    #[error("Circular Reference involving path '{0}'")]
    CircularReference(Key),
    #[error("Invalid concatenation of values. It must contain either only objects, only arrays or only simple values")]
    InvalidConcat,
    #[error("Missing required include '{0}'")]
    MissingInclude(String),
    #[error("Error including '{resource}': {message}")]
    IncludeLoad { resource: String, message: String },
}

/// A resolution failure attributed to the path of the field being resolved.
/// An empty path renders as `<RootKey>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverError {
    pub path: Key,
    pub kind: ResolverErrorKind,
}

impl ResolverError {
    pub(crate) fn new(path: Key, kind: ResolverErrorKind) -> Self {
        ResolverError { path, kind }
    }
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}': {}", self.path, self.kind)
    }
}

/// The non-empty, ordered collection of resolution errors of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverErrors(pub Vec<ResolverError>);

impl fmt::Display for ResolverErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("One or more errors resolving configuration: ")?;
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl StdError for ResolverErrors {}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Resolver(#[from] ResolverErrors),

    #[error("Path '{path}' not found in {origin}")]
    NotFound { path: String, origin: Origin },

    #[error("Invalid type: expected {expected}, found {found}")]
    Decoding { expected: &'static str, found: &'static str },

    /// Free-form failure, also the target of `serde::de::Error::custom`.
    #[error("{0}")]
    Message(String),
}

impl serde::de::Error for ConfigError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ConfigError::Message(msg.to_string())
    }
}
