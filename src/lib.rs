//! A HOCON configuration engine: parsing, path expansion, substitution
//! resolution and typed access.
//!
//! HOCON is a JSON superset for humans: braces at the root are optional,
//! duplicate objects merge, adjacent values concatenate, `${path}`
//! references other values, `+=` appends to arrays, and `include` splices
//! other documents in. Source text is parsed into an unresolved builder
//! tree ([`ast`]), dotted keys are expanded ([`expand_paths`]), and the
//! resolver evaluates substitutions, concatenations and merges into a
//! [`Config`] of plain [`Value`]s.
//!
//! ```
//! let config = rhocon::Config::parse("server { host = localhost, port = 8080 }").unwrap();
//! assert_eq!(config.get::<i64>("server.port").unwrap(), 8080);
//! assert_eq!(config.get::<String>("server.host").unwrap(), "localhost");
//! ```
//!
//! Include loading is the caller's job: pre-load every include source into
//! an [`IncludeMap`] and pass it to [`resolve`]. The engine itself performs
//! no I/O.

pub mod ast;
mod config;
mod de;
mod error;
mod expand;
mod parser;
mod resolve;
pub mod value;

pub use config::{Config, ConfigDecoder, Origin, Scope};
pub use de::{from_str, from_value};
pub use error::{ConfigError, ResolverError, ResolverErrorKind, ResolverErrors, SyntaxError};
pub use expand::expand_paths;
pub use parser::parse;
pub use resolve::{resolve, IncludeMap};
pub use value::Value;
