//! The configuration façade: typed dotted-path access over a resolved
//! object, with an origin for error messages and a fallback chain.
//!
//! Lookup walks the object graph segment by segment and delegates to the
//! fallback when the path is absent; nothing is ever mutated by a lookup.

use crate::ast::Key;
use crate::error::ConfigError;
use crate::resolve::{resolve, IncludeMap};
use crate::value::{self, Value};
use std::fmt;
use std::time::Duration;

/// Where a configuration came from, in increasing precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    Defaults,
    Directory,
    Document,
    #[default]
    Programmatic,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Scope::Defaults => "defaults",
            Scope::Directory => "directory",
            Scope::Document => "document",
            Scope::Programmatic => "programmatic",
        })
    }
}

/// Identifies a configuration source. Used only in error messages and
/// when chaining configurations, never for lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Origin {
    pub scope: Scope,
    pub source: Option<String>,
}

impl Origin {
    pub fn new(scope: Scope, source: impl Into<String>) -> Self {
        Origin { scope, source: Some(source.into()) }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} '{}'", self.scope, source),
            None => write!(f, "{}", self.scope),
        }
    }
}

/// A fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    object: value::Object,
    origin: Origin,
    fallback: Option<Box<Config>>,
}

impl Config {
    pub(crate) fn resolved(object: value::Object, origin: Origin, fallback: Option<Config>) -> Self {
        Config { object, origin, fallback: fallback.map(Box::new) }
    }

    /// Parses and resolves a standalone document with no fallback and no
    /// includes.
    pub fn parse(text: &str) -> Result<Config, ConfigError> {
        let tree = crate::parser::parse(text)?;
        resolve(tree, Origin::default(), Config::default(), &IncludeMap::new())
    }

    pub fn root(&self) -> &value::Object {
        &self.object
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Looks up a dotted path and decodes the value.
    pub fn get<T: ConfigDecoder>(&self, path: &str) -> Result<T, ConfigError> {
        let key = Key::parse(path);
        match self.find(key.segments()) {
            Some(value) => T::decode(value),
            None => Err(ConfigError::NotFound { path: path.to_owned(), origin: self.origin.clone() }),
        }
    }

    /// Like [`Config::get`], but absence is not an error.
    pub fn get_opt<T: ConfigDecoder>(&self, path: &str) -> Result<Option<T>, ConfigError> {
        let key = Key::parse(path);
        match self.find(key.segments()) {
            Some(value) => T::decode(value).map(Some),
            None => Ok(None),
        }
    }

    /// Appends `other` to the end of the fallback chain.
    pub fn with_fallback(mut self, other: Config) -> Config {
        self.fallback = Some(Box::new(match self.fallback {
            Some(existing) => existing.with_fallback(other),
            None => other,
        }));
        self
    }

    pub(crate) fn find(&self, path: &[String]) -> Option<&Value> {
        self.object
            .get_path(path)
            .or_else(|| self.fallback.as_ref().and_then(|fallback| fallback.find(path)))
    }
}

/// Decodes a resolved value into a concrete type.
pub trait ConfigDecoder: Sized {
    fn decode(value: &Value) -> Result<Self, ConfigError>;
}

fn mismatch(expected: &'static str, value: &Value) -> ConfigError {
    ConfigError::Decoding { expected, found: value.kind() }
}

impl ConfigDecoder for bool {
    fn decode(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("boolean", other)),
        }
    }
}

impl ConfigDecoder for i64 {
    fn decode(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Long(n) => Ok(*n),
            other => Err(mismatch("long", other)),
        }
    }
}

impl ConfigDecoder for f64 {
    fn decode(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Long(n) => Ok(*n as f64),
            Value::Double(n) => Ok(*n),
            other => Err(mismatch("double", other)),
        }
    }
}

/// Scalars other than null coerce to their literal text form.
impl ConfigDecoder for String {
    fn decode(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Null => Err(mismatch("string", value)),
            other => other.literal_text().ok_or_else(|| mismatch("string", other)),
        }
    }
}

impl<T: ConfigDecoder> ConfigDecoder for Vec<T> {
    fn decode(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Array(elements) => elements.iter().map(T::decode).collect(),
            other => Err(mismatch("array", other)),
        }
    }
}

impl ConfigDecoder for Value {
    fn decode(value: &Value) -> Result<Self, ConfigError> {
        Ok(value.clone())
    }
}

/// Accepts a bare number of milliseconds or a duration string such as
/// `10s`, `250 ms` or `2 hours`.
impl ConfigDecoder for Duration {
    fn decode(value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Long(n) if *n >= 0 => Ok(Duration::from_millis(*n as u64)),
            Value::String(s) => {
                parse_duration(s).ok_or_else(|| ConfigError::Message(format!("Invalid duration value: '{s}'")))
            }
            other => Err(mismatch("duration", other)),
        }
    }
}

fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let split = text.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let amount: f64 = number.parse().ok()?;

    let seconds_per_unit = match unit.trim() {
        // a bare number of milliseconds
        "" => 1e-3,
        "ns" | "nano" | "nanos" | "nanosecond" | "nanoseconds" => 1e-9,
        "us" | "micro" | "micros" | "microsecond" | "microseconds" => 1e-6,
        "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => 1e-3,
        "s" | "second" | "seconds" => 1.0,
        "m" | "minute" | "minutes" => 60.0,
        "h" | "hour" | "hours" => 3600.0,
        "d" | "day" | "days" => 86400.0,
        _ => return None,
    };
    Duration::try_from_secs_f64(amount * seconds_per_unit).ok()
}
