//! The unresolved builder tree.
//!
//! HOCON allows merging duplicate objects, concatenating adjacent values,
//! substitutions and external inclusions. Source text is therefore first
//! parsed into this builder representation and only then folded into
//! resolved values by the resolver.

use std::fmt;

/// A 1-based source position, kept on the nodes the resolver may need to
/// report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub column: usize,
}

impl Span {
    pub fn new(line: u32, column: usize) -> Self {
        Span { line, column }
    }
}

/// A field path: a non-empty ordered list of key segments.
///
/// Segment equality is exact string equality; no normalization is applied.
/// A `.` inside a quoted segment does not split the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Key(Vec<String>);

impl Key {
    pub fn new(segments: Vec<String>) -> Self {
        Key(segments)
    }

    pub fn of(segment: impl Into<String>) -> Self {
        Key(vec![segment.into()])
    }

    /// Splits a dotted path the way the `Config` façade addresses values.
    pub fn parse(dotted: &str) -> Self {
        Key(dotted.split('.').map(str::to_owned).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, segment: &str) -> Key {
        let mut segments = self.0.clone();
        segments.push(segment.to_owned());
        Key(segments)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<RootKey>")
        } else {
            f.write_str(&self.0.join("."))
        }
    }
}

impl From<Vec<&str>> for Key {
    fn from(segments: Vec<&str>) -> Self {
        Key(segments.into_iter().map(str::to_owned).collect())
    }
}

/// Source of an include directive. Doubles as the lookup key of the
/// caller-supplied include map, so the `required(...)` wrapper is kept
/// separately on [`Include`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IncludePath {
    /// `include "source"` - URL vs file is sniffed by the loader.
    Any(String),
    File(String),
    Classpath(String),
    Url(String),
}

impl IncludePath {
    /// The raw source text, as used in error messages.
    pub fn source(&self) -> &str {
        match self {
            IncludePath::Any(s) | IncludePath::File(s) | IncludePath::Classpath(s) | IncludePath::Url(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub path: IncludePath,
    pub required: bool,
    pub span: Span,
}

/// One element of a concatenation, together with the whitespace that
/// separated it from the previous element. The whitespace is preserved
/// verbatim because string concatenations must reproduce it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatPart {
    pub whitespace: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// May contain multiple segments before path expansion.
    pub key: Key,
    pub value: Value,
    pub span: Span,
}

/// Fields and include directives appear in the same grammar position, so an
/// object body is a sequence of either.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Field(Field),
    Include(Include),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub entries: Vec<Entry>,
}

impl Object {
    pub fn new(entries: Vec<Entry>) -> Self {
        Object { entries }
    }
}

/// An unresolved value as produced by the grammar stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
    /// Adjacent values on one logical line, e.g. `a = [1,2] [3,4]`.
    Concat { first: Box<Value>, rest: Vec<ConcatPart> },
    /// `${path}` or `${?path}`.
    Substitution { path: Key, optional: bool, span: Span },
    /// The accumulated prior value of the field currently being defined,
    /// produced by the `+=` operator. Distinct from a named substitution:
    /// its target is not a generic path lookup.
    SelfReference,
}

/// Enumerates the include directives of a builder tree in declaration
/// order, including those nested inside object bodies.
pub fn include_directives(root: &Object) -> Vec<&Include> {
    let mut out = Vec::new();
    collect_includes(root, &mut out);
    out
}

fn collect_includes<'a>(object: &'a Object, out: &mut Vec<&'a Include>) {
    for entry in &object.entries {
        match entry {
            Entry::Include(include) => out.push(include),
            Entry::Field(field) => collect_includes_in_value(&field.value, out),
        }
    }
}

fn collect_includes_in_value<'a>(value: &'a Value, out: &mut Vec<&'a Include>) {
    match value {
        Value::Object(object) => collect_includes(object, out),
        Value::Array(elements) => {
            for element in elements {
                collect_includes_in_value(element, out);
            }
        }
        Value::Concat { first, rest } => {
            collect_includes_in_value(first, out);
            for part in rest {
                collect_includes_in_value(&part.value, out);
            }
        }
        _ => {}
    }
}
