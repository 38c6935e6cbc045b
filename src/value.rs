//! The resolved value model: the output of the resolver, free of
//! substitutions, concatenations and includes.

use std::fmt;

/// Represents any fully resolved HOCON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
}

/// The default value is `Value::Null`.
impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Human-readable name of the value kind, used by decoder errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// The literal text form a scalar takes inside a string concatenation.
    /// Arrays and objects have no such form; concatenations mixing them with
    /// scalars are rejected by the resolver.
    pub(crate) fn literal_text(&self) -> Option<String> {
        match self {
            Value::Null => Some("null".to_owned()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Long(n) => Some(n.to_string()),
            Value::Double(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// A resolved object: an insertion-ordered list of named fields.
///
/// Order is irrelevant for lookup but preserved for rendering and
/// round-tripping. Duplicate names cannot occur; the resolver merges or
/// replaces duplicates before constructing an `Object`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    fields: Vec<(String, Value)>,
}

impl Object {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Object { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Navigates a multi-segment path through nested objects.
    pub fn get_path(&self, path: &[String]) -> Option<&Value> {
        let (head, tail) = path.split_first()?;
        let value = self.get(head)?;
        if tail.is_empty() {
            Some(value)
        } else if let Value::Object(child) = value {
            child.get_path(tail)
        } else {
            None
        }
    }

    /// Replaces an existing field in place or appends a new one, keeping the
    /// position of the first definition.
    pub fn set(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name.to_owned(), value));
        }
    }

    /// Recursively merges `other` into `self`: keys of `other` win on scalar
    /// collision, object values merge field by field, new keys are appended.
    pub fn merge(&mut self, other: Object) {
        for (name, value) in other.fields {
            match (self.get_mut(&name), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => existing.merge(incoming),
                (_, value) => self.set(&name, value),
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Array(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Value::Object(object) => write!(f, "{object}"),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}:{value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! object {
        ( $( $x:expr => $y:expr ),* ) => {
            Object::new(vec![ $( ($x.to_owned(), $y) ),* ])
        };
    }

    #[test]
    fn set_preserves_position_of_first_definition() {
        let mut obj = object!["a" => Value::Long(1), "b" => Value::Long(2)];
        obj.set("a", Value::Long(3));

        assert_eq!(obj, object!["a" => Value::Long(3), "b" => Value::Long(2)]);
    }

    #[test]
    fn merge_objects_recursively() {
        let mut to = object![
            "field1" => Value::Object(object!["sub1" => Value::Long(1)])
        ];
        let from = object![
            "field1" => Value::Object(object!["sub2" => Value::Long(2)]),
            "field2" => Value::Object(object!["sub3" => Value::Long(3)])
        ];

        to.merge(from);

        let expected = object![
            "field1" => Value::Object(object![
                "sub1" => Value::Long(1),
                "sub2" => Value::Long(2)
            ]),
            "field2" => Value::Object(object!["sub3" => Value::Long(3)])
        ];
        assert_eq!(to, expected);
    }

    #[test]
    fn merge_replaces_on_scalar_collision() {
        let mut to = object!["a" => Value::Object(object!["x" => Value::Long(1)])];
        to.merge(object!["a" => Value::Long(7)]);
        assert_eq!(to, object!["a" => Value::Long(7)]);
    }

    #[test]
    fn path_navigation() {
        let obj = object![
            "a" => Value::Object(object!["b" => Value::String("x".to_owned())])
        ];
        let path: Vec<String> = vec!["a".to_owned(), "b".to_owned()];
        assert_eq!(obj.get_path(&path), Some(&Value::String("x".to_owned())));
        assert_eq!(obj.get_path(&["a".to_owned(), "c".to_owned()]), None);
    }

    #[test]
    fn literal_text_forms() {
        assert_eq!(Value::Bool(true).literal_text().as_deref(), Some("true"));
        assert_eq!(Value::Long(-3).literal_text().as_deref(), Some("-3"));
        assert_eq!(Value::Null.literal_text().as_deref(), Some("null"));
        assert_eq!(Value::Array(vec![]).literal_text(), None);
    }
}
