//! serde support: deserializes resolved values into user types.

use crate::config::Config;
use crate::error::ConfigError;
use crate::value::Value;
use serde::de::value::StrDeserializer;
use serde::de::{DeserializeOwned, DeserializeSeed, Visitor};
use serde::forward_to_deserialize_any;

/// Parses, resolves and deserializes a standalone document.
pub fn from_str<T: DeserializeOwned>(text: &str) -> Result<T, ConfigError> {
    let config = Config::parse(text)?;
    from_value(&Value::Object(config.root().clone()))
}

/// Deserializes a resolved value.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, ConfigError> {
    T::deserialize(ValueDeserializer(value))
}

struct ValueDeserializer<'de>(&'de Value);

impl<'de> serde::Deserializer<'de> for ValueDeserializer<'de> {
    type Error = ConfigError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConfigError> {
        match self.0 {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Long(n) => visitor.visit_i64(*n),
            Value::Double(n) => visitor.visit_f64(*n),
            Value::String(s) => visitor.visit_str(s),
            Value::Array(elements) => visitor.visit_seq(SeqAccess { elements: elements.iter() }),
            Value::Object(object) => visitor.visit_map(MapAccess { entries: object.iter().collect(), index: 0 }),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, ConfigError> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, ConfigError> {
        visitor.visit_newtype_struct(self)
    }

    /// Unit enum variants deserialize from their string form.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, ConfigError> {
        match self.0 {
            Value::String(s) => visitor.visit_enum(StrDeserializer::<ConfigError>::new(s)),
            other => Err(ConfigError::Decoding { expected: "string", found: other.kind() }),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

struct SeqAccess<'de> {
    elements: std::slice::Iter<'de, Value>,
}

impl<'de> serde::de::SeqAccess<'de> for SeqAccess<'de> {
    type Error = ConfigError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, ConfigError> {
        self.elements
            .next()
            .map(|element| seed.deserialize(ValueDeserializer(element)))
            .transpose()
    }
}

struct MapAccess<'de> {
    entries: Vec<(&'de str, &'de Value)>,
    index: usize,
}

impl<'de> serde::de::MapAccess<'de> for MapAccess<'de> {
    type Error = ConfigError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, ConfigError> {
        match self.entries.get(self.index) {
            Some((name, _)) => seed.deserialize(StrDeserializer::<ConfigError>::new(name)).map(Some),
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, ConfigError> {
        let (_, value) = self.entries[self.index];
        self.index += 1;
        seed.deserialize(ValueDeserializer(value))
    }
}
