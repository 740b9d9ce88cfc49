//! # Typed attribute values
//!
//! Attribute lists in processor configuration are schema-less: each `value`
//! may be a string, integer, float or boolean, or a sequence of one of those.
//! [`decode_attribute_value`] inspects the raw node and picks the matching
//! [`AttributeValue`] variant.

use opentelemetry::{Array, KeyValue, StringValue, Value as OtelValue};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_yaml::Value;

use crate::error::Error;

/// A scalar or homogeneous slice value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    /// A string.
    String(String),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// A list of strings.
    StringSlice(Vec<String>),
    /// A list of integers. Also the representation of an empty list.
    IntSlice(Vec<i64>),
    /// A list of floats.
    FloatSlice(Vec<f64>),
    /// A list of booleans.
    BoolSlice(Vec<bool>),
}

/// A key and its typed value.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Attribute {
    /// The attribute key.
    pub key: String,
    /// The attribute value.
    pub value: AttributeValue,
}

// Primitive kinds a scalar node can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tag {
    Str,
    Int,
    Float,
    Bool,
}

fn tag_of(node: &Value) -> Result<Tag, Error> {
    match node {
        Value::String(_) => Ok(Tag::Str),
        Value::Bool(_) => Ok(Tag::Bool),
        Value::Number(n) if n.is_f64() => Ok(Tag::Float),
        Value::Number(_) => Ok(Tag::Int),
        Value::Null => Err(Error::UnsupportedTag("!!null".to_string())),
        Value::Tagged(tagged) => Err(Error::UnsupportedTag(tagged.tag.to_string())),
        Value::Sequence(_) => Err(Error::UnsupportedTag("!!seq".to_string())),
        Value::Mapping(_) => Err(Error::UnsupportedTag("!!map".to_string())),
    }
}

/// Decodes a raw node into a typed value.
///
/// Scalars decode by their own tag. A sequence takes the tag of its first
/// element and is then decoded as a whole into a slice of that type, so a
/// later element of another type fails the decode. An empty sequence decodes
/// to an empty [`AttributeValue::IntSlice`]. Mappings are rejected with
/// [`Error::UnsupportedShape`].
pub fn decode_attribute_value(node: &Value) -> Result<AttributeValue, Error> {
    match node {
        Value::Sequence(items) => {
            let Some(first) = items.first() else {
                return Ok(AttributeValue::IntSlice(Vec::new()));
            };
            Ok(match tag_of(first)? {
                Tag::Str => AttributeValue::StringSlice(decode_slice(node)?),
                Tag::Int => AttributeValue::IntSlice(decode_slice(node)?),
                Tag::Float => AttributeValue::FloatSlice(decode_slice(node)?),
                Tag::Bool => AttributeValue::BoolSlice(decode_slice(node)?),
            })
        }
        Value::Mapping(_) => Err(Error::UnsupportedShape("mapping")),
        scalar => decode_scalar(scalar),
    }
}

fn decode_scalar(node: &Value) -> Result<AttributeValue, Error> {
    match (tag_of(node)?, node) {
        (Tag::Str, Value::String(s)) => Ok(AttributeValue::String(s.clone())),
        (Tag::Bool, Value::Bool(b)) => Ok(AttributeValue::Bool(*b)),
        (Tag::Float, Value::Number(n)) => n
            .as_f64()
            .map(AttributeValue::Float)
            .ok_or(Error::UnsupportedShape("float out of range")),
        (Tag::Int, Value::Number(n)) => n
            .as_i64()
            .map(AttributeValue::Int)
            .ok_or(Error::UnsupportedShape("integer out of range")),
        _ => Err(Error::UnsupportedShape("scalar")),
    }
}

fn decode_slice<T: DeserializeOwned>(node: &Value) -> Result<Vec<T>, Error> {
    Ok(serde_yaml::from_value(node.clone())?)
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let node = Value::deserialize(deserializer)?;
        decode_attribute_value(&node).map_err(de::Error::custom)
    }
}

impl From<AttributeValue> for OtelValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::String(s) => OtelValue::String(s.into()),
            AttributeValue::Int(i) => OtelValue::I64(i),
            AttributeValue::Float(f) => OtelValue::F64(f),
            AttributeValue::Bool(b) => OtelValue::Bool(b),
            AttributeValue::StringSlice(values) => OtelValue::Array(Array::String(
                values.into_iter().map(StringValue::from).collect(),
            )),
            AttributeValue::IntSlice(values) => OtelValue::Array(Array::I64(values)),
            AttributeValue::FloatSlice(values) => OtelValue::Array(Array::F64(values)),
            AttributeValue::BoolSlice(values) => OtelValue::Array(Array::Bool(values)),
        }
    }
}

impl From<Attribute> for KeyValue {
    fn from(attribute: Attribute) -> Self {
        KeyValue::new(attribute.key, OtelValue::from(attribute.value))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn decode(yaml: &str) -> Result<AttributeValue, Error> {
        decode_attribute_value(&serde_yaml::from_str(yaml).unwrap())
    }

    #[rstest]
    #[case("x", AttributeValue::String("x".into()))]
    #[case("'1'", AttributeValue::String("1".into()))]
    #[case("-7", AttributeValue::Int(-7))]
    #[case("2.5", AttributeValue::Float(2.5))]
    #[case("true", AttributeValue::Bool(true))]
    #[case("[a, b]", AttributeValue::StringSlice(vec!["a".into(), "b".into()]))]
    #[case("[1, 2]", AttributeValue::IntSlice(vec![1, 2]))]
    #[case("[1.5, 2]", AttributeValue::FloatSlice(vec![1.5, 2.0]))]
    #[case("[true, false]", AttributeValue::BoolSlice(vec![true, false]))]
    #[case("[]", AttributeValue::IntSlice(vec![]))]
    fn decodes(#[case] yaml: &str, #[case] expected: AttributeValue) {
        assert_eq!(decode(yaml).unwrap(), expected);
    }

    #[test]
    fn rejects_unsupported_nodes() {
        assert!(matches!(decode("~"), Err(Error::UnsupportedTag(_))));
        assert!(matches!(decode("!custom 1"), Err(Error::UnsupportedTag(_))));
        assert!(matches!(decode("[~, 1]"), Err(Error::UnsupportedTag(_))));
        assert!(matches!(decode("[[1]]"), Err(Error::UnsupportedTag(_))));
        assert!(matches!(decode("{a: 1}"), Err(Error::UnsupportedShape(_))));
    }

    #[test]
    fn first_element_fixes_slice_type() {
        assert!(matches!(decode("[1, x]"), Err(Error::Yaml(_))));
        assert!(matches!(decode("[true, 1]"), Err(Error::Yaml(_))));
    }

    #[test]
    fn attribute_list_keeps_order() {
        let attributes: Vec<Attribute> = serde_yaml::from_str(
            "[{key: a, value: 1}, {key: b, value: [1, 2]}, {key: c, value: x}]",
        )
        .unwrap();
        let keys: Vec<_> = attributes.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(attributes[0].value, AttributeValue::Int(1));
        assert_eq!(attributes[1].value, AttributeValue::IntSlice(vec![1, 2]));
        assert_eq!(attributes[2].value, AttributeValue::String("x".into()));
    }

    #[test]
    fn converts_to_key_value() {
        let kv = KeyValue::from(Attribute {
            key: "ports".into(),
            value: AttributeValue::IntSlice(vec![80, 443]),
        });
        assert_eq!(kv.key.as_str(), "ports");
        assert_eq!(kv.value, OtelValue::Array(Array::I64(vec![80, 443])));
    }
}
