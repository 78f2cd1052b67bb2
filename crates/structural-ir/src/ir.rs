//! The intermediate representation and its JSON wire form.
//!
//! Wire shapes:
//!
//! - primitives and `null` are carried as-is, arrays as arrays;
//! - `undefined` is `{"cName": "__undefined__", "data": {}}`;
//! - `NaN` and the infinities are `{"cName": "__number__", "value": "NaN" | "Infinity" | "-Infinity", "data": {}}`,
//!   both as leaves and as boxed values;
//! - objects are `{"cName": <type>, "value"?: <boxed primitive>, "data": {...}}`;
//! - each `data` entry is `{"v": <node>, "w": <mutable>, "e": <visible>, "c": <redefinable>}`.

use crate::error::{Error, Result};
use crate::options::CodecOptions;
use crate::value::{Attributes, Primitive};
use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

/// Type tag reserved for `undefined`.
pub const UNDEFINED_TAG: &str = "__undefined__";

/// Type tag reserved for numbers JSON has no literal for.
pub const NUMBER_TAG: &str = "__number__";

const TYPE_KEY: &str = "cName";
const VALUE_KEY: &str = "value";
const DATA_KEY: &str = "data";
const FIELD_VALUE_KEY: &str = "v";
const FIELD_MUTABLE_KEY: &str = "w";
const FIELD_VISIBLE_KEY: &str = "e";
const FIELD_REDEFINABLE_KEY: &str = "c";

/// A node of the IR tree.
#[derive(Debug, Clone, PartialEq)]
pub enum IrNode {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<IrNode>),
    Object(IrObject),
}

/// A tagged object node.
///
/// `wrapped` is present exactly when the originating type derives from a
/// primitive-wrapping kind.
#[derive(Debug, Clone, PartialEq)]
pub struct IrObject {
    pub type_name: String,
    pub wrapped: Option<Primitive>,
    pub fields: IndexMap<String, FieldRecord>,
}

/// A serialized field: its value and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub value: IrNode,
    pub attributes: Attributes,
}

impl IrNode {
    pub fn to_json(&self) -> JsonValue {
        match self {
            IrNode::Null => JsonValue::Null,
            IrNode::Undefined => {
                let mut map = Map::new();
                map.insert(TYPE_KEY.to_string(), JsonValue::String(UNDEFINED_TAG.to_string()));
                map.insert(DATA_KEY.to_string(), JsonValue::Object(Map::new()));
                JsonValue::Object(map)
            }
            IrNode::Bool(b) => JsonValue::Bool(*b),
            IrNode::Number(n) => number_node(*n),
            IrNode::String(s) => JsonValue::String(s.clone()),
            IrNode::Array(items) => JsonValue::Array(items.iter().map(IrNode::to_json).collect()),
            IrNode::Object(obj) => obj.to_json(),
        }
    }

    /// Parses the wire form, accepting at most
    /// [`CodecOptions::DEFAULT_MAX_DEPTH`] nested arrays and objects.
    ///
    /// Any object-shaped node without a non-empty `cName` fails with
    /// [`Error::RawObjectWithoutTag`], wherever it sits in the tree.
    pub fn from_json(json: &JsonValue) -> Result<IrNode> {
        IrNode::from_json_with_limit(json, CodecOptions::DEFAULT_MAX_DEPTH)
    }

    /// Parses the wire form, failing with [`Error::DepthLimitExceeded`] once
    /// arrays and objects nest deeper than `max_depth`.
    pub fn from_json_with_limit(json: &JsonValue, max_depth: usize) -> Result<IrNode> {
        read_node(json, 0, max_depth)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json())?)
    }

    /// Parses JSON text. Each IR object spans three JSON levels, so the text
    /// is parsed without serde_json's recursion limit and depth is bounded by
    /// [`IrNode::from_json`] instead.
    pub fn from_json_str(text: &str) -> Result<IrNode> {
        IrNode::from_json_str_with_limit(text, CodecOptions::DEFAULT_MAX_DEPTH)
    }

    pub fn from_json_str_with_limit(text: &str, max_depth: usize) -> Result<IrNode> {
        let mut de = serde_json::Deserializer::from_str(text);
        de.disable_recursion_limit();
        let json = JsonValue::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        IrNode::from_json_with_limit(&json, max_depth)
    }
}

fn read_node(json: &JsonValue, depth: usize, max_depth: usize) -> Result<IrNode> {
    let enter = || {
        if depth >= max_depth {
            Err(Error::DepthLimitExceeded { limit: max_depth })
        } else {
            Ok(())
        }
    };
    match json {
        JsonValue::Null => Ok(IrNode::Null),
        JsonValue::Bool(b) => Ok(IrNode::Bool(*b)),
        JsonValue::Number(n) => Ok(IrNode::Number(n.as_f64().unwrap_or(f64::NAN))),
        JsonValue::String(s) => Ok(IrNode::String(s.clone())),
        JsonValue::Array(items) => {
            enter()?;
            Ok(IrNode::Array(
                items
                    .iter()
                    .map(|item| read_node(item, depth + 1, max_depth))
                    .collect::<Result<Vec<_>>>()?,
            ))
        }
        JsonValue::Object(map) => {
            let type_name = match map.get(TYPE_KEY) {
                Some(JsonValue::String(name)) if !name.is_empty() => name,
                _ => return Err(Error::RawObjectWithoutTag),
            };
            match type_name.as_str() {
                UNDEFINED_TAG => Ok(IrNode::Undefined),
                NUMBER_TAG => tagged_number(map).map(IrNode::Number),
                _ => {
                    enter()?;
                    IrObject::from_json(type_name, map, depth, max_depth).map(IrNode::Object)
                }
            }
        }
    }
}

impl IrObject {
    fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert(TYPE_KEY.to_string(), JsonValue::String(self.type_name.clone()));
        if let Some(p) = &self.wrapped {
            map.insert(VALUE_KEY.to_string(), primitive_node(p));
        }
        let mut data = Map::new();
        for (name, record) in &self.fields {
            let mut entry = Map::new();
            entry.insert(FIELD_VALUE_KEY.to_string(), record.value.to_json());
            entry.insert(FIELD_MUTABLE_KEY.to_string(), JsonValue::Bool(record.attributes.mutable));
            entry.insert(FIELD_VISIBLE_KEY.to_string(), JsonValue::Bool(record.attributes.visible));
            entry.insert(FIELD_REDEFINABLE_KEY.to_string(), JsonValue::Bool(record.attributes.redefinable));
            data.insert(name.clone(), JsonValue::Object(entry));
        }
        map.insert(DATA_KEY.to_string(), JsonValue::Object(data));
        JsonValue::Object(map)
    }

    fn from_json(type_name: &str, map: &Map<String, JsonValue>, depth: usize, max_depth: usize) -> Result<IrObject> {
        let wrapped = map.get(VALUE_KEY).map(primitive_from_json).transpose()?;
        let data = match map.get(DATA_KEY) {
            Some(JsonValue::Object(data)) => data,
            Some(_) => return Err(Error::InvalidIr(format!("{type_name}: data must be an object"))),
            None => return Err(Error::InvalidIr(format!("{type_name}: missing data"))),
        };
        let mut fields = IndexMap::with_capacity(data.len());
        for (name, entry) in data {
            fields.insert(name.clone(), field_from_json(name, entry, depth, max_depth)?);
        }
        Ok(IrObject {
            type_name: type_name.to_string(),
            wrapped,
            fields,
        })
    }
}

fn field_from_json(name: &str, entry: &JsonValue, depth: usize, max_depth: usize) -> Result<FieldRecord> {
    let JsonValue::Object(entry) = entry else {
        return Err(Error::InvalidIr(format!("field {name} is not a field record")));
    };
    let value = entry
        .get(FIELD_VALUE_KEY)
        .ok_or_else(|| Error::InvalidIr(format!("field {name} has no value")))?;
    let flag = |key: &str| match entry.get(key) {
        Some(JsonValue::Bool(b)) => Ok(*b),
        _ => Err(Error::InvalidIr(format!("field {name} has no boolean {key} flag"))),
    };
    Ok(FieldRecord {
        value: read_node(value, depth + 1, max_depth)?,
        attributes: Attributes {
            mutable: flag(FIELD_MUTABLE_KEY)?,
            visible: flag(FIELD_VISIBLE_KEY)?,
            redefinable: flag(FIELD_REDEFINABLE_KEY)?,
        },
    })
}

fn number_node(n: f64) -> JsonValue {
    if n.is_finite() {
        return number_to_json(n);
    }
    let text = if n.is_nan() {
        "NaN"
    } else if n > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    };
    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), JsonValue::String(NUMBER_TAG.to_string()));
    map.insert(VALUE_KEY.to_string(), JsonValue::String(text.to_string()));
    map.insert(DATA_KEY.to_string(), JsonValue::Object(Map::new()));
    JsonValue::Object(map)
}

fn tagged_number(map: &Map<String, JsonValue>) -> Result<f64> {
    match map.get(VALUE_KEY).and_then(JsonValue::as_str) {
        Some("NaN") => Ok(f64::NAN),
        Some("Infinity") => Ok(f64::INFINITY),
        Some("-Infinity") => Ok(f64::NEG_INFINITY),
        _ => Err(Error::InvalidIr(format!("{NUMBER_TAG} must hold NaN, Infinity or -Infinity"))),
    }
}

fn primitive_node(p: &Primitive) -> JsonValue {
    match p {
        Primitive::Number(n) => number_node(*n),
        other => primitive_to_json(other),
    }
}

/// Plain JSON number; non-finite numbers have no literal and become `null`.
pub(crate) fn number_to_json(n: f64) -> JsonValue {
    serde_json::Number::from_f64(n)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

pub(crate) fn primitive_to_json(p: &Primitive) -> JsonValue {
    match p {
        Primitive::Null => JsonValue::Null,
        Primitive::Bool(b) => JsonValue::Bool(*b),
        Primitive::Number(n) => number_to_json(*n),
        Primitive::String(s) => JsonValue::String(s.clone()),
    }
}

fn primitive_from_json(json: &JsonValue) -> Result<Primitive> {
    match json {
        JsonValue::Null => Ok(Primitive::Null),
        JsonValue::Bool(b) => Ok(Primitive::Bool(*b)),
        JsonValue::Number(n) => Ok(Primitive::Number(n.as_f64().unwrap_or(f64::NAN))),
        JsonValue::String(s) => Ok(Primitive::String(s.clone())),
        JsonValue::Object(map) if map.get(TYPE_KEY).and_then(JsonValue::as_str) == Some(NUMBER_TAG) => {
            tagged_number(map).map(Primitive::Number)
        }
        _ => Err(Error::InvalidIr("boxed value must be a primitive".to_string())),
    }
}

impl Serialize for IrNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IrNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        IrNode::from_json(&json).map_err(de::Error::custom)
    }
}
