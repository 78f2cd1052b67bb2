//! Bridge between dynamic values and plain typed structs via serde.

use crate::error::{Error, Result};
use crate::ir::{number_to_json, primitive_to_json};
use crate::value::{Primitive, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

impl Value {
    /// Converts any serde-serializable value into a dynamic value. Structs
    /// and maps become plain records with default attributes.
    pub fn from_serde<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
        Ok(Value::from(serde_json::to_value(value)?))
    }

    /// Converts the value into plain JSON data.
    ///
    /// Boxed primitives collapse to their primitive, hidden fields and
    /// `undefined` fields are dropped, and `undefined` elsewhere becomes
    /// `null`. Functions cannot be converted.
    pub fn to_json(&self) -> Result<JsonValue> {
        match self {
            Value::Null | Value::Undefined => Ok(JsonValue::Null),
            Value::Bool(b) => Ok(JsonValue::Bool(*b)),
            Value::Number(n) => Ok(plain_number(*n)),
            Value::String(s) => Ok(JsonValue::String(s.clone())),
            Value::Array(items) => Ok(JsonValue::Array(
                items.iter().map(Value::to_json).collect::<Result<Vec<_>>>()?,
            )),
            Value::Function(_) => Err(Error::UnserializableValue),
            Value::Object(object) => {
                match object.primitive() {
                    Some(Primitive::Number(n)) => return Ok(plain_number(*n)),
                    Some(p) => return Ok(primitive_to_json(p)),
                    None => {}
                }
                let mut map = Map::new();
                for (name, property) in object.properties() {
                    if !property.attributes.visible || matches!(property.value, Value::Undefined) {
                        continue;
                    }
                    map.insert(name.to_string(), property.value.to_json()?);
                }
                Ok(JsonValue::Object(map))
            }
        }
    }

    /// Reads the value as `T` through its plain JSON form.
    pub fn into_serde<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json()?)?)
    }
}

/// Integral numbers are written as JSON integers so typed integer fields can
/// read them back.
fn plain_number(n: f64) -> JsonValue {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER && !(n == 0.0 && n.is_sign_negative()) {
        JsonValue::from(n as i64)
    } else {
        number_to_json(n)
    }
}
