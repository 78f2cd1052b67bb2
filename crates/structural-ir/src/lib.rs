//! Structural serialization of dynamic values.
//!
//! Values (primitives, arrays, plain records and instances of registered
//! types, including types that box a primitive and add fields) are turned
//! into a self-describing, JSON-safe IR and rebuilt from it. Field
//! attributes (mutable, visible, redefinable) travel with each field, and
//! rebuilt instances keep the behavior of their type.
//!
//! # Example
//!
//! ```
//! use structural_ir::{deserialize, register, serialize, Object, TypeDescriptor, Value};
//!
//! let point = register(TypeDescriptor::new("DocPoint").with_method("sum", |o, _| {
//!     let x = o.get("x").and_then(Value::as_f64).unwrap_or(0.0);
//!     let y = o.get("y").and_then(Value::as_f64).unwrap_or(0.0);
//!     Ok(Value::Number(x + y))
//! }))
//! .unwrap();
//!
//! let p = Value::from(Object::bare(point).with("x", 1).with("y", 2));
//! let ir = serialize(&p).unwrap();
//! let text = ir.to_json_string().unwrap();
//! assert!(text.starts_with(r#"{"cName":"DocPoint""#));
//!
//! let back = deserialize(&ir).unwrap();
//! assert_eq!(back, p);
//! assert_eq!(back.as_object().unwrap().call("sum", &[]).unwrap(), Value::Number(3.0));
//! ```

pub mod de;
pub mod error;
pub mod interop;
pub mod ir;
pub mod options;
pub mod registry;
pub mod ser;
pub mod value;
pub mod wrapper;

pub use de::Deserializer;
pub use error::{Error, Result};
pub use ir::{FieldRecord, IrNode, IrObject, NUMBER_TAG, UNDEFINED_TAG};
pub use options::CodecOptions;
pub use registry::TypeRegistry;
pub use ser::Serializer;
pub use value::{
    Attributes, Function, Object, Primitive, Property, TypeDescriptor, Value, OBJECT_TYPE_NAME,
};
pub use wrapper::{Wrapped, WrapperKind};

use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Registers a type in the process-wide registry.
pub fn register(descriptor: impl Into<Arc<TypeDescriptor>>) -> Result<Arc<TypeDescriptor>> {
    TypeRegistry::global().register(descriptor)
}

/// Serializes a value against the process-wide registry.
pub fn serialize(value: &Value) -> Result<IrNode> {
    Serializer::new(TypeRegistry::global()).serialize(value)
}

/// Deserializes IR against the process-wide registry.
pub fn deserialize(ir: &IrNode) -> Result<Value> {
    Deserializer::new(TypeRegistry::global()).deserialize(ir)
}

/// Parses the JSON wire form and deserializes it against the process-wide
/// registry.
pub fn deserialize_json(json: &serde_json::Value) -> Result<Value> {
    Deserializer::new(TypeRegistry::global()).deserialize_json(json)
}

/// Deserializes IR and reads the result as `T`.
///
/// `T` only shapes the result; nothing checks that the IR was produced from
/// a `T`.
pub fn deserialize_typed<T: DeserializeOwned>(ir: &IrNode) -> Result<T> {
    deserialize(ir)?.into_serde()
}
