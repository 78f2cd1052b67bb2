//! IR → value.

use crate::error::{Error, Result};
use crate::ir::{IrNode, IrObject};
use crate::options::CodecOptions;
use crate::registry::TypeRegistry;
use crate::value::{Object, Property, Value};
use crate::wrapper;
use std::sync::Arc;
use tracing::trace;

/// Rebuilds values from IR, resolving type names through a registry.
///
/// Instances are reconstructed without running their type's initializer:
/// every field and its attributes come from the IR.
pub struct Deserializer<'r> {
    registry: &'r TypeRegistry,
    pub options: CodecOptions,
}

impl<'r> Deserializer<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self::with_options(registry, CodecOptions::default())
    }

    pub fn with_options(registry: &'r TypeRegistry, options: CodecOptions) -> Self {
        Deserializer { registry, options }
    }

    pub fn deserialize(&self, node: &IrNode) -> Result<Value> {
        self.read_any(node, 0)
    }

    /// Parses the JSON wire form, then deserializes it.
    pub fn deserialize_json(&self, json: &serde_json::Value) -> Result<Value> {
        self.deserialize(&IrNode::from_json_with_limit(json, self.options.max_depth)?)
    }

    fn read_any(&self, node: &IrNode, depth: usize) -> Result<Value> {
        match node {
            IrNode::Null => Ok(Value::Null),
            IrNode::Undefined => Ok(Value::Undefined),
            IrNode::Bool(b) => Ok(Value::Bool(*b)),
            IrNode::Number(n) => Ok(Value::Number(*n)),
            IrNode::String(s) => Ok(Value::String(s.clone())),
            IrNode::Array(items) => {
                self.enter(depth)?;
                let items = items
                    .iter()
                    .map(|item| self.read_any(item, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            IrNode::Object(obj) => self.read_object(obj, depth).map(Value::Object),
        }
    }

    fn read_object(&self, node: &IrObject, depth: usize) -> Result<Object> {
        self.enter(depth)?;
        let class = self.registry.lookup(&node.type_name)?;
        let mut object = match (&node.wrapped, wrapper::resolve(&class)) {
            (Some(primitive), Some(kind)) => {
                let mut boxed = kind.construct(primitive.clone());
                boxed.rebind(Arc::clone(&class));
                boxed
            }
            (None, None) => Object::bare(Arc::clone(&class)),
            (Some(_), None) => {
                return Err(Error::InvalidIr(format!(
                    "{} does not wrap a primitive but a boxed value was recorded",
                    node.type_name
                )))
            }
            (None, Some(kind)) => {
                return Err(Error::InvalidIr(format!(
                    "{} wraps a {} but no boxed value was recorded",
                    node.type_name,
                    kind.name()
                )))
            }
        };

        for (name, record) in &node.fields {
            let value = self.read_any(&record.value, depth + 1)?;
            object.define(
                name,
                Property {
                    value,
                    attributes: record.attributes,
                },
            )?;
        }
        trace!(type_name = %node.type_name, fields = node.fields.len(), "reconstructed object");
        Ok(object)
    }

    fn enter(&self, depth: usize) -> Result<()> {
        if depth >= self.options.max_depth {
            return Err(Error::DepthLimitExceeded {
                limit: self.options.max_depth,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Attributes, Primitive, TypeDescriptor};
    use crate::wrapper::WrapperKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn leaves_and_arrays() {
        let registry = TypeRegistry::new();
        let de = Deserializer::new(&registry);
        let value = de
            .deserialize_json(&json!([null, true, 2.5, "s", {"cName": "__undefined__", "data": {}}, []]))
            .unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Null,
                Value::Bool(true),
                Value::Number(2.5),
                Value::from("s"),
                Value::Undefined,
                Value::Array(vec![]),
            ])
        );
    }

    #[test]
    fn attributes_are_applied() {
        let registry = TypeRegistry::new();
        let value = Deserializer::new(&registry)
            .deserialize_json(&json!({
                "cName": "Object",
                "data": {"k": {"v": 1, "w": false, "e": false, "c": true}}
            }))
            .unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.property("k").unwrap().attributes, Attributes::new(false, false, true));
        assert!(object.keys().is_empty());
    }

    #[test]
    fn initializer_is_not_run() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let registry = TypeRegistry::new();
        registry
            .register(TypeDescriptor::new("Counted").with_initializer(|o, _| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                o.set("born", true)
            }))
            .unwrap();
        let value = Deserializer::new(&registry)
            .deserialize_json(&json!({"cName": "Counted", "data": {}}))
            .unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
        assert!(value.as_object().unwrap().is_empty());
    }

    #[test]
    fn unknown_type_aborts_whole_call() {
        let registry = TypeRegistry::new();
        let err = Deserializer::new(&registry)
            .deserialize_json(&json!({
                "cName": "Object",
                "data": {"ok": {"v": 1, "w": true, "e": true, "c": true},
                         "bad": {"v": {"cName": "Ghost", "data": {}}, "w": true, "e": true, "c": true}}
            }))
            .unwrap_err();
        assert_eq!(err, Error::UnknownType("Ghost".into()));
    }

    #[test]
    fn boxed_value_must_match_type() {
        let registry = TypeRegistry::new();
        let de = Deserializer::new(&registry);
        let stray_box = json!({"cName": "Object", "value": 1, "data": {}});
        assert!(matches!(de.deserialize_json(&stray_box), Err(Error::InvalidIr(_))));
        let empty_box = json!({"cName": "Number", "data": {}});
        assert!(matches!(de.deserialize_json(&empty_box), Err(Error::InvalidIr(_))));
    }

    #[test]
    fn falsy_boxed_values_are_restored() {
        let registry = TypeRegistry::new();
        let de = Deserializer::new(&registry);
        for (name, value, expected) in [
            ("Number", json!(0), Primitive::Number(0.0)),
            ("String", json!(""), Primitive::String(String::new())),
            ("Boolean", json!(false), Primitive::Bool(false)),
        ] {
            let out = de.deserialize_json(&json!({"cName": name, "value": value, "data": {}})).unwrap();
            assert_eq!(out.as_object().unwrap().primitive(), Some(&expected), "{name}");
        }
    }

    #[test]
    fn box_fields_cannot_be_overwritten() {
        let registry = TypeRegistry::new();
        let err = Deserializer::new(&registry)
            .deserialize_json(&json!({
                "cName": "String",
                "value": "ab",
                "data": {"length": {"v": 7, "w": true, "e": true, "c": true}}
            }))
            .unwrap_err();
        assert_eq!(err, Error::FieldNotRedefinable("length".into()));
    }

    #[test]
    fn reconstructed_box_keeps_subtype() {
        let registry = TypeRegistry::new();
        registry
            .register(TypeDescriptor::wrapping("Stamp", WrapperKind::Date).with_method("year", |o, _| {
                let iso = o.call("toISOString", &[])?;
                Ok(Value::from(iso.as_str().unwrap_or_default()[..4].to_string()))
            }))
            .unwrap();
        let value = Deserializer::new(&registry)
            .deserialize_json(&json!({"cName": "Stamp", "value": 0, "data": {}}))
            .unwrap();
        let stamp = value.as_object().unwrap();
        assert_eq!(stamp.type_name(), "Stamp");
        assert_eq!(stamp.call("year", &[]).unwrap(), Value::from("1970"));
        assert_eq!(stamp.call("getTime", &[]).unwrap(), Value::Number(0.0));
    }
}
