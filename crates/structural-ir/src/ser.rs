//! Value → IR.

use crate::error::{Error, Result};
use crate::ir::{FieldRecord, IrNode, IrObject};
use crate::options::CodecOptions;
use crate::registry::TypeRegistry;
use crate::value::{Object, Value, OBJECT_TYPE_NAME};
use crate::wrapper::{self, Wrapped};
use indexmap::IndexMap;
use tracing::trace;

/// Walks a value tree and produces its IR.
pub struct Serializer<'r> {
    registry: &'r TypeRegistry,
    pub options: CodecOptions,
}

impl<'r> Serializer<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self::with_options(registry, CodecOptions::default())
    }

    pub fn with_options(registry: &'r TypeRegistry, options: CodecOptions) -> Self {
        Serializer { registry, options }
    }

    pub fn serialize(&self, value: &Value) -> Result<IrNode> {
        self.write_any(value, 0)
    }

    fn write_any(&self, value: &Value, depth: usize) -> Result<IrNode> {
        match value {
            Value::Null => Ok(IrNode::Null),
            Value::Undefined => Ok(IrNode::Undefined),
            Value::Bool(b) => Ok(IrNode::Bool(*b)),
            Value::Number(n) => Ok(IrNode::Number(*n)),
            Value::String(s) => Ok(IrNode::String(s.clone())),
            Value::Function(_) => Err(Error::UnserializableValue),
            Value::Array(items) => {
                self.enter(depth)?;
                let items = items
                    .iter()
                    .map(|item| self.write_any(item, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Ok(IrNode::Array(items))
            }
            Value::Object(object) => self.write_object(object, depth).map(IrNode::Object),
        }
    }

    fn write_object(&self, object: &Object, depth: usize) -> Result<IrObject> {
        self.enter(depth)?;
        let class = object.class();
        if class.is_plain() {
            return Ok(IrObject {
                type_name: OBJECT_TYPE_NAME.to_string(),
                wrapped: None,
                fields: self.write_fields(object, None, depth)?,
            });
        }

        let type_name = class.name();
        if type_name.is_empty() {
            return Err(Error::MissingTypeName);
        }
        // The plain tag would rebuild a plain record and drop this type's behavior.
        if type_name == OBJECT_TYPE_NAME {
            return Err(Error::UnknownType(type_name.to_string()));
        }
        if self.options.require_registered && !self.registry.contains(type_name) {
            return Err(Error::UnknownType(type_name.to_string()));
        }

        let wrapped = wrapper::resolve_wrapped(object);
        let fields = self.write_fields(object, wrapped.as_ref(), depth)?;
        trace!(type_name, fields = fields.len(), wrapped = wrapped.is_some(), "serialized object");
        Ok(IrObject {
            type_name: type_name.to_string(),
            wrapped: wrapped.map(|w| w.primitive),
            fields,
        })
    }

    /// Serializes own fields in order. For boxed primitives, fields identical
    /// to those of a bare box of the same value are skipped, as the box
    /// recreates them. A box field that was overwritten is written out and
    /// fails on deserialization instead of vanishing.
    fn write_fields(
        &self,
        object: &Object,
        wrapped: Option<&Wrapped>,
        depth: usize,
    ) -> Result<IndexMap<String, FieldRecord>> {
        let reference = wrapped.map(|w| w.kind.construct(w.primitive.clone()));
        let mut fields = IndexMap::with_capacity(object.len());
        for (name, property) in object.properties() {
            if reference.as_ref().and_then(|r| r.property(name)) == Some(property) {
                continue;
            }
            let record = FieldRecord {
                value: self.write_any(&property.value, depth + 1)?,
                attributes: property.attributes,
            };
            fields.insert(name.to_string(), record);
        }
        Ok(fields)
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
