//! Runtime value model: primitives, arrays, objects with per-field
//! attributes, and the flat type descriptors objects are instances of.

use crate::error::{Error, Result};
use crate::wrapper::WrapperKind;
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Name of the built-in plain-record type.
pub const OBJECT_TYPE_NAME: &str = "Object";

/// A value that can be boxed by a primitive-wrapping type.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl From<Primitive> for Value {
    fn from(p: Primitive) -> Self {
        match p {
            Primitive::Null => Value::Null,
            Primitive::Bool(b) => Value::Bool(b),
            Primitive::Number(n) => Value::Number(n),
            Primitive::String(s) => Value::String(s),
        }
    }
}

pub type NativeFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// An executable value. Functions can live inside a value tree but can never
/// be serialized.
#[derive(Clone)]
pub struct Function {
    name: String,
    body: Arc<NativeFn>,
}

impl Function {
    pub fn new(name: impl Into<String>, body: impl Fn(&[Value]) -> Value + Send + Sync + 'static) -> Self {
        Function {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

/// Any runtime value the engine can classify.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
    Function(Function),
}

impl Value {
    /// Returns the host-runtime style type name of the value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                let mut object = Object::plain();
                for (key, val) in map {
                    object = object.with(key, Value::from(val));
                }
                Value::Object(object)
            }
        }
    }
}

/// Mutability, visibility and redefinability of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attributes {
    pub mutable: bool,
    pub visible: bool,
    pub redefinable: bool,
}

impl Attributes {
    /// Attributes of a field created by plain assignment.
    pub const DEFAULT: Attributes = Attributes {
        mutable: true,
        visible: true,
        redefinable: true,
    };

    /// A field that can be neither written, enumerated nor redefined.
    pub const FROZEN: Attributes = Attributes {
        mutable: false,
        visible: false,
        redefinable: false,
    };

    pub const fn new(mutable: bool, visible: bool, redefinable: bool) -> Self {
        Attributes {
            mutable,
            visible,
            redefinable,
        }
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes::DEFAULT
    }
}

/// A field value together with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub value: Value,
    pub attributes: Attributes,
}

impl Property {
    pub fn new(value: impl Into<Value>, attributes: Attributes) -> Self {
        Property {
            value: value.into(),
            attributes,
        }
    }
}

pub type Method = dyn Fn(&Object, &[Value]) -> Result<Value> + Send + Sync;
pub type Initializer = dyn Fn(&mut Object, &[Value]) -> Result<()> + Send + Sync;

/// Flat description of a named type: its name, the primitive kind it wraps
/// (if any), its methods, and the initializer run by [`TypeDescriptor::construct`].
pub struct TypeDescriptor {
    name: String,
    base: Option<WrapperKind>,
    methods: IndexMap<String, Arc<Method>>,
    init: Option<Arc<Initializer>>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        TypeDescriptor {
            name: name.into(),
            base: None,
            methods: IndexMap::new(),
            init: None,
        }
    }

    /// A type whose instances box a primitive of the given kind.
    pub fn wrapping(name: impl Into<String>, kind: WrapperKind) -> Self {
        TypeDescriptor {
            base: Some(kind),
            ..TypeDescriptor::new(name)
        }
    }

    pub fn with_method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Object, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn with_initializer(
        mut self,
        init: impl Fn(&mut Object, &[Value]) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.init = Some(Arc::new(init));
        self
    }

    /// The shared descriptor of plain records.
    pub fn plain() -> Arc<TypeDescriptor> {
        static PLAIN: OnceLock<Arc<TypeDescriptor>> = OnceLock::new();
        PLAIN.get_or_init(|| Arc::new(TypeDescriptor::new(OBJECT_TYPE_NAME))).clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<WrapperKind> {
        self.base
    }

    /// True only for the shared descriptor returned by [`TypeDescriptor::plain`].
    /// Another descriptor named `"Object"` is not plain.
    pub fn is_plain(&self) -> bool {
        std::ptr::eq(self, Arc::as_ptr(&TypeDescriptor::plain()))
    }

    pub fn method(&self, name: &str) -> Option<&Arc<Method>> {
        self.methods.get(name)
    }

    /// Creates a new instance the way user code would: box the first
    /// argument for wrapping types, then run the initializer with all
    /// arguments.
    pub fn construct(self: &Arc<Self>, args: &[Value]) -> Result<Object> {
        let mut object = match self.base {
            Some(kind) => {
                let primitive = kind.coerce_arg(args.first());
                let mut boxed = kind.construct(primitive);
                boxed.rebind(Arc::clone(self));
                boxed
            }
            None => Object::bare(Arc::clone(self)),
        };
        if let Some(init) = &self.init {
            init(&mut object, args)?;
        }
        Ok(object)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("init", &self.init.is_some())
            .finish()
    }
}

/// An instance of a [`TypeDescriptor`]: an optional boxed primitive plus an
/// insertion-ordered set of own fields.
#[derive(Clone)]
pub struct Object {
    class: Arc<TypeDescriptor>,
    primitive: Option<Primitive>,
    fields: IndexMap<String, Property>,
}

impl Object {
    /// An empty plain record.
    pub fn plain() -> Self {
        Object::bare(TypeDescriptor::plain())
    }

    /// An empty instance of `class`. The type's initializer is not run.
    ///
    /// Wrapping types get their kind's default box (`0`, `""`, the invalid
    /// date or `false`) along with the fields that box contributes.
    pub fn bare(class: Arc<TypeDescriptor>) -> Self {
        match class.base() {
            Some(kind) => {
                let mut object = kind.construct(kind.default_primitive());
                object.rebind(class);
                object
            }
            None => Object {
                class,
                primitive: None,
                fields: IndexMap::new(),
            },
        }
    }

    /// Boxes `primitive` with the wrapping kind of `class` and tags the
    /// result as an instance of `class`. The type's initializer is not run.
    pub fn boxed(class: Arc<TypeDescriptor>, primitive: Primitive) -> Result<Self> {
        let kind = class.base().ok_or_else(|| {
            Error::InvalidIr(format!("{} does not wrap a primitive", class.name()))
        })?;
        let mut object = kind.construct(primitive);
        object.rebind(class);
        Ok(object)
    }

    pub(crate) fn from_parts(
        class: Arc<TypeDescriptor>,
        primitive: Option<Primitive>,
        fields: IndexMap<String, Property>,
    ) -> Self {
        Object {
            class,
            primitive,
            fields,
        }
    }

    /// Swaps the behavioral template while keeping primitive and fields.
    pub(crate) fn rebind(&mut self, class: Arc<TypeDescriptor>) {
        self.class = class;
    }

    /// Builder: adds or replaces a field with default attributes.
    ///
    /// Replaces unconditionally, even fields that are not redefinable. Use
    /// [`Object::try_with`] to honor redefinability.
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_property(name, value, Attributes::DEFAULT)
    }

    /// Builder: adds or replaces a field with explicit attributes. Replaces
    /// unconditionally, like [`Object::with`].
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>, attributes: Attributes) -> Self {
        self.fields.insert(name.into(), Property::new(value, attributes));
        self
    }

    /// Builder: [`Object::define`]s a field, failing with
    /// [`Error::FieldNotRedefinable`] where `define` would.
    pub fn try_with(mut self, name: &str, value: impl Into<Value>, attributes: Attributes) -> Result<Self> {
        self.define(name, Property::new(value, attributes))?;
        Ok(self)
    }

    pub fn class(&self) -> &Arc<TypeDescriptor> {
        &self.class
    }

    pub fn type_name(&self) -> &str {
        self.class.name()
    }

    pub fn primitive(&self) -> Option<&Primitive> {
        self.primitive.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).map(|p| &p.value)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// All own fields in definition order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.fields.iter().map(|(k, p)| (k.as_str(), p))
    }

    /// All own field names, visible or not, in definition order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Names of visible fields only.
    pub fn keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, p)| p.attributes.visible)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Assigns a value. Existing fields keep their attributes and must be
    /// mutable; new fields get [`Attributes::DEFAULT`].
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        match self.fields.get_mut(name) {
            Some(existing) if !existing.attributes.mutable => Err(Error::ReadOnlyField(name.to_string())),
            Some(existing) => {
                existing.value = value.into();
                Ok(())
            }
            None => {
                self.fields.insert(name.to_string(), Property::new(value, Attributes::DEFAULT));
                Ok(())
            }
        }
    }

    /// Defines a field with exact attributes. A non-redefinable field can
    /// only be "redefined" with an identical property.
    pub fn define(&mut self, name: &str, property: Property) -> Result<()> {
        if let Some(existing) = self.fields.get_mut(name) {
            if !existing.attributes.redefinable && *existing != property {
                return Err(Error::FieldNotRedefinable(name.to_string()));
            }
            *existing = property;
            return Ok(());
        }
        self.fields.insert(name.to_string(), property);
        Ok(())
    }

    /// Removes a field, keeping the order of the remaining ones.
    pub fn remove(&mut self, name: &str) -> Result<Option<Property>> {
        match self.fields.get(name) {
            Some(p) if !p.attributes.redefinable => Err(Error::FieldNotRedefinable(name.to_string())),
            _ => Ok(self.fields.shift_remove(name)),
        }
    }

    /// Invokes a method of the object's type, falling back to the behavior
    /// of the primitive kind the type wraps.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        if let Some(m) = self.class.method(method) {
            return m(self, args);
        }
        if let Some(kind) = self.class.base() {
            if let Some(result) = kind.call_builtin(self, method, args) {
                return result;
            }
        }
        Err(Error::NoSuchMethod {
            type_name: self.class.name().to_string(),
            method: method.to_string(),
        })
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.class.name() == other.class.name()
            && self.class.base() == other.class.base()
            && self.primitive == other.primitive
            && self.fields.len() == other.fields.len()
            && self.fields.iter().zip(other.fields.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.class.name());
        if let Some(p) = &self.primitive {
            s.field("[[primitive]]", p);
        }
        for (name, prop) in &self.fields {
            s.field(name, prop);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_respects_mutability() {
        let mut o = Object::plain()
            .with("a", 1)
            .with_property("b", 2, Attributes::new(false, true, true));
        o.set("a", 10).unwrap();
        assert_eq!(o.get("a"), Some(&Value::Number(10.0)));
        assert_eq!(o.set("b", 20), Err(Error::ReadOnlyField("b".into())));
        o.set("c", "new").unwrap();
        assert_eq!(o.property("c").unwrap().attributes, Attributes::DEFAULT);
    }

    #[test]
    fn define_respects_redefinability() {
        let mut o = Object::plain().with_property("x", 1, Attributes::FROZEN);
        o.define("x", Property::new(1, Attributes::FROZEN)).unwrap();
        assert_eq!(
            o.define("x", Property::new(2, Attributes::FROZEN)),
            Err(Error::FieldNotRedefinable("x".into()))
        );
        assert!(o.remove("x").is_err());
    }

    #[test]
    fn remove_keeps_order() {
        let mut o = Object::plain().with("a", 1).with("b", 2).with("c", 3);
        o.remove("b").unwrap();
        assert_eq!(o.field_names().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn keys_skip_hidden_fields() {
        let o = Object::plain()
            .with("a", 1)
            .with_property("hidden", 2, Attributes::new(true, false, true));
        assert_eq!(o.keys(), vec!["a"]);
        assert_eq!(o.field_names().count(), 2);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let a = Object::plain().with("x", 1).with("y", 2);
        let b = Object::plain().with("y", 2).with("x", 1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn construct_runs_initializer() {
        let class = Arc::new(TypeDescriptor::new("Point").with_initializer(|o, args| {
            o.set("x", args.first().cloned().unwrap_or(Value::Number(0.0)))?;
            o.set("y", args.get(1).cloned().unwrap_or(Value::Number(0.0)))
        }));
        let p = class.construct(&[Value::from(1), Value::from(2)]).unwrap();
        assert_eq!(p.type_name(), "Point");
        assert_eq!(p.get("y"), Some(&Value::Number(2.0)));
        assert!(Object::bare(class).is_empty());
    }

    #[test]
    fn bare_wrapping_instance_holds_default_box() {
        let class = Arc::new(TypeDescriptor::wrapping("Label", WrapperKind::String));
        let label = Object::bare(class);
        assert_eq!(label.type_name(), "Label");
        assert_eq!(label.primitive(), Some(&Primitive::String(String::new())));
        assert_eq!(label.get("length"), Some(&Value::Number(0.0)));

        let stamp = Object::bare(Arc::new(TypeDescriptor::wrapping("Stamp", WrapperKind::Date)));
        assert!(matches!(stamp.primitive(), Some(Primitive::Number(n)) if n.is_nan()));
    }

    #[test]
    fn try_with_respects_redefinability() {
        let class = Arc::new(TypeDescriptor::wrapping("Label", WrapperKind::String));
        let boxed = Object::boxed(class, Primitive::String("ab".into())).unwrap();
        assert_eq!(
            boxed.clone().try_with("length", 99, Attributes::DEFAULT).unwrap_err(),
            Error::FieldNotRedefinable("length".into())
        );
        let same = boxed.clone().try_with("length", 2, Attributes::FROZEN).unwrap();
        assert_eq!(same, boxed);
        let extended = boxed.try_with("p", true, Attributes::DEFAULT).unwrap();
        assert_eq!(extended.get("p"), Some(&Value::Bool(true)));
    }

    #[test]
    fn only_the_shared_descriptor_is_plain() {
        assert!(TypeDescriptor::plain().is_plain());
        assert!(!TypeDescriptor::new(OBJECT_TYPE_NAME).is_plain());
    }

    #[test]
    fn call_dispatches_to_methods() {
        let class = Arc::new(TypeDescriptor::new("Greeter").with_method("greet", |o, _| {
            let name = o.get("name").and_then(Value::as_str).unwrap_or("nobody");
            Ok(Value::String(format!("hello {name}")))
        }));
        let g = Object::bare(class).with("name", "ann");
        assert_eq!(g.call("greet", &[]).unwrap(), Value::from("hello ann"));
        assert!(matches!(g.call("missing", &[]), Err(Error::NoSuchMethod { .. })));
    }

    #[test]
    fn from_json_builds_plain_records() {
        let v = Value::from(serde_json::json!({"a": [1, "two", null], "b": {"c": true}}));
        let o = v.as_object().unwrap();
        assert!(o.class().is_plain());
        assert_eq!(o.field_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            o.get("a"),
            Some(&Value::Array(vec![Value::Number(1.0), Value::from("two"), Value::Null]))
        );
    }
}
