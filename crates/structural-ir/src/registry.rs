//! Process-wide mapping from type names to type descriptors.

use crate::error::{Error, Result};
use crate::ir::{NUMBER_TAG, UNDEFINED_TAG};
use crate::value::TypeDescriptor;
use crate::wrapper::WrapperKind;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, warn};

/// Registry of named types. Names are written once and never removed.
///
/// The plain-record type `Object` and the four primitive-wrapping kinds are
/// registered up front.
pub struct TypeRegistry {
    types: RwLock<HashMap<String, Arc<TypeDescriptor>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut types = HashMap::new();
        let plain = TypeDescriptor::plain();
        types.insert(plain.name().to_string(), plain);
        for kind in WrapperKind::ALL {
            types.insert(kind.name().to_string(), kind.descriptor());
        }
        TypeRegistry {
            types: RwLock::new(types),
        }
    }

    /// The registry used by the crate-level [`register`](crate::register),
    /// [`serialize`](crate::serialize) and [`deserialize`](crate::deserialize)
    /// functions. Types must be registered before any value referencing them
    /// is serialized or deserialized.
    pub fn global() -> &'static TypeRegistry {
        static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
        GLOBAL.get_or_init(TypeRegistry::new)
    }

    /// Registers a type under its own name.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if the name is taken; the
    /// first registration stays in effect.
    pub fn register(&self, descriptor: impl Into<Arc<TypeDescriptor>>) -> Result<Arc<TypeDescriptor>> {
        let descriptor = descriptor.into();
        let name = descriptor.name();
        if name.is_empty() {
            return Err(Error::MissingTypeName);
        }
        if name == UNDEFINED_TAG || name == NUMBER_TAG {
            return Err(Error::ReservedTypeName(name.to_string()));
        }
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        if types.contains_key(name) {
            warn!(type_name = name, "rejected duplicate type registration");
            return Err(Error::DuplicateRegistration(name.to_string()));
        }
        types.insert(name.to_string(), Arc::clone(&descriptor));
        debug!(type_name = name, base = ?descriptor.base(), "registered type");
        Ok(descriptor)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
