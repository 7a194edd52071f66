//! Write-once registry of model descriptors: populate at startup, freeze, serve.

use crate::error::ConfigError;
use crate::meta::ModelDescriptor;
use std::collections::HashMap;
use std::sync::Arc;

/// Mutable registration phase. Consumed by [`RegistryBuilder::freeze`];
/// nothing can be registered once serving starts.
#[derive(Default)]
pub struct RegistryBuilder {
    models: Vec<Arc<ModelDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. Idempotent per model name: re-registering a name
    /// returns the already-cached descriptor.
    pub fn register(&mut self, descriptor: ModelDescriptor) -> Arc<ModelDescriptor> {
        if let Some(&idx) = self.by_name.get(&descriptor.name) {
            return self.models[idx].clone();
        }
        let descriptor = Arc::new(descriptor);
        self.by_name
            .insert(descriptor.name.clone(), self.models.len());
        self.models.push(descriptor.clone());
        descriptor
    }

    /// Build and register in one step.
    pub fn register_built(
        &mut self,
        builder: crate::meta::ModelBuilder,
    ) -> Result<Arc<ModelDescriptor>, ConfigError> {
        Ok(self.register(builder.build()?))
    }

    pub fn freeze(self) -> MetaRegistry {
        tracing::info!(models = self.models.len(), "metadata registry frozen");
        MetaRegistry {
            models: self.models,
            by_name: self.by_name,
        }
    }
}

/// Immutable registry shared by all request handlers. Iteration order is
/// registration order.
pub struct MetaRegistry {
    models: Vec<Arc<ModelDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl MetaRegistry {
    pub fn lookup(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.by_name.get(name).map(|&i| self.models[i].clone())
    }

    pub fn list(&self) -> &[Arc<ModelDescriptor>] {
        &self.models
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{FieldDescriptor, FieldKind};

    fn model(name: &str) -> ModelDescriptor {
        ModelDescriptor::builder(name)
            .field(FieldDescriptor::new("ID", FieldKind::Integer).label("ID"))
            .build()
            .unwrap()
    }

    #[test]
    fn register_is_idempotent_per_name() {
        let mut b = RegistryBuilder::new();
        let first = b.register(model("Order"));
        let second = b.register(model("Order"));
        assert!(Arc::ptr_eq(&first, &second));
        let frozen = b.freeze();
        assert_eq!(frozen.list().len(), 1);
    }

    #[test]
    fn list_preserves_registration_order() {
        let mut b = RegistryBuilder::new();
        b.register(model("User"));
        b.register(model("Order"));
        b.register(model("Menu"));
        let frozen = b.freeze();
        let names: Vec<_> = frozen.list().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["User", "Order", "Menu"]);
    }

    #[test]
    fn lookup_misses_return_none() {
        let frozen = RegistryBuilder::new().freeze();
        assert!(frozen.lookup("Ghost").is_none());
    }
}
