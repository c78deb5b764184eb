//! Named factory registry and its process-wide instance.

use super::{AnyEntity, FactoryError, FactoryResult, ModelFactory, PatientFactory, TaskFactory};
use crate::storage::Record;
use log::info;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;

static REGISTRY: Lazy<FactoryRegistry> = Lazy::new(|| {
    let registry = FactoryRegistry::with_defaults();
    info!(
        "event=factory_registry_init module=factory status=ok factories={}",
        registry.len()
    );
    registry
});

/// Returns the process-wide registry holding the built-in factories.
///
/// Built once on first use; every call returns the same instance.
pub fn factory_registry() -> &'static FactoryRegistry {
    &REGISTRY
}

/// Name -> factory lookup table.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: BTreeMap<String, Arc<dyn ModelFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the patient and task factories.
    pub fn with_defaults() -> Self {
        let defaults: [Arc<dyn ModelFactory>; 2] =
            [Arc::new(PatientFactory::new()), Arc::new(TaskFactory::new())];
        let mut registry = Self::new();
        for factory in defaults {
            registry
                .factories
                .insert(factory.name().to_string(), factory);
        }
        registry
    }

    /// Registers one factory under its `name()`.
    pub fn register(&mut self, factory: Arc<dyn ModelFactory>) -> FactoryResult<()> {
        let name = factory.name().trim().to_string();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(FactoryError::InvalidFactoryName(name));
        }
        if self.factories.contains_key(name.as_str()) {
            return Err(FactoryError::DuplicateFactory(name));
        }

        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Returns sorted factory names.
    pub fn factory_names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ModelFactory>> {
        self.factories.get(name.trim()).cloned()
    }

    /// Looks up `factory` and builds `model_type` from `data`.
    pub fn create_model(
        &self,
        factory: &str,
        model_type: &str,
        data: &Record,
    ) -> FactoryResult<AnyEntity> {
        self.get(factory)
            .ok_or_else(|| FactoryError::UnknownFactory(factory.trim().to_string()))?
            .create_model(model_type, data)
    }
}

#[cfg(test)]
mod tests {
    use super::{factory_registry, FactoryRegistry};
    use crate::factory::{FactoryError, PatientFactory};
    use crate::storage::Record;
    use std::sync::Arc;

    #[test]
    fn global_registry_is_built_once() {
        let first = factory_registry();
        let second = factory_registry();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.factory_names(), vec!["patient", "task"]);
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = FactoryRegistry::with_defaults();
        let err = registry
            .register(Arc::new(PatientFactory::new()))
            .unwrap_err();
        assert_eq!(err, FactoryError::DuplicateFactory("patient".to_string()));
    }

    #[test]
    fn unknown_factory_is_reported() {
        let err = FactoryRegistry::new()
            .create_model("billing", "invoice", &Record::new())
            .unwrap_err();
        assert_eq!(err, FactoryError::UnknownFactory("billing".to_string()));
    }
}
