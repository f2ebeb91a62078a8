//! Id-to-factory registry every indicator registers itself with once at process start
//! (generalizes the teacher's trait-object-per-strategy-id pattern to indicators).

use crate::contract::DynIndicator;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps an indicator id to the shared, stateless `DynIndicator` value capable of producing
/// per-instance state. One `Arc` per id is shared across every instance of that indicator.
#[derive(Default)]
pub struct IndicatorRegistry {
    factories: HashMap<&'static str, Arc<dyn DynIndicator>>,
}

impl IndicatorRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Registers `indicator` under its own declared id. Panics on a duplicate id at startup —
    /// a programming error, not a runtime condition callers should handle.
    pub fn register(&mut self, indicator: impl DynIndicator + 'static) {
        let id = indicator.id();
        let previous = self.factories.insert(id, Arc::new(indicator));
        assert!(previous.is_none(), "duplicate indicator id registered: {id}");
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn DynIndicator>> {
        self.factories.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Builds a registry pre-populated with every indicator in [`crate::library`].
    pub fn with_library_defaults() -> Self {
        let mut registry = Self::new();
        crate::library::register_all(&mut registry);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::sma::Sma;

    #[test]
    fn looks_up_registered_indicator_by_id() {
        let mut registry = IndicatorRegistry::new();
        registry.register(Sma);
        assert!(registry.get("sma").is_some());
        assert!(registry.get("not-registered").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate indicator id")]
    fn panics_on_duplicate_registration() {
        let mut registry = IndicatorRegistry::new();
        registry.register(Sma);
        registry.register(Sma);
    }
}
