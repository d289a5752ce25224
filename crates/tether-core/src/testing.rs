//! In-memory runtime used by the unit tests.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::registry::Registry;
use crate::runtime::EmbeddedRuntime;

/// Counts how often the runtime it was created with was closed.
#[derive(Clone)]
pub(crate) struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockRuntime {
    registry: Registry<String>,
    closed: CloseCounter,
}

impl MockRuntime {
    pub(crate) fn new() -> (Self, CloseCounter) {
        Self::with_config(&RegistryConfig::default())
    }

    pub(crate) fn with_config(config: &RegistryConfig) -> (Self, CloseCounter) {
        let closed = CloseCounter(Arc::new(AtomicUsize::new(0)));
        let runtime = Self {
            registry: Registry::with_config(config).expect("test registry config is valid"),
            closed: closed.clone(),
        };
        (runtime, closed)
    }
}

impl EmbeddedRuntime for MockRuntime {
    type Value = String;

    fn registry(&self) -> &Registry<String> {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut Registry<String> {
        &mut self.registry
    }

    fn same_value(&self, left: &String, right: &String) -> bool {
        left == right
    }

    fn close(self) {
        self.closed.0.fetch_add(1, Ordering::SeqCst);
    }
}
