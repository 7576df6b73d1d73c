//! The list of adapter services offering the IPv4 protocol.
use alloc::vec::Vec;

use crate::driver::ServiceBinding;

/// An explicit registry of adapter service bindings.
///
/// The socket layer walks this list when binding a socket, creating one port per service that
/// can produce a driver instance. The registry is passed by reference into every operation that
/// needs it instead of living in process-global state, so several independent stacks can coexist.
///
/// Service slots keep their index for the lifetime of the registry; removing a service leaves a
/// tombstone behind so that ports of other services stay valid.
#[derive(Debug)]
pub struct Registry<B> {
    services: Vec<Option<B>>,
}

impl<B: ServiceBinding> Registry<B> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry { services: Vec::new() }
    }

    /// Add a service and return its slot index.
    pub fn register(&mut self, binding: B) -> usize {
        self.services.push(Some(binding));
        self.services.len() - 1
    }

    /// Remove the service in the given slot, e.g. on adapter disconnect.
    ///
    /// Sockets with ports bound through the slot must be closed first; their teardown will no
    /// longer find the binding otherwise.
    pub fn remove(&mut self, index: usize) -> Option<B> {
        self.services.get_mut(index).and_then(Option::take)
    }

    /// Access the service in the given slot.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut B> {
        self.services.get_mut(index).and_then(Option::as_mut)
    }

    /// The number of registered services.
    pub fn len(&self) -> usize {
        self.services.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether no services are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the registered services with their slot indices.
    pub fn iter_mut(&mut self) -> impl Iterator<Item=(usize, &mut B)> {
        self.services
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_mut().map(|binding| (index, binding)))
    }
}

impl<B: ServiceBinding> Default for Registry<B> {
    fn default() -> Self {
        Registry::new()
    }
}
