//! # Facet Modules
//!
//! A facet is shared, stateless code deployed once into the registry's
//! module catalog and attached to any number of instances through cuts.
//!
//! Facets never own state. Every call receives a [`CallContext`] bound to
//! the instance that was *called*, even when the selector was resolved
//! through a parent, and all reads and writes go to that instance's storage.

use crate::cut::{FacetCut, InitCall};
use crate::event::RegistryEvent;
use crate::registry::Registry;
use crate::{Address, FacetError, InstanceId, InterfaceId, Node, RegistryError, Selector};

/// Executable facet module.
///
/// Implementations must be deterministic and keep all state in the
/// context's storage.
pub trait Facet: Send + Sync {
    /// Human-readable module name.
    fn name(&self) -> &str;

    /// Selectors this module answers, used when installing it with a cut.
    fn selectors(&self) -> Vec<Selector>;

    /// Run one call.
    ///
    /// `args` is the calldata after the selector. The returned bytes are
    /// handed back to the caller unchanged.
    fn execute(
        &self,
        ctx: &mut CallContext<'_>,
        selector: Selector,
        args: &[u8],
    ) -> Result<Vec<u8>, FacetError>;
}

// =============================================================================
// CALL CONTEXT
// =============================================================================

/// The execution environment of one facet call.
///
/// Every mutation made through the context is journaled; if the call fails
/// the registry reverts all of it.
pub struct CallContext<'a> {
    registry: &'a mut Registry,
    instance: InstanceId,
    owner: Address,
    caller: Address,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        registry: &'a mut Registry,
        instance: InstanceId,
        owner: Address,
        caller: Address,
    ) -> Self {
        Self {
            registry,
            instance,
            owner,
            caller,
        }
    }

    /// The instance whose storage this call runs against.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Owner of the calling instance.
    #[must_use]
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Identity that made the external call.
    #[must_use]
    pub fn caller(&self) -> Address {
        self.caller
    }

    /// Resource node of the calling instance.
    #[must_use]
    pub fn node(&self) -> Node {
        Node::for_instance(self.instance)
    }

    // -------------------------------------------------------------------------
    // Storage
    // -------------------------------------------------------------------------

    /// Read a storage slot of the calling instance.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.registry.storage_get(self.instance, key)
    }

    /// Write a storage slot of the calling instance.
    pub fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), RegistryError> {
        self.registry
            .storage_set(self.instance, key.to_vec(), Some(value))
    }

    /// Clear a storage slot of the calling instance.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), RegistryError> {
        self.registry.storage_set(self.instance, key.to_vec(), None)
    }

    // -------------------------------------------------------------------------
    // Registry access
    // -------------------------------------------------------------------------

    /// Dispatch a nested call, keeping the external caller.
    pub fn dispatch(
        &mut self,
        target: InstanceId,
        selector: Selector,
        args: &[u8],
    ) -> Result<Vec<u8>, RegistryError> {
        self.registry.dispatch(target, selector, args, self.caller)
    }

    /// Ask the calling instance's gate whether `who` may mutate it.
    pub fn is_authorised(&mut self, who: Address) -> Result<bool, RegistryError> {
        self.registry.is_authorised(self.instance, who)
    }

    /// Apply a cut batch to the calling instance.
    ///
    /// Always rejected with `ReentrantMutation` while this call is running,
    /// since the calling instance has an active dispatch.
    pub fn apply_cuts(
        &mut self,
        cuts: &[FacetCut],
        init: Option<InitCall>,
    ) -> Result<(), RegistryError> {
        self.registry
            .apply_cuts(self.instance, cuts, init, self.caller)
    }

    /// Apply a cut batch to another instance, as the external caller.
    pub fn cut_instance(
        &mut self,
        target: InstanceId,
        cuts: &[FacetCut],
        init: Option<InitCall>,
    ) -> Result<(), RegistryError> {
        self.registry.apply_cuts(target, cuts, init, self.caller)
    }

    /// Toggle interface support on the calling instance.
    pub fn set_supports_interfaces(
        &mut self,
        ids: &[InterfaceId],
        enabled: bool,
    ) -> Result<(), RegistryError> {
        self.registry
            .set_multi_supports_interface(self.instance, ids, enabled, self.caller)
    }

    /// Interface support of the calling instance.
    pub fn supports_interface(&self, id: InterfaceId) -> Result<bool, RegistryError> {
        self.registry.supports_interface(self.instance, id)
    }

    /// Clone the calling instance; the external caller owns the clone.
    pub fn clone_instance(&mut self) -> Result<InstanceId, RegistryError> {
        self.registry.clone_instance(self.instance, self.caller)
    }

    /// Append an event to the registry log.
    pub fn emit(&mut self, event: RegistryEvent) {
        self.registry.emit(event);
    }
}
