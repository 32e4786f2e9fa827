//! # Registry
//!
//! The dispatch registry: module catalog, instance arena, dispatcher, cut
//! protocol, clone factory, authorization bootstrap and interface overlay.
//!
//! ## Atomicity
//!
//! Every public mutating operation runs inside [`Registry::atomic`]. All
//! state changes are journaled; when the operation (or any nested call it
//! makes) fails, the journal is unwound to the operation's checkpoint
//! before the error is returned. Only the outermost call discards the
//! journal on success; nested calls keep their entries so that a later
//! failure of the outer call still reverts them.
//!
//! ## Re-entrancy
//!
//! Each instance carries a [`CallGuard`](crate::instance::CallGuard).
//! `apply_cuts` is refused while a dispatch into, or another cut of, the
//! same instance is on the stack.

use crate::codec::{decode_args, encode_args};
use crate::cut::{FacetCut, FacetCutAction, InitCall, InitTarget};
use crate::event::RegistryEvent;
use crate::facet::{CallContext, Facet};
use crate::instance::ResolverInstance;
use crate::journal::{Journal, UndoEntry};
use crate::primitives::{
    INTROSPECTION_INTERFACES, MAX_CALL_DEPTH, MAX_CUTS_PER_BATCH, MAX_INTERFACE_IDS,
    MAX_PAYLOAD_LENGTH, MAX_SELECTORS_PER_CUT, is_authorised_selector, is_builtin_selector,
    set_multi_supports_interface_selector, supports_interface_selector,
};
use crate::snapshot::{InstanceRecord, RegistrySnapshot};
use crate::{Address, FacetHandle, InstanceId, InterfaceId, RegistryError, Selector};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a traced resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The facet that handles the selector.
    pub facet: FacetHandle,
    /// The instance whose table produced the hit.
    pub source: InstanceId,
    /// Parent links followed before the hit (0 = local).
    pub hops: usize,
}

/// Summary of a deployed module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub handle: FacetHandle,
    pub name: String,
    pub selectors: Vec<Selector>,
}

/// The dispatch registry.
#[derive(Default)]
pub struct Registry {
    /// Append-only arena; `instances[i].id() == InstanceId(i)`.
    instances: Vec<ResolverInstance>,
    /// Deployed facet modules.
    modules: BTreeMap<FacetHandle, Arc<dyn Facet>>,
    /// Ordered event log.
    events: Vec<RegistryEvent>,
    journal: Journal,
    /// Open [`Registry::atomic`] scopes.
    open_scopes: usize,
    /// Bumped by every outermost call that changed state.
    revision: u64,
    /// Current facet-execution nesting.
    depth: usize,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("instances", &self.instances.len())
            .field("modules", &self.modules.len())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // MODULE CATALOG
    // =========================================================================

    /// Deploy a facet module under `handle`.
    pub fn deploy_module(
        &mut self,
        handle: FacetHandle,
        module: Arc<dyn Facet>,
    ) -> Result<(), RegistryError> {
        if handle.is_null() {
            return Err(RegistryError::InvalidInput(
                "cannot deploy a module at the null handle".to_string(),
            ));
        }
        if self.modules.contains_key(&handle) {
            return Err(RegistryError::ModuleAlreadyDeployed(handle));
        }
        info!(module = %handle, name = module.name(), "module deployed");
        self.modules.insert(handle, module);
        Ok(())
    }

    /// Look up a deployed module.
    #[must_use]
    pub fn module(&self, handle: FacetHandle) -> Option<Arc<dyn Facet>> {
        self.modules.get(&handle).cloned()
    }

    /// Summaries of every deployed module, in handle order.
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.modules
            .iter()
            .map(|(handle, module)| ModuleInfo {
                handle: *handle,
                name: module.name().to_string(),
                selectors: module.selectors(),
            })
            .collect()
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    // =========================================================================
    // INSTANCES / CLONE FACTORY
    // =========================================================================

    /// Create a root instance with no parent.
    pub fn create_instance(&mut self, owner: Address) -> Result<InstanceId, RegistryError> {
        self.atomic(|reg| {
            let id = reg.push_instance(owner, None);
            reg.emit(RegistryEvent::Created {
                instance: id,
                owner,
            });
            info!(instance = %id, owner = %owner, "instance created");
            Ok(id)
        })
    }

    /// Spawn a clone of `parent`, owned by `caller`.
    ///
    /// The clone starts with an empty table and overlay and falls back to
    /// `parent` for everything it does not map itself.
    pub fn clone_instance(
        &mut self,
        parent: InstanceId,
        caller: Address,
    ) -> Result<InstanceId, RegistryError> {
        self.instance(parent)?;
        self.atomic(|reg| {
            let id = reg.push_instance(caller, Some(parent));
            reg.emit(RegistryEvent::Cloned {
                resolver: id,
                parent,
                owner: caller,
            });
            info!(instance = %id, parent = %parent, owner = %caller, "instance cloned");
            Ok(id)
        })
    }

    /// Look up an instance.
    pub fn instance(&self, id: InstanceId) -> Result<&ResolverInstance, RegistryError> {
        self.instances
            .get(id.index())
            .ok_or(RegistryError::InstanceNotFound(id))
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut ResolverInstance, RegistryError> {
        self.instances
            .get_mut(id.index())
            .ok_or(RegistryError::InstanceNotFound(id))
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// All instances in id order.
    pub fn instances(&self) -> impl Iterator<Item = &ResolverInstance> + '_ {
        self.instances.iter()
    }

    /// The fallback parent of an instance.
    pub fn parent_of(&self, id: InstanceId) -> Result<Option<InstanceId>, RegistryError> {
        Ok(self.instance(id)?.parent())
    }

    /// The fallback chain above an instance, nearest first, root last.
    pub fn ancestors(&self, id: InstanceId) -> Result<Vec<InstanceId>, RegistryError> {
        let mut chain = Vec::new();
        let mut current = self.instance(id)?.parent();
        while let Some(parent) = current {
            chain.push(parent);
            current = self.instance(parent)?.parent();
        }
        Ok(chain)
    }

    fn push_instance(&mut self, owner: Address, parent: Option<InstanceId>) -> InstanceId {
        let id = InstanceId(self.instances.len() as u64);
        self.instances.push(ResolverInstance::new(id, owner, parent));
        self.journal.record(UndoEntry::InstanceCreated);
        id
    }

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    /// Resolve a selector for an instance.
    ///
    /// A local mapping wins; otherwise the parent's *current* table is
    /// consulted, recursively, until the root.
    pub fn resolve(
        &self,
        instance: InstanceId,
        selector: Selector,
    ) -> Result<FacetHandle, RegistryError> {
        self.resolve_traced(instance, selector).map(|r| r.facet)
    }

    /// Like [`Registry::resolve`], also reporting where the hit came from.
    pub fn resolve_traced(
        &self,
        instance: InstanceId,
        selector: Selector,
    ) -> Result<Resolution, RegistryError> {
        let mut current = Some(self.instance(instance)?);
        let mut hops = 0;
        while let Some(node) = current {
            if let Some(facet) = node.table.get(selector) {
                debug!(instance = %instance, selector = %selector, source = %node.id(), hops, "selector resolved");
                return Ok(Resolution {
                    facet,
                    source: node.id(),
                    hops,
                });
            }
            current = match node.parent() {
                Some(parent) => Some(self.instance(parent)?),
                None => None,
            };
            hops += 1;
        }
        debug!(instance = %instance, selector = %selector, hops, "selector not found");
        Err(RegistryError::SelectorNotFound(selector))
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Dispatch full calldata (`selector ++ args`).
    pub fn dispatch_calldata(
        &mut self,
        instance: InstanceId,
        calldata: &[u8],
        caller: Address,
    ) -> Result<Vec<u8>, RegistryError> {
        let (selector, args) = Selector::split_calldata(calldata).ok_or_else(|| {
            RegistryError::InvalidInput("calldata shorter than a selector".to_string())
        })?;
        self.dispatch(instance, selector, args, caller)
    }

    /// Route a call to the facet that handles `selector` for `instance`.
    ///
    /// Built-in operations are answered first. Otherwise the selector is
    /// resolved through the fallback chain and the facet runs against the
    /// storage of `instance` itself, not of the instance that mapped it.
    pub fn dispatch(
        &mut self,
        instance: InstanceId,
        selector: Selector,
        args: &[u8],
        caller: Address,
    ) -> Result<Vec<u8>, RegistryError> {
        self.instance(instance)?;
        if args.len() > MAX_PAYLOAD_LENGTH {
            return Err(RegistryError::InvalidInput(format!(
                "payload of {} bytes exceeds {}",
                args.len(),
                MAX_PAYLOAD_LENGTH
            )));
        }

        if selector == supports_interface_selector() {
            let id: InterfaceId = decode_args(args)?;
            return encode_args(&self.supports_interface(instance, id)?);
        }
        if selector == set_multi_supports_interface_selector() {
            let (ids, enabled): (Vec<InterfaceId>, bool) = decode_args(args)?;
            self.set_multi_supports_interface(instance, &ids, enabled, caller)?;
            return Ok(Vec::new());
        }

        let facet = self.resolve(instance, selector)?;
        self.execute(instance, facet, selector, args, caller)
    }

    /// Run one module against one instance under the call guard.
    fn execute(
        &mut self,
        instance: InstanceId,
        facet: FacetHandle,
        selector: Selector,
        args: &[u8],
        caller: Address,
    ) -> Result<Vec<u8>, RegistryError> {
        let module = self
            .module(facet)
            .ok_or(RegistryError::ModuleNotFound(facet))?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RegistryError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        let owner = self.instance(instance)?.owner();

        self.atomic(|reg| {
            reg.enter(instance)?;
            let result = {
                let mut ctx = CallContext::new(reg, instance, owner, caller);
                module.execute(&mut ctx, selector, args)
            };
            reg.leave(instance);
            result.map_err(|e| {
                debug!(instance = %instance, selector = %selector, facet = %facet, reason = %e, "facet failed");
                RegistryError::Facet(e)
            })
        })
    }

    fn enter(&mut self, instance: InstanceId) -> Result<(), RegistryError> {
        self.instance_mut(instance)?.guard.active_calls += 1;
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self, instance: InstanceId) {
        if let Ok(node) = self.instance_mut(instance) {
            node.guard.active_calls = node.guard.active_calls.saturating_sub(1);
        }
        self.depth = self.depth.saturating_sub(1);
    }

    // =========================================================================
    // AUTHORIZATION
    // =========================================================================

    /// Whether `caller` may mutate `instance`.
    ///
    /// The owner always may. Anyone else is asked about through the
    /// instance's `isAuthorised(address,bytes32)` selector, resolved like
    /// any other call; with no gate resolvable the answer is no.
    pub fn is_authorised(
        &mut self,
        instance: InstanceId,
        caller: Address,
    ) -> Result<bool, RegistryError> {
        let node = self.instance(instance)?;
        if node.owner() == caller {
            return Ok(true);
        }
        let args = encode_args(&(caller, node.node()))?;
        match self.dispatch(instance, is_authorised_selector(), &args, caller) {
            Ok(answer) => decode_args(&answer),
            Err(RegistryError::SelectorNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn authorize(&mut self, instance: InstanceId, caller: Address) -> Result<(), RegistryError> {
        if self.is_authorised(instance, caller)? {
            Ok(())
        } else {
            warn!(instance = %instance, caller = %caller, "unauthorized mutation rejected");
            Err(RegistryError::Unauthorized { caller, instance })
        }
    }

    // =========================================================================
    // CUTS
    // =========================================================================

    /// Apply a cut batch, then run the optional init hook.
    ///
    /// The batch is all-or-nothing: a precondition failure in any cut, an
    /// unknown module, or a failing init hook leaves the table exactly as
    /// it was.
    pub fn apply_cuts(
        &mut self,
        instance: InstanceId,
        cuts: &[FacetCut],
        init: Option<InitCall>,
        caller: Address,
    ) -> Result<(), RegistryError> {
        if cuts.len() > MAX_CUTS_PER_BATCH {
            return Err(RegistryError::InvalidInput(format!(
                "batch of {} cuts exceeds {}",
                cuts.len(),
                MAX_CUTS_PER_BATCH
            )));
        }
        if let Some(cut) = cuts.iter().find(|c| c.selectors.len() > MAX_SELECTORS_PER_CUT) {
            return Err(RegistryError::InvalidInput(format!(
                "cut of {} selectors exceeds {}",
                cut.selectors.len(),
                MAX_SELECTORS_PER_CUT
            )));
        }
        if let Some(reserved) = cuts
            .iter()
            .flat_map(|c| c.selectors.iter())
            .find(|s| is_builtin_selector(**s))
        {
            return Err(RegistryError::InvalidInput(format!(
                "selector {} is answered by the registry and cannot be cut",
                reserved
            )));
        }
        if self.instance(instance)?.guard.is_busy() {
            warn!(instance = %instance, caller = %caller, "re-entrant cut rejected");
            return Err(RegistryError::ReentrantMutation(instance));
        }

        self.atomic(|reg| {
            reg.authorize(instance, caller)?;
            reg.instance_mut(instance)?.guard.cutting = true;
            let result = reg.commit_cuts(instance, cuts, init.as_ref(), caller);
            if let Ok(node) = reg.instance_mut(instance) {
                node.guard.cutting = false;
            }
            result
        })
    }

    fn commit_cuts(
        &mut self,
        instance: InstanceId,
        cuts: &[FacetCut],
        init: Option<&InitCall>,
        caller: Address,
    ) -> Result<(), RegistryError> {
        let changes = self.instance(instance)?.table.plan(cuts)?;
        if let Some(cut) = cuts.iter().find(|c| {
            c.action != FacetCutAction::Remove && !self.modules.contains_key(&c.target)
        }) {
            return Err(RegistryError::ModuleNotFound(cut.target));
        }

        for change in &changes {
            self.instance_mut(instance)?
                .table
                .set(change.selector, change.next);
            self.journal.record(UndoEntry::Table {
                instance,
                selector: change.selector,
                previous: change.previous,
            });
        }

        if let Some(init) = init {
            self.run_init(instance, init, caller)?;
        }

        self.emit(RegistryEvent::FacetsCut {
            instance,
            cuts: cuts.to_vec(),
            init: init.map(|i| i.target),
        });
        info!(
            instance = %instance,
            caller = %caller,
            cuts = cuts.len(),
            changed = changes.len(),
            "facets cut"
        );
        Ok(())
    }

    fn run_init(
        &mut self,
        instance: InstanceId,
        init: &InitCall,
        caller: Address,
    ) -> Result<(), RegistryError> {
        let Some((selector, args)) = Selector::split_calldata(&init.payload) else {
            return Err(RegistryError::InitCallFailed {
                target: init.target,
                reason: "payload shorter than a selector".to_string(),
            });
        };
        let outcome = match init.target {
            InitTarget::Resolver => self.dispatch(instance, selector, args, caller),
            InitTarget::Facet(facet) => self.execute(instance, facet, selector, args, caller),
        };
        outcome.map(|_| ()).map_err(|e| {
            warn!(instance = %instance, init_target = %init.target, reason = %e, "init call failed");
            RegistryError::InitCallFailed {
                target: init.target,
                reason: match e {
                    RegistryError::Facet(inner) => inner.reason,
                    other => other.to_string(),
                },
            }
        })
    }

    // =========================================================================
    // INTERFACE OVERLAY
    // =========================================================================

    /// Set explicit interface support on an instance (gated).
    pub fn set_multi_supports_interface(
        &mut self,
        instance: InstanceId,
        ids: &[InterfaceId],
        enabled: bool,
        caller: Address,
    ) -> Result<(), RegistryError> {
        if ids.len() > MAX_INTERFACE_IDS {
            return Err(RegistryError::InvalidInput(format!(
                "{} interface ids exceed {}",
                ids.len(),
                MAX_INTERFACE_IDS
            )));
        }
        self.instance(instance)?;
        self.atomic(|reg| {
            reg.authorize(instance, caller)?;
            for &id in ids {
                let previous = reg.instance_mut(instance)?.interfaces.set(id, Some(enabled));
                reg.journal.record(UndoEntry::Interface {
                    instance,
                    id,
                    previous,
                });
            }
            reg.emit(RegistryEvent::InterfacesChanged {
                instance,
                ids: ids.to_vec(),
                enabled,
            });
            info!(instance = %instance, caller = %caller, ids = ids.len(), enabled, "interfaces changed");
            Ok(())
        })
    }

    /// Interface support: local entry, else parent chain, else the fixed
    /// introspection set.
    pub fn supports_interface(
        &self,
        instance: InstanceId,
        id: InterfaceId,
    ) -> Result<bool, RegistryError> {
        let mut current = Some(instance);
        while let Some(cur) = current {
            let node = self.instance(cur)?;
            if let Some(enabled) = node.interfaces.get(id) {
                return Ok(enabled);
            }
            current = node.parent();
        }
        Ok(INTROSPECTION_INTERFACES.contains(&id))
    }

    // =========================================================================
    // LOUPE
    // =========================================================================

    /// Local mappings of an instance grouped by facet.
    pub fn facets(
        &self,
        instance: InstanceId,
    ) -> Result<Vec<(FacetHandle, Vec<Selector>)>, RegistryError> {
        Ok(self.instance(instance)?.table.by_facet().into_iter().collect())
    }

    /// Selectors an instance maps locally to one facet.
    pub fn facet_selectors(
        &self,
        instance: InstanceId,
        facet: FacetHandle,
    ) -> Result<Vec<Selector>, RegistryError> {
        Ok(self.instance(instance)?.table.selectors_of(facet))
    }

    /// Facets an instance maps locally, in handle order.
    pub fn facet_addresses(&self, instance: InstanceId) -> Result<Vec<FacetHandle>, RegistryError> {
        Ok(self.instance(instance)?.table.by_facet().into_keys().collect())
    }

    /// Local mapping of one selector, without fallback.
    pub fn facet_address(
        &self,
        instance: InstanceId,
        selector: Selector,
    ) -> Result<Option<FacetHandle>, RegistryError> {
        Ok(self.instance(instance)?.table.get(selector))
    }

    // =========================================================================
    // STORAGE / EVENTS (journaled primitives)
    // =========================================================================

    pub(crate) fn storage_get(&self, instance: InstanceId, key: &[u8]) -> Option<Vec<u8>> {
        self.instances
            .get(instance.index())
            .and_then(|node| node.storage.get(key))
            .map(<[u8]>::to_vec)
    }

    pub(crate) fn storage_set(
        &mut self,
        instance: InstanceId,
        key: Vec<u8>,
        value: Option<Vec<u8>>,
    ) -> Result<(), RegistryError> {
        let previous = self
            .instance_mut(instance)?
            .storage
            .set(key.clone(), value);
        self.journal.record(UndoEntry::Storage {
            instance,
            key,
            previous,
        });
        Ok(())
    }

    pub(crate) fn emit(&mut self, event: RegistryEvent) {
        debug!(event = event.name(), instance = %event.instance(), "event emitted");
        self.events.push(event);
        self.journal.record(UndoEntry::EventEmitted);
    }

    /// The event log, oldest first.
    #[must_use]
    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    // =========================================================================
    // ATOMICITY
    // =========================================================================

    /// Changes with every outermost call that left state different.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Run `f` as one all-or-nothing unit.
    fn atomic<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let checkpoint = self.journal.checkpoint();
        self.open_scopes += 1;
        let result = f(self);
        self.open_scopes -= 1;
        match &result {
            Ok(_) if self.open_scopes == 0 => {
                if !self.journal.is_empty() {
                    self.revision += 1;
                }
                self.journal.clear();
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "reverting call");
                for entry in self.journal.unwind(checkpoint) {
                    self.undo(entry);
                }
            }
        }
        result
    }

    fn undo(&mut self, entry: UndoEntry) {
        match entry {
            UndoEntry::Table {
                instance,
                selector,
                previous,
            } => {
                if let Some(node) = self.instances.get_mut(instance.index()) {
                    node.table.set(selector, previous);
                }
            }
            UndoEntry::Interface {
                instance,
                id,
                previous,
            } => {
                if let Some(node) = self.instances.get_mut(instance.index()) {
                    node.interfaces.set(id, previous);
                }
            }
            UndoEntry::Storage {
                instance,
                key,
                previous,
            } => {
                if let Some(node) = self.instances.get_mut(instance.index()) {
                    node.storage.set(key, previous);
                }
            }
            UndoEntry::InstanceCreated => {
                self.instances.pop();
            }
            UndoEntry::EventEmitted => {
                self.events.pop();
            }
        }
    }

    // =========================================================================
    // SNAPSHOT
    // =========================================================================

    /// Capture the persistent state.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            instances: self.instances.iter().map(InstanceRecord::from).collect(),
        }
    }

    /// Replace all instances with the snapshot's.
    ///
    /// Every referenced module must already be deployed. The event log is
    /// cleared. On error the registry is left untouched.
    pub fn restore(&mut self, snapshot: &RegistrySnapshot) -> Result<(), RegistryError> {
        snapshot.validate()?;
        if let Some(missing) = snapshot
            .referenced_modules()
            .into_iter()
            .find(|h| !self.modules.contains_key(h))
        {
            return Err(RegistryError::ModuleNotFound(missing));
        }
        let instances = snapshot
            .instances
            .iter()
            .map(InstanceRecord::to_instance)
            .collect::<Result<Vec<_>, _>>()?;

        info!(instances = instances.len(), "registry restored");
        self.instances = instances;
        self.events.clear();
        self.journal.clear();
        self.open_scopes = 0;
        self.depth = 0;
        self.revision += 1;
        Ok(())
    }

    /// Return to an earlier snapshot, keeping the first `event_count`
    /// events of the log.
    pub fn rollback(
        &mut self,
        snapshot: &RegistrySnapshot,
        event_count: usize,
    ) -> Result<(), RegistryError> {
        let mut events = std::mem::take(&mut self.events);
        events.truncate(event_count);
        let restored = self.restore(snapshot);
        self.events = events;
        restored
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FacetError;
    use crate::codec::calldata;

    /// Returns its own name for one selector.
    struct Echo {
        selector: Selector,
        word: &'static str,
    }

    impl Facet for Echo {
        fn name(&self) -> &str {
            self.word
        }

        fn selectors(&self) -> Vec<Selector> {
            vec![self.selector]
        }

        fn execute(
            &self,
            _ctx: &mut CallContext<'_>,
            _selector: Selector,
            _args: &[u8],
        ) -> Result<Vec<u8>, FacetError> {
            Ok(self.word.as_bytes().to_vec())
        }
    }

    /// Counts calls in the instance's storage, then fails if asked to.
    struct Counter;

    impl Facet for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn selectors(&self) -> Vec<Selector> {
            vec![Selector::from_signature("bump(bool)")]
        }

        fn execute(
            &self,
            ctx: &mut CallContext<'_>,
            _selector: Selector,
            args: &[u8],
        ) -> Result<Vec<u8>, FacetError> {
            let fail: bool = decode_args(args)?;
            let count = ctx.get(b"count").map(|v| v.len()).unwrap_or(0) + 1;
            ctx.put(b"count", vec![0; count])?;
            if fail {
                return Err(FacetError::new("asked to fail"));
            }
            Ok(vec![count as u8])
        }
    }

    /// `mark()` writes a slot; `relay()` calls `mark()` through the
    /// registry, clones its instance, then fails.
    struct Relay;

    impl Facet for Relay {
        fn name(&self) -> &str {
            "relay"
        }

        fn selectors(&self) -> Vec<Selector> {
            vec![Selector::from_signature("mark()"), Selector::from_signature("relay()")]
        }

        fn execute(
            &self,
            ctx: &mut CallContext<'_>,
            selector: Selector,
            _args: &[u8],
        ) -> Result<Vec<u8>, FacetError> {
            if selector == Selector::from_signature("mark()") {
                ctx.put(b"mark", vec![1])?;
                return Ok(Vec::new());
            }
            let me = ctx.instance();
            ctx.dispatch(me, Selector::from_signature("mark()"), &[])?;
            ctx.clone_instance()?;
            Err(FacetError::new("relay gives up"))
        }
    }

    fn owner() -> Address {
        Address::from_low_u64(0xa11ce)
    }

    fn sel(sig: &str) -> Selector {
        Selector::from_signature(sig)
    }

    fn setup() -> (Registry, InstanceId) {
        let mut reg = Registry::new();
        reg.deploy_module(
            FacetHandle::from_low_u64(1),
            Arc::new(Echo {
                selector: sel("a()"),
                word: "one",
            }),
        )
        .expect("deploy");
        reg.deploy_module(
            FacetHandle::from_low_u64(2),
            Arc::new(Echo {
                selector: sel("a()"),
                word: "two",
            }),
        )
        .expect("deploy");
        reg.deploy_module(FacetHandle::from_low_u64(3), Arc::new(Counter))
            .expect("deploy");
        let root = reg.create_instance(owner()).expect("create");
        (reg, root)
    }

    #[test]
    fn deploy_rejects_duplicates_and_null() {
        let (mut reg, _) = setup();
        let again = reg.deploy_module(FacetHandle::from_low_u64(1), Arc::new(Counter));
        assert!(matches!(again, Err(RegistryError::ModuleAlreadyDeployed(_))));

        let null = reg.deploy_module(FacetHandle::NULL, Arc::new(Counter));
        assert!(matches!(null, Err(RegistryError::InvalidInput(_))));
    }

    #[test]
    fn dispatch_unmapped_selector_fails() {
        let (mut reg, root) = setup();
        let result = reg.dispatch(root, sel("a()"), &[], owner());
        assert!(matches!(result, Err(RegistryError::SelectorNotFound(_))));
    }

    #[test]
    fn cut_and_dispatch() {
        let (mut reg, root) = setup();
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            None,
            owner(),
        )
        .expect("cut");

        let out = reg.dispatch(root, sel("a()"), &[], owner()).expect("dispatch");
        assert_eq!(out, b"one");
    }

    #[test]
    fn cut_rejects_undeployed_module() {
        let (mut reg, root) = setup();
        let result = reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(99), vec![sel("a()")])],
            None,
            owner(),
        );
        assert!(matches!(result, Err(RegistryError::ModuleNotFound(_))));
        assert!(reg.instance(root).expect("root").table().is_empty());
    }

    #[test]
    fn stranger_cannot_cut_without_gate() {
        let (mut reg, root) = setup();
        let result = reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            None,
            Address::from_low_u64(0xbad),
        );
        assert!(matches!(result, Err(RegistryError::Unauthorized { .. })));
    }

    #[test]
    fn failed_facet_reverts_storage() {
        let (mut reg, root) = setup();
        let bump = sel("bump(bool)");
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(3), vec![bump])],
            None,
            owner(),
        )
        .expect("cut");

        let ok = reg
            .dispatch(root, bump, &encode_args(&false).expect("encode"), owner())
            .expect("bump");
        assert_eq!(ok, vec![1]);

        let failed = reg.dispatch(root, bump, &encode_args(&true).expect("encode"), owner());
        assert!(matches!(failed, Err(RegistryError::Facet(_))));
        assert_eq!(
            reg.instance(root).expect("root").storage().get(b"count"),
            Some(&[0u8][..])
        );
    }

    #[test]
    fn clone_runs_against_its_own_storage() {
        let (mut reg, root) = setup();
        let bump = sel("bump(bool)");
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(3), vec![bump])],
            None,
            owner(),
        )
        .expect("cut");
        let child = reg.clone_instance(root, owner()).expect("clone");

        let args = encode_args(&false).expect("encode");
        reg.dispatch(child, bump, &args, owner()).expect("bump");
        reg.dispatch(child, bump, &args, owner()).expect("bump");

        assert_eq!(
            reg.instance(child).expect("child").storage().get(b"count").map(<[u8]>::len),
            Some(2)
        );
        assert!(reg.instance(root).expect("root").storage().is_empty());
    }

    #[test]
    fn failed_call_reverts_its_successful_nested_calls() {
        let (mut reg, root) = setup();
        reg.deploy_module(FacetHandle::from_low_u64(4), Arc::new(Relay))
            .expect("deploy");
        reg.apply_cuts(
            root,
            &[FacetCut::add(
                FacetHandle::from_low_u64(4),
                vec![sel("mark()"), sel("relay()")],
            )],
            None,
            owner(),
        )
        .expect("cut");
        let events = reg.events().len();
        let revision = reg.revision();

        let result = reg.dispatch(root, sel("relay()"), &[], owner());
        assert!(matches!(result, Err(RegistryError::Facet(_))));
        assert_eq!(reg.instance(root).expect("root").storage().get(b"mark"), None);
        assert_eq!(reg.instance_count(), 1);
        assert_eq!(reg.events().len(), events);
        assert_eq!(reg.revision(), revision);

        // The journal is balanced again: a plain call still commits.
        reg.dispatch(root, sel("mark()"), &[], owner()).expect("mark");
        assert_eq!(
            reg.instance(root).expect("root").storage().get(b"mark"),
            Some(&[1u8][..])
        );
    }

    #[test]
    fn revision_moves_only_on_change() {
        let (mut reg, root) = setup();
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            None,
            owner(),
        )
        .expect("cut");
        let revision = reg.revision();

        reg.dispatch(root, sel("a()"), &[], owner()).expect("dispatch");
        assert_eq!(reg.revision(), revision);

        reg.clone_instance(root, owner()).expect("clone");
        assert_eq!(reg.revision(), revision + 1);
    }

    #[test]
    fn cut_rejects_builtin_selectors() {
        let (mut reg, root) = setup();
        for builtin in [
            supports_interface_selector(),
            set_multi_supports_interface_selector(),
        ] {
            let result = reg.apply_cuts(
                root,
                &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()"), builtin])],
                None,
                owner(),
            );
            assert!(matches!(result, Err(RegistryError::InvalidInput(_))));
        }
        assert!(reg.instance(root).expect("root").table().is_empty());
    }

    #[test]
    fn rollback_restores_tables_and_event_log() {
        let (mut reg, root) = setup();
        let before = reg.snapshot();
        let events = reg.events().len();

        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            None,
            owner(),
        )
        .expect("cut");
        reg.clone_instance(root, owner()).expect("clone");

        reg.rollback(&before, events).expect("rollback");
        assert_eq!(reg.snapshot(), before);
        assert_eq!(reg.events().len(), events);
    }

    #[test]
    fn init_hook_on_resolver_sets_interfaces() {
        let (mut reg, root) = setup();
        let iid = InterfaceId::from(sel("a()"));
        let payload = calldata(set_multi_supports_interface_selector(), &(vec![iid], true))
            .expect("calldata");

        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            Some(InitCall::resolver(payload)),
            owner(),
        )
        .expect("cut");

        assert!(reg.supports_interface(root, iid).expect("supports"));
    }

    #[test]
    fn short_init_payload_fails_and_reverts() {
        let (mut reg, root) = setup();
        let result = reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            Some(InitCall::resolver(vec![1, 2])),
            owner(),
        );
        assert!(matches!(result, Err(RegistryError::InitCallFailed { .. })));
        assert!(reg.instance(root).expect("root").table().is_empty());
    }

    #[test]
    fn introspection_defaults() {
        let (reg, root) = setup();
        for id in INTROSPECTION_INTERFACES {
            assert!(reg.supports_interface(root, id).expect("supports"));
        }
        assert!(!reg
            .supports_interface(root, InterfaceId::from_u32(0x1234_5678))
            .expect("supports"));
    }

    #[test]
    fn supports_interface_via_dispatch() {
        let (mut reg, root) = setup();
        let args = encode_args(&InterfaceId::from_u32(0x01ff_c9a7)).expect("encode");
        let out = reg
            .dispatch(root, supports_interface_selector(), &args, owner())
            .expect("dispatch");
        assert!(decode_args::<bool>(&out).expect("decode"));
    }

    #[test]
    fn resolve_traced_counts_hops() {
        let (mut reg, root) = setup();
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            None,
            owner(),
        )
        .expect("cut");
        let child = reg.clone_instance(root, owner()).expect("clone");
        let grandchild = reg.clone_instance(child, owner()).expect("clone");

        let hit = reg.resolve_traced(grandchild, sel("a()")).expect("resolve");
        assert_eq!(hit.source, root);
        assert_eq!(hit.hops, 2);
        assert_eq!(reg.ancestors(grandchild).expect("ancestors"), vec![child, root]);
    }

    #[test]
    fn loupe_reports_local_mappings_only() {
        let (mut reg, root) = setup();
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            None,
            owner(),
        )
        .expect("cut");
        let child = reg.clone_instance(root, owner()).expect("clone");

        assert_eq!(reg.facets(root).expect("facets").len(), 1);
        assert!(reg.facets(child).expect("facets").is_empty());
        assert_eq!(reg.facet_address(child, sel("a()")).expect("loupe"), None);
        assert_eq!(
            reg.facet_selectors(root, FacetHandle::from_low_u64(1))
                .expect("loupe"),
            vec![sel("a()")]
        );
        assert_eq!(
            reg.facet_addresses(root).expect("loupe"),
            vec![FacetHandle::from_low_u64(1)]
        );
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let (mut reg, root) = setup();
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            None,
            owner(),
        )
        .expect("cut");
        let child = reg.clone_instance(root, owner()).expect("clone");
        let snapshot = reg.snapshot();

        let (mut fresh, _) = setup();
        fresh.restore(&snapshot).expect("restore");
        assert_eq!(fresh.snapshot(), snapshot);
        assert_eq!(
            fresh.resolve(child, sel("a()")).expect("resolve"),
            FacetHandle::from_low_u64(1)
        );
        assert!(fresh.events().is_empty());
    }

    #[test]
    fn restore_requires_deployed_modules() {
        let (mut reg, root) = setup();
        reg.apply_cuts(
            root,
            &[FacetCut::add(FacetHandle::from_low_u64(1), vec![sel("a()")])],
            None,
            owner(),
        )
        .expect("cut");
        let snapshot = reg.snapshot();

        let mut bare = Registry::new();
        assert!(matches!(
            bare.restore(&snapshot),
            Err(RegistryError::ModuleNotFound(_))
        ));
        assert_eq!(bare.instance_count(), 0);
    }
}
