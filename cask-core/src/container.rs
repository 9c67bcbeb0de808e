//! The service container: binding registry, alias table, instance cache, and
//! lifecycle management.
//!
//! The container maps abstract identifiers (opaque strings) to construction
//! recipes and resolves them on demand, walking constructor dependencies
//! through the registered [`TypeIntrospector`]. Cloning a container is cheap
//! and shares all state.
//!
//! ## Basic usage
//!
//! ```
//! use cask_core::{Concrete, Container, to_instance};
//!
//! let container = Container::new();
//!
//! container
//!     .bind(
//!         "greeting",
//!         Some(Concrete::factory(|_, _| Ok(to_instance("hello".to_string())))),
//!         false,
//!     )
//!     .unwrap();
//!
//! let greeting = container.make_as::<String>("greeting").unwrap();
//! assert_eq!(*greeting, "hello");
//! ```
//!
//! ## Lifetimes
//!
//! - `bind` - a fresh instance per resolution.
//! - `singleton` - built once, cached for the container's lifetime.
//! - `scoped` - cached like a singleton, evicted by
//!   [`Container::forget_scoped_instances`] at scope boundaries.
//! - `instance` - an existing value registered as shared directly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::debug;

use crate::binding::Binding;
use crate::contextual::ContextualBindingBuilder;
use crate::events::Hooks;
use crate::{
    Concrete, ContextualImpl, DescriptorRegistry, Error, Factory, Instance, Overrides,
    TypeIntrospector,
};

pub(crate) type Extender = Arc<dyn Fn(Instance, &Container) -> Instance + Send + Sync>;
pub(crate) type ReboundCallback = Arc<dyn Fn(&Container, Instance) + Send + Sync>;
pub(crate) type MethodBinding =
    Arc<dyn Fn(Instance, &Container) -> Result<Instance, Error> + Send + Sync>;

pub(crate) type BuildStack = SmallVec<[String; 8]>;
type OverrideStack = SmallVec<[Overrides; 4]>;

/// The current process-wide container, if one has been installed.
static GLOBAL_CONTAINER: Lazy<RwLock<Option<Container>>> = Lazy::new(|| RwLock::new(None));

pub(crate) struct State {
    pub(crate) introspector: RwLock<Arc<dyn TypeIntrospector>>,
    pub(crate) bindings: RwLock<HashMap<String, Binding>>,
    pub(crate) method_bindings: RwLock<HashMap<String, MethodBinding>>,
    pub(crate) instances: RwLock<HashMap<String, Instance>>,
    pub(crate) scoped_instances: RwLock<Vec<String>>,
    pub(crate) aliases: RwLock<HashMap<String, String>>,
    pub(crate) abstract_aliases: RwLock<HashMap<String, Vec<String>>>,
    pub(crate) extenders: RwLock<HashMap<String, Vec<Extender>>>,
    pub(crate) tags: RwLock<HashMap<String, Vec<String>>>,
    pub(crate) build_stack: RwLock<BuildStack>,
    pub(crate) overrides: RwLock<OverrideStack>,
    pub(crate) resolved: RwLock<HashSet<String>>,
    pub(crate) rebound: RwLock<HashMap<String, Vec<ReboundCallback>>>,
    pub(crate) contextual: RwLock<HashMap<String, HashMap<String, ContextualImpl>>>,
    pub(crate) hooks: Hooks,
}

/// The dependency injection container.
#[derive(Clone)]
pub struct Container {
    pub(crate) state: Arc<State>,
}

impl Container {
    /// A container backed by an empty [`DescriptorRegistry`].
    pub fn new() -> Self {
        Self::with_introspector(Arc::new(DescriptorRegistry::new()))
    }

    /// A container backed by the given introspector.
    pub fn with_introspector(introspector: Arc<dyn TypeIntrospector>) -> Self {
        debug!("Creating new container");
        Self {
            state: Arc::new(State {
                introspector: RwLock::new(introspector),
                bindings: RwLock::new(HashMap::new()),
                method_bindings: RwLock::new(HashMap::new()),
                instances: RwLock::new(HashMap::new()),
                scoped_instances: RwLock::new(Vec::new()),
                aliases: RwLock::new(HashMap::new()),
                abstract_aliases: RwLock::new(HashMap::new()),
                extenders: RwLock::new(HashMap::new()),
                tags: RwLock::new(HashMap::new()),
                build_stack: RwLock::new(SmallVec::new()),
                overrides: RwLock::new(SmallVec::new()),
                resolved: RwLock::new(HashSet::new()),
                rebound: RwLock::new(HashMap::new()),
                contextual: RwLock::new(HashMap::new()),
                hooks: Hooks::default(),
            }),
        }
    }

    /// The introspector consulted for constructor enumeration.
    pub fn introspector(&self) -> Arc<dyn TypeIntrospector> {
        self.state.introspector.read().clone()
    }

    /// Swap the introspector. Existing bindings are unaffected.
    pub fn set_introspector(&self, introspector: Arc<dyn TypeIntrospector>) {
        *self.state.introspector.write() = introspector;
    }

    // ---------------------------------------------------------------
    // Process-wide container slot
    // ---------------------------------------------------------------

    /// The process-wide container, installing a fresh one on first access.
    ///
    /// Access is opt-in: nothing in the crate consults this slot implicitly.
    pub fn global() -> Container {
        let mut slot = GLOBAL_CONTAINER.write();
        slot.get_or_insert_with(Container::new).clone()
    }

    /// The process-wide container, if one has been installed.
    pub fn try_global() -> Option<Container> {
        GLOBAL_CONTAINER.read().clone()
    }

    /// Install (or clear, with `None`) the process-wide container, returning
    /// the newly current value. Tests reset between cases with
    /// `Container::set_global(None)`.
    pub fn set_global(container: Option<Container>) -> Option<Container> {
        let mut slot = GLOBAL_CONTAINER.write();
        *slot = container;
        slot.clone()
    }

    // ---------------------------------------------------------------
    // Alias table
    // ---------------------------------------------------------------

    /// Alias a type to a different name.
    ///
    /// Fails on direct self-aliasing and on any chain that would loop back to
    /// `alias`, leaving the table untouched in both cases.
    pub fn alias(&self, abstract_id: &str, alias: &str) -> Result<(), Error> {
        if alias == abstract_id {
            return Err(Error::SelfAlias {
                abstract_id: abstract_id.to_string(),
            });
        }

        {
            let aliases = self.state.aliases.read();
            let mut current = abstract_id;
            loop {
                if current == alias {
                    return Err(Error::AliasCycle {
                        abstract_id: abstract_id.to_string(),
                        alias: alias.to_string(),
                    });
                }
                match aliases.get(current) {
                    Some(next) => current = next.as_str(),
                    None => break,
                }
            }
        }

        debug!(id = %abstract_id, alias = %alias, "Alias registered");
        self.state
            .aliases
            .write()
            .insert(alias.to_string(), abstract_id.to_string());
        self.state
            .abstract_aliases
            .write()
            .entry(abstract_id.to_string())
            .or_default()
            .push(alias.to_string());
        Ok(())
    }

    /// Follow the alias chain to its canonical identifier. Identifiers with
    /// no alias resolve to themselves. Total: registration rejects cycles.
    pub fn get_alias(&self, name: &str) -> String {
        let aliases = self.state.aliases.read();
        let mut current = name;
        while let Some(next) = aliases.get(current) {
            current = next.as_str();
        }
        current.to_string()
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.state.aliases.read().contains_key(name)
    }

    /// Drop `name` from every abstract's reverse alias list. Used when a
    /// fresh instance registration replaces the alias.
    fn remove_abstract_alias(&self, name: &str) {
        if !self.is_alias(name) {
            return;
        }
        let mut abstract_aliases = self.state.abstract_aliases.write();
        for aliases in abstract_aliases.values_mut() {
            aliases.retain(|alias| alias != name);
        }
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Whether the identifier has a binding, a cached instance, or an alias.
    pub fn bound(&self, abstract_id: &str) -> bool {
        self.state.bindings.read().contains_key(abstract_id)
            || self.state.instances.read().contains_key(abstract_id)
            || self.is_alias(abstract_id)
    }

    /// Lookup-service existence check; equivalent to [`Container::bound`].
    pub fn has(&self, id: &str) -> bool {
        self.bound(id)
    }

    /// Whether the identifier has been resolved at least once.
    pub fn resolved(&self, abstract_id: &str) -> bool {
        let abstract_id = if self.is_alias(abstract_id) {
            self.get_alias(abstract_id)
        } else {
            abstract_id.to_string()
        };
        self.state.resolved.read().contains(&abstract_id)
            || self.state.instances.read().contains_key(&abstract_id)
    }

    pub fn is_shared(&self, abstract_id: &str) -> bool {
        self.state.instances.read().contains_key(abstract_id)
            || self
                .state
                .bindings
                .read()
                .get(abstract_id)
                .is_some_and(|binding| binding.shared)
    }

    /// Snapshot of registered binding identifiers and their shared flags.
    pub fn bindings(&self) -> Vec<(String, bool)> {
        self.state
            .bindings
            .read()
            .iter()
            .map(|(id, binding)| (id.clone(), binding.shared))
            .collect()
    }

    // ---------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------

    /// Register a binding. With `concrete` omitted the identifier is bound to
    /// itself; a bare identifier concrete is wrapped into a build closure.
    ///
    /// Rebinding over an already-resolved identifier fires the rebinding
    /// callbacks with a freshly resolved instance, which is why this can fail.
    pub fn bind(
        &self,
        abstract_id: &str,
        concrete: Option<Concrete>,
        shared: bool,
    ) -> Result<(), Error> {
        self.drop_stale_instances(abstract_id);

        let concrete =
            concrete.unwrap_or_else(|| Concrete::Identifier(abstract_id.to_string()));
        let factory = match concrete {
            Concrete::Factory(factory) => factory,
            Concrete::Identifier(concrete) => self.build_closure(abstract_id, &concrete),
        };

        self.state.bindings.write().insert(
            abstract_id.to_string(),
            Binding {
                concrete: factory,
                shared,
            },
        );
        debug!(id = %abstract_id, shared, "Binding registered");

        if self.resolved(abstract_id) {
            self.rebound(abstract_id)?;
        }
        Ok(())
    }

    /// Register a binding unless the identifier is already bound.
    pub fn bind_if(
        &self,
        abstract_id: &str,
        concrete: Option<Concrete>,
        shared: bool,
    ) -> Result<(), Error> {
        if !self.bound(abstract_id) {
            self.bind(abstract_id, concrete, shared)?;
        }
        Ok(())
    }

    /// Register a shared binding.
    pub fn singleton(&self, abstract_id: &str, concrete: Option<Concrete>) -> Result<(), Error> {
        self.bind(abstract_id, concrete, true)
    }

    pub fn singleton_if(
        &self,
        abstract_id: &str,
        concrete: Option<Concrete>,
    ) -> Result<(), Error> {
        if !self.bound(abstract_id) {
            self.singleton(abstract_id, concrete)?;
        }
        Ok(())
    }

    /// Register a shared binding whose instance is evicted by
    /// [`Container::forget_scoped_instances`].
    pub fn scoped(&self, abstract_id: &str, concrete: Option<Concrete>) -> Result<(), Error> {
        self.state
            .scoped_instances
            .write()
            .push(abstract_id.to_string());
        self.singleton(abstract_id, concrete)
    }

    pub fn scoped_if(&self, abstract_id: &str, concrete: Option<Concrete>) -> Result<(), Error> {
        if !self.bound(abstract_id) {
            self.scoped(abstract_id, concrete)?;
        }
        Ok(())
    }

    /// "Extend" an abstract type: decorate the cached instance immediately,
    /// or queue the closure to run on each future resolution.
    pub fn extend(
        &self,
        abstract_id: &str,
        closure: impl Fn(Instance, &Container) -> Instance + Send + Sync + 'static,
    ) -> Result<(), Error> {
        let abstract_id = self.get_alias(abstract_id);

        let existing = self.state.instances.read().get(&abstract_id).cloned();
        if let Some(existing) = existing {
            let replaced = closure(existing, self);
            self.state
                .instances
                .write()
                .insert(abstract_id.clone(), replaced);
            self.rebound(&abstract_id)?;
        } else {
            self.state
                .extenders
                .write()
                .entry(abstract_id.clone())
                .or_default()
                .push(Arc::new(closure));
            if self.resolved(&abstract_id) {
                self.rebound(&abstract_id)?;
            }
        }
        Ok(())
    }

    /// Register an existing instance as shared, bypassing factories. Returns
    /// the instance for chaining.
    pub fn instance(&self, abstract_id: &str, instance: Instance) -> Result<Instance, Error> {
        self.remove_abstract_alias(abstract_id);

        let was_bound = self.bound(abstract_id);
        self.state.aliases.write().remove(abstract_id);
        self.state
            .instances
            .write()
            .insert(abstract_id.to_string(), instance.clone());
        debug!(id = %abstract_id, "Instance registered");

        if was_bound {
            self.rebound(abstract_id)?;
        }
        Ok(instance)
    }

    /// Open a contextual binding: `when("Consumer").needs("Dep").give(...)`.
    pub fn when(&self, concrete: &str) -> ContextualBindingBuilder {
        ContextualBindingBuilder::new(self.clone(), vec![self.get_alias(concrete)])
    }

    /// Contextual binding for several consumers at once.
    pub fn when_each(&self, concretes: &[&str]) -> ContextualBindingBuilder {
        let concretes = concretes
            .iter()
            .map(|concrete| self.get_alias(concrete))
            .collect();
        ContextualBindingBuilder::new(self.clone(), concretes)
    }

    /// Record a contextual implementation for `(consumer, dependency)`.
    pub fn add_contextual_binding(
        &self,
        concrete: &str,
        abstract_id: &str,
        implementation: ContextualImpl,
    ) {
        debug!(consumer = %concrete, id = %abstract_id, "Contextual binding registered");
        self.state
            .contextual
            .write()
            .entry(concrete.to_string())
            .or_default()
            .insert(self.get_alias(abstract_id), implementation);
    }

    /// Register a rebinding callback; when the abstract is already bound, the
    /// current instance is resolved and returned.
    pub fn rebinding(
        &self,
        abstract_id: &str,
        callback: impl Fn(&Container, Instance) + Send + Sync + 'static,
    ) -> Result<Option<Instance>, Error> {
        let abstract_id = self.get_alias(abstract_id);
        self.state
            .rebound
            .write()
            .entry(abstract_id.clone())
            .or_default()
            .push(Arc::new(callback));

        if self.bound(&abstract_id) {
            return Ok(Some(self.make(&abstract_id)?));
        }
        Ok(None)
    }

    /// Fire the rebinding callbacks for an abstract with a fresh instance.
    pub(crate) fn rebound(&self, abstract_id: &str) -> Result<(), Error> {
        let callbacks = self
            .state
            .rebound
            .read()
            .get(abstract_id)
            .cloned()
            .unwrap_or_default();
        if callbacks.is_empty() {
            // Nothing to notify; skip the fresh resolution entirely.
            return Ok(());
        }

        debug!(id = %abstract_id, "Firing rebinding callbacks");
        let instance = self.make(abstract_id)?;
        for callback in callbacks {
            callback(self, instance.clone());
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Keyed-value sugar
    // ---------------------------------------------------------------

    /// Store a plain value under a key; equivalent to binding a factory that
    /// returns the value.
    pub fn set(&self, key: &str, value: Instance) -> Result<(), Error> {
        self.bind(
            key,
            Some(Concrete::factory(move |_, _| Ok(value.clone()))),
            false,
        )
    }

    /// Drop the binding, cached instance, and resolved flag for a key.
    pub fn remove(&self, key: &str) {
        self.state.bindings.write().remove(key);
        self.state.instances.write().remove(key);
        self.state.resolved.write().remove(key);
    }

    /// Existence check mirroring [`Container::set`]; same as `bound`.
    pub fn contains(&self, key: &str) -> bool {
        self.bound(key)
    }

    // ---------------------------------------------------------------
    // Eviction and teardown
    // ---------------------------------------------------------------

    /// Remove all extender callbacks for a type.
    pub fn forget_extenders(&self, abstract_id: &str) {
        let abstract_id = self.get_alias(abstract_id);
        self.state.extenders.write().remove(&abstract_id);
    }

    /// Remove a resolved instance from the instance cache.
    pub fn forget_instance(&self, abstract_id: &str) {
        self.state.instances.write().remove(abstract_id);
    }

    /// Clear the entire instance cache.
    pub fn forget_instances(&self) {
        let count = {
            let mut instances = self.state.instances.write();
            let count = instances.len();
            instances.clear();
            count
        };
        debug!(instance_count = count, "Cleared all cached instances");
    }

    /// Evict every scoped instance; hosts call this at scope boundaries such
    /// as the end of a request.
    pub fn forget_scoped_instances(&self) {
        let scoped = self.state.scoped_instances.read().clone();
        debug!(scoped_count = scoped.len(), "Evicting scoped instances");
        let mut instances = self.state.instances.write();
        for abstract_id in scoped {
            instances.remove(&abstract_id);
        }
    }

    /// Flush all bindings, instances, aliases, and resolved flags.
    ///
    /// Contextual bindings, extenders, tags, and callbacks survive a flush.
    pub fn flush(&self) {
        debug!("Flushing container");
        self.state.aliases.write().clear();
        self.state.resolved.write().clear();
        self.state.bindings.write().clear();
        self.state.instances.write().clear();
        self.state.abstract_aliases.write().clear();
        self.state.scoped_instances.write().clear();
    }

    // ---------------------------------------------------------------
    // Internals shared with the resolver
    // ---------------------------------------------------------------

    /// Wrap a bare identifier concrete into a build closure.
    fn build_closure(&self, abstract_id: &str, concrete: &str) -> Factory {
        let abstract_id = abstract_id.to_string();
        let concrete = concrete.to_string();
        Arc::new(move |container: &Container, parameters: &Overrides| {
            if abstract_id == concrete {
                container.build_type(&concrete)
            } else {
                container.resolve(&concrete, parameters.clone(), false)
            }
        })
    }

    fn drop_stale_instances(&self, abstract_id: &str) {
        self.state.instances.write().remove(abstract_id);
        self.state.aliases.write().remove(abstract_id);
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.state.bindings.read().len())
            .field("instances", &self.state.instances.read().len())
            .field("aliases", &self.state.aliases.read().len())
            .finish()
    }
}
