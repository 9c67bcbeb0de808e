//! Resolution lifecycle callbacks.
//!
//! Three firing points surround every fresh build: **before** (prior to any
//! construction), **resolving** (immediately after the object is built), and
//! **after** (immediately following the resolving callbacks). Each point has
//! a global list plus per-type lists; per-type lists also fire for types the
//! resolved abstract declares via [`TypeDescriptor::implements`]. Cache hits
//! fire nothing.
//!
//! Callbacks run synchronously in registration order and are not isolated: a
//! panicking callback unwinds out of `make`.
//!
//! [`TypeDescriptor::implements`]: crate::TypeDescriptor::implements

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::{Container, Instance, Overrides};

/// Fired before resolution starts: `(abstract, parameters, container)`.
pub type BeforeCallback = Arc<dyn Fn(&str, &Overrides, &Container) + Send + Sync>;

/// Fired with a freshly built object: `(object, container)`.
pub type ResolvingCallback = Arc<dyn Fn(&Instance, &Container) + Send + Sync>;

/// Per-type callback lists keep first-registration order for their type keys,
/// so firing order is deterministic across types as well as within one.
type TypedCallbacks<T> = Vec<(String, Vec<T>)>;

#[derive(Default)]
pub(crate) struct Hooks {
    global_before: RwLock<Vec<BeforeCallback>>,
    global_resolving: RwLock<Vec<ResolvingCallback>>,
    global_after: RwLock<Vec<ResolvingCallback>>,
    before: RwLock<TypedCallbacks<BeforeCallback>>,
    resolving: RwLock<TypedCallbacks<ResolvingCallback>>,
    after: RwLock<TypedCallbacks<ResolvingCallback>>,
}

fn push_typed<T>(list: &RwLock<TypedCallbacks<T>>, type_id: String, callback: T) {
    let mut list = list.write();
    if let Some((_, callbacks)) = list.iter_mut().find(|(existing, _)| *existing == type_id) {
        callbacks.push(callback);
    } else {
        list.push((type_id, vec![callback]));
    }
}

impl Container {
    // ---------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------

    /// Register a before-resolving callback for a specific type.
    pub fn before_resolving(
        &self,
        abstract_id: &str,
        callback: impl Fn(&str, &Overrides, &Container) + Send + Sync + 'static,
    ) {
        let abstract_id = self.get_alias(abstract_id);
        push_typed(&self.state.hooks.before, abstract_id, Arc::new(callback));
    }

    /// Register a before-resolving callback for all types.
    pub fn before_resolving_any(
        &self,
        callback: impl Fn(&str, &Overrides, &Container) + Send + Sync + 'static,
    ) {
        self.state.hooks.global_before.write().push(Arc::new(callback));
    }

    /// Register a resolving callback for a specific type.
    pub fn resolving(
        &self,
        abstract_id: &str,
        callback: impl Fn(&Instance, &Container) + Send + Sync + 'static,
    ) {
        let abstract_id = self.get_alias(abstract_id);
        push_typed(&self.state.hooks.resolving, abstract_id, Arc::new(callback));
    }

    /// Register a resolving callback for all types.
    pub fn resolving_any(
        &self,
        callback: impl Fn(&Instance, &Container) + Send + Sync + 'static,
    ) {
        self.state
            .hooks
            .global_resolving
            .write()
            .push(Arc::new(callback));
    }

    /// Register an after-resolving callback for a specific type.
    pub fn after_resolving(
        &self,
        abstract_id: &str,
        callback: impl Fn(&Instance, &Container) + Send + Sync + 'static,
    ) {
        let abstract_id = self.get_alias(abstract_id);
        push_typed(&self.state.hooks.after, abstract_id, Arc::new(callback));
    }

    /// Register an after-resolving callback for all types.
    pub fn after_resolving_any(
        &self,
        callback: impl Fn(&Instance, &Container) + Send + Sync + 'static,
    ) {
        self.state.hooks.global_after.write().push(Arc::new(callback));
    }

    // ---------------------------------------------------------------
    // Firing
    // ---------------------------------------------------------------

    pub(crate) fn fire_before_resolving(&self, abstract_id: &str, parameters: &Overrides) {
        let global = self.state.hooks.global_before.read().clone();
        for callback in global {
            callback(abstract_id, parameters, self);
        }

        let typed = self.state.hooks.before.read().clone();
        for (type_id, callbacks) in typed {
            if self.type_matches(abstract_id, &type_id) {
                for callback in callbacks {
                    callback(abstract_id, parameters, self);
                }
            }
        }
    }

    pub(crate) fn fire_resolving_callbacks(&self, abstract_id: &str, object: &Instance) {
        trace!(id = %abstract_id, "Firing resolving callbacks");
        let global = self.state.hooks.global_resolving.read().clone();
        for callback in global {
            callback(object, self);
        }
        for callback in self.callbacks_for_type(abstract_id, &self.state.hooks.resolving) {
            callback(object, self);
        }

        self.fire_after_resolving(abstract_id, object);
    }

    fn fire_after_resolving(&self, abstract_id: &str, object: &Instance) {
        let global = self.state.hooks.global_after.read().clone();
        for callback in global {
            callback(object, self);
        }
        for callback in self.callbacks_for_type(abstract_id, &self.state.hooks.after) {
            callback(object, self);
        }
    }

    fn callbacks_for_type(
        &self,
        abstract_id: &str,
        list: &RwLock<TypedCallbacks<ResolvingCallback>>,
    ) -> Vec<ResolvingCallback> {
        let typed = list.read().clone();
        let mut matched = Vec::new();
        for (type_id, callbacks) in typed {
            if self.type_matches(abstract_id, &type_id) {
                matched.extend(callbacks);
            }
        }
        matched
    }

    /// Exact identifier match, or a declared-interface match through the
    /// abstract's type descriptor.
    fn type_matches(&self, abstract_id: &str, type_id: &str) -> bool {
        if abstract_id == type_id {
            return true;
        }
        self.introspector()
            .describe(abstract_id)
            .is_some_and(|descriptor| descriptor.implements_type(type_id))
    }
}
