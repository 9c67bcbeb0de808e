//! The dependency resolver: recursive construction of object graphs.
//!
//! Resolution walks from an abstract identifier to a concrete recipe, builds
//! constructor dependencies recursively, applies contextual overrides keyed by
//! whoever is currently being built, detects construction cycles through the
//! build stack, and fires resolution callbacks around each fresh build.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::{Concrete, Container, ContextualImpl, Error, Instance, Overrides, downcast,
    to_instance};
use crate::registry::ParameterDescriptor;

/// Outcome of resolving one constructor parameter: a single argument, or a
/// flattened variadic tail.
pub(crate) enum Resolved {
    One(Instance),
    Many(Vec<Instance>),
}

impl Container {
    /// Resolve the given identifier from the container.
    pub fn make(&self, abstract_id: &str) -> Result<Instance, Error> {
        self.resolve(abstract_id, Overrides::new(), true)
    }

    /// Resolve with explicit parameter overrides for this invocation only.
    pub fn make_with(&self, abstract_id: &str, parameters: Overrides) -> Result<Instance, Error> {
        self.resolve(abstract_id, parameters, true)
    }

    /// Resolve and downcast to a concrete type.
    pub fn make_as<T: Any + Send + Sync>(&self, abstract_id: &str) -> Result<Arc<T>, Error> {
        let instance = self.make(abstract_id)?;
        downcast::<T>(&instance).ok_or_else(|| Error::Downcast {
            id: abstract_id.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
    }

    /// Lookup-service entry point. Construction failures for bound
    /// identifiers propagate unchanged; only genuinely unbound identifiers
    /// are converted into [`Error::NotFound`].
    pub fn get(&self, id: &str) -> Result<Instance, Error> {
        match self.make(id) {
            Ok(instance) => Ok(instance),
            Err(error) => {
                if self.has(id) || matches!(error, Error::CircularDependency { .. }) {
                    return Err(error);
                }
                Err(Error::NotFound { id: id.to_string() })
            }
        }
    }

    pub(crate) fn resolve(
        &self,
        abstract_id: &str,
        parameters: Overrides,
        raise_events: bool,
    ) -> Result<Instance, Error> {
        let abstract_id = self.get_alias(abstract_id);

        if raise_events {
            self.fire_before_resolving(&abstract_id, &parameters);
        }

        let contextual = self.contextual_concrete(&abstract_id);
        let needs_contextual_build = !parameters.is_empty() || contextual.is_some();

        // A managed singleton short-circuits everything unless this build is
        // contextual; cache hits fire no resolving callbacks.
        if !needs_contextual_build {
            if let Some(existing) = self.state.instances.read().get(&abstract_id).cloned() {
                trace!(id = %abstract_id, "Resolved from instance cache");
                return Ok(existing);
            }
        }

        self.push_override_frame(parameters);
        let result =
            self.resolve_concrete(&abstract_id, contextual, needs_contextual_build, raise_events);
        self.pop_override_frame();
        result
    }

    fn resolve_concrete(
        &self,
        abstract_id: &str,
        contextual: Option<ContextualImpl>,
        needs_contextual_build: bool,
        raise_events: bool,
    ) -> Result<Instance, Error> {
        let mut object = match contextual {
            Some(implementation) => self.build_implementation(&implementation, abstract_id)?,
            None => match self.concrete_of(abstract_id) {
                Concrete::Factory(factory) => self.build_factory(&factory)?,
                Concrete::Identifier(concrete) if concrete == abstract_id => {
                    self.build_type(&concrete)?
                }
                Concrete::Identifier(concrete) => self.make(&concrete)?,
            },
        };

        for extender in self.extenders_of(abstract_id) {
            object = extender(object, self);
        }

        if self.is_shared(abstract_id) && !needs_contextual_build {
            self.state
                .instances
                .write()
                .insert(abstract_id.to_string(), object.clone());
        }

        if raise_events {
            self.fire_resolving_callbacks(abstract_id, &object);
        }

        self.state.resolved.write().insert(abstract_id.to_string());
        trace!(id = %abstract_id, "Resolved");
        Ok(object)
    }

    /// Instantiate a described type, resolving its constructor dependencies.
    pub(crate) fn build_type(&self, concrete: &str) -> Result<Instance, Error> {
        let introspector = self.introspector();
        let Some(descriptor) = introspector.describe(concrete) else {
            return Err(Error::DescriptorNotFound {
                concrete: concrete.to_string(),
            });
        };

        if !descriptor.is_instantiable() {
            return Err(Error::NotInstantiable {
                concrete: concrete.to_string(),
                build_stack: self.state.build_stack.read().to_vec(),
            });
        }

        {
            let mut stack = self.state.build_stack.write();
            if stack.iter().any(|entry| entry == concrete) {
                return Err(Error::CircularDependency {
                    concrete: concrete.to_string(),
                    chain: stack.to_vec(),
                });
            }
            stack.push(concrete.to_string());
        }
        debug!(concrete = %concrete, "Building");

        if descriptor.parameters().is_empty() {
            self.state.build_stack.write().pop();
            return descriptor.instantiate(Vec::new());
        }

        let dependencies = self.resolve_dependencies(descriptor.parameters(), concrete);
        self.state.build_stack.write().pop();

        descriptor.instantiate(dependencies?)
    }

    fn build_factory(&self, factory: &crate::Factory) -> Result<Instance, Error> {
        let frame = self.current_override_frame();
        factory(self, &frame)
    }

    fn build_implementation(
        &self,
        implementation: &ContextualImpl,
        abstract_id: &str,
    ) -> Result<Instance, Error> {
        match implementation {
            ContextualImpl::Factory(factory) => self.build_factory(factory),
            ContextualImpl::Value(value) => Ok(value.clone()),
            ContextualImpl::Identifier(concrete) if concrete == abstract_id => {
                self.build_type(concrete)
            }
            ContextualImpl::Identifier(concrete) => self.make(concrete),
            ContextualImpl::Sequence(entries) => {
                let mut resolved = Vec::with_capacity(entries.len());
                for entry in entries {
                    resolved.push(self.resolve_implementation_entry(entry)?);
                }
                Ok(to_instance(resolved))
            }
        }
    }

    fn resolve_implementation_entry(&self, entry: &ContextualImpl) -> Result<Instance, Error> {
        match entry {
            ContextualImpl::Identifier(id) => self.make(id),
            ContextualImpl::Factory(factory) => self.build_factory(factory),
            ContextualImpl::Value(value) => Ok(value.clone()),
            ContextualImpl::Sequence(entries) => {
                let mut resolved = Vec::with_capacity(entries.len());
                for entry in entries {
                    resolved.push(self.resolve_implementation_entry(entry)?);
                }
                Ok(to_instance(resolved))
            }
        }
    }

    /// Resolve each declared parameter into positional arguments.
    pub(crate) fn resolve_dependencies(
        &self,
        parameters: &[ParameterDescriptor],
        declared_in: &str,
    ) -> Result<Vec<Instance>, Error> {
        let mut results = Vec::with_capacity(parameters.len());

        for parameter in parameters {
            // An explicit override wins outright, class-typed or not.
            if let Some(value) = self.parameter_override(parameter.name()) {
                results.push(value);
                continue;
            }

            let resolved = match parameter.class_name() {
                None => self.resolve_primitive(parameter, declared_in)?,
                Some(class) => self.resolve_class(parameter, class)?,
            };
            match resolved {
                Resolved::One(value) => results.push(value),
                Resolved::Many(values) => results.extend(values),
            }
        }

        Ok(results)
    }

    fn resolve_primitive(
        &self,
        parameter: &ParameterDescriptor,
        declared_in: &str,
    ) -> Result<Resolved, Error> {
        if let Some(implementation) = self.contextual_concrete(&format!("${}", parameter.name())) {
            return Ok(Resolved::One(self.unwrap_primitive(&implementation)?));
        }

        if let Some(default) = parameter.resolve_default() {
            return Ok(Resolved::One(default));
        }

        if parameter.is_variadic() {
            return Ok(Resolved::Many(Vec::new()));
        }

        Err(Error::UnresolvablePrimitive {
            parameter: parameter.name().to_string(),
            declared_in: declared_in.to_string(),
        })
    }

    /// Contextual primitives may be factories (invoked with the container),
    /// literal values, raw identifier strings, or sequences thereof.
    fn unwrap_primitive(&self, implementation: &ContextualImpl) -> Result<Instance, Error> {
        match implementation {
            ContextualImpl::Factory(factory) => factory(self, &Overrides::new()),
            ContextualImpl::Value(value) => Ok(value.clone()),
            ContextualImpl::Identifier(literal) => Ok(to_instance(literal.clone())),
            ContextualImpl::Sequence(entries) => {
                let mut resolved = Vec::with_capacity(entries.len());
                for entry in entries {
                    resolved.push(self.unwrap_primitive(entry)?);
                }
                Ok(to_instance(resolved))
            }
        }
    }

    fn resolve_class(
        &self,
        parameter: &ParameterDescriptor,
        class: &str,
    ) -> Result<Resolved, Error> {
        let attempt = if parameter.is_variadic() {
            self.resolve_variadic_class(class)
        } else {
            self.make(class).map(Resolved::One)
        };

        match attempt {
            Ok(resolved) => Ok(resolved),
            // A failed binding resolution falls back to the declared default
            // (or an empty variadic tail); other error kinds propagate.
            Err(error) if error.is_resolution_failure() => {
                if let Some(default) = parameter.resolve_default() {
                    return Ok(Resolved::One(default));
                }
                if parameter.is_variadic() {
                    return Ok(Resolved::Many(Vec::new()));
                }
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// A variadic class dependency resolves a sequence-valued contextual
    /// binding entry by entry. With no sequence registered it falls back to a
    /// single ordinary `make` of the type, passed as one argument.
    fn resolve_variadic_class(&self, class: &str) -> Result<Resolved, Error> {
        let abstract_id = self.get_alias(class);

        match self.contextual_concrete(&abstract_id) {
            Some(ContextualImpl::Sequence(entries)) => {
                let mut resolved = Vec::with_capacity(entries.len());
                for entry in &entries {
                    resolved.push(self.resolve_implementation_entry(entry)?);
                }
                Ok(Resolved::Many(resolved))
            }
            _ => Ok(Resolved::One(self.make(class)?)),
        }
    }

    // ---------------------------------------------------------------
    // Contextual lookups
    // ---------------------------------------------------------------

    /// The contextual implementation for an abstract, relative to whoever is
    /// currently being built; falls back to bindings registered under any
    /// alias of the abstract.
    pub(crate) fn contextual_concrete(&self, abstract_id: &str) -> Option<ContextualImpl> {
        if let Some(binding) = self.find_in_contextual_bindings(abstract_id) {
            return Some(binding);
        }

        let aliases = self
            .state
            .abstract_aliases
            .read()
            .get(abstract_id)
            .cloned()?;
        for alias in aliases {
            if let Some(binding) = self.find_in_contextual_bindings(&alias) {
                return Some(binding);
            }
        }
        None
    }

    fn find_in_contextual_bindings(&self, abstract_id: &str) -> Option<ContextualImpl> {
        let consumer = self.state.build_stack.read().last().cloned()?;
        self.state
            .contextual
            .read()
            .get(&consumer)?
            .get(abstract_id)
            .cloned()
    }

    fn concrete_of(&self, abstract_id: &str) -> Concrete {
        match self.state.bindings.read().get(abstract_id) {
            Some(binding) => Concrete::Factory(binding.concrete.clone()),
            None => Concrete::Identifier(abstract_id.to_string()),
        }
    }

    fn extenders_of(&self, abstract_id: &str) -> Vec<crate::container::Extender> {
        self.state
            .extenders
            .read()
            .get(abstract_id)
            .cloned()
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Override stack
    // ---------------------------------------------------------------

    pub(crate) fn push_override_frame(&self, parameters: Overrides) {
        self.state.overrides.write().push(parameters);
    }

    pub(crate) fn pop_override_frame(&self) {
        self.state.overrides.write().pop();
    }

    pub(crate) fn current_override_frame(&self) -> Overrides {
        self.state.overrides.read().last().cloned().unwrap_or_default()
    }

    fn parameter_override(&self, name: &str) -> Option<Instance> {
        self.state
            .overrides
            .read()
            .last()
            .and_then(|frame| frame.get(name))
    }

    #[cfg(test)]
    pub(crate) fn build_stack_depth(&self) -> usize {
        self.state.build_stack.read().len()
    }

    #[cfg(test)]
    pub(crate) fn override_stack_depth(&self) -> usize {
        self.state.overrides.read().len()
    }
}
