//! The method invoker: `call("Type@method")` with dependency injection.
//!
//! Method calls resolve their declared parameters through the same
//! per-parameter algorithm as constructor injection, with the caller's
//! overrides as the active frame. The target class joins the build stack for
//! the duration of the call (unless already present), so contextual bindings
//! registered against the class apply to method calls exactly as they do to
//! construction.

use tracing::{debug, trace};

use crate::registry::method_key;
use crate::{Container, Error, Instance, Overrides};

/// A deferred resolution or invocation thunk.
pub type Thunk = Box<dyn Fn() -> Result<Instance, Error> + Send + Sync>;

impl Container {
    /// Call a `"Type@method"` target (or a `"Type"` target with
    /// `default_method`), injecting its declared parameters.
    pub fn call(
        &self,
        target: &str,
        parameters: Overrides,
        default_method: Option<&str>,
    ) -> Result<Instance, Error> {
        let (class, method) = parse_callable(target, default_method)?;
        self.call_class_method(class, method, parameters)
    }

    /// Pre-register a callback for a `"Type@method"` key, short-circuiting
    /// descriptor dispatch. The callback receives the resolved receiver and
    /// the container.
    pub fn bind_method(
        &self,
        class: &str,
        method: &str,
        callback: impl Fn(Instance, &Container) -> Result<Instance, Error> + Send + Sync + 'static,
    ) {
        let key = method_key(class, method);
        debug!(method = %key, "Method binding registered");
        self.state
            .method_bindings
            .write()
            .insert(key, std::sync::Arc::new(callback));
    }

    /// Whether a `"Type@method"` key has a method binding.
    pub fn has_method_binding(&self, method: &str) -> bool {
        self.state.method_bindings.read().contains_key(method)
    }

    /// Invoke the method binding registered under a `"Type@method"` key with
    /// the given target instance.
    pub fn call_method_binding(&self, method: &str, instance: Instance) -> Result<Instance, Error> {
        let binding = self
            .state
            .method_bindings
            .read()
            .get(method)
            .cloned()
            .ok_or_else(|| Error::MethodNotFound {
                method: method.to_string(),
            })?;
        binding(instance, self)
    }

    /// Wrap a call target so its dependencies are injected when the returned
    /// thunk executes.
    pub fn wrap(&self, target: &str, parameters: Overrides) -> Thunk {
        let container = self.clone();
        let target = target.to_string();
        Box::new(move || container.call(&target, parameters.clone(), None))
    }

    /// A zero-argument thunk resolving the given identifier.
    pub fn factory(&self, abstract_id: &str) -> Thunk {
        let container = self.clone();
        let abstract_id = abstract_id.to_string();
        Box::new(move || container.make(&abstract_id))
    }

    fn call_class_method(
        &self,
        class: &str,
        method: &str,
        parameters: Overrides,
    ) -> Result<Instance, Error> {
        let key = method_key(class, method);

        let binding = self.state.method_bindings.read().get(&key).cloned();
        if let Some(binding) = binding {
            trace!(method = %key, "Calling method binding");
            let receiver = self.make(class)?;
            let pushed = self.push_calling_class(class);
            let result = binding(receiver, self);
            if pushed {
                self.state.build_stack.write().pop();
            }
            return result;
        }

        let Some(descriptor) = self.introspector().describe_method(class, method) else {
            return Err(Error::MethodNotFound { method: key });
        };

        // The receiver is resolved before the class joins the build stack so
        // its own construction is an ordinary `make`.
        let receiver = if descriptor.is_static() {
            None
        } else {
            Some(self.make(class)?)
        };

        trace!(method = %key, "Calling described method");
        let pushed = self.push_calling_class(class);
        self.push_override_frame(parameters);
        let dependencies = self.resolve_dependencies(descriptor.parameters(), &key);
        self.pop_override_frame();
        if pushed {
            self.state.build_stack.write().pop();
        }

        descriptor.invoke(receiver, dependencies?)
    }

    /// Put the called class on the build stack for the duration of the call,
    /// unless it is already there.
    fn push_calling_class(&self, class: &str) -> bool {
        let mut stack = self.state.build_stack.write();
        if stack.iter().any(|entry| entry == class) {
            false
        } else {
            stack.push(class.to_string());
            true
        }
    }
}

fn parse_callable<'a>(
    target: &'a str,
    default_method: Option<&'a str>,
) -> Result<(&'a str, &'a str), Error> {
    let (class, method) = match target.split_once('@') {
        Some((class, method)) => (class, Some(method).filter(|m| !m.is_empty())),
        None => (target, None),
    };
    match method.or(default_method) {
        Some(method) => Ok((class, method)),
        None => Err(Error::MethodNotProvided {
            target: target.to_string(),
        }),
    }
}
