//! Value model for the container: opaque instances, factory recipes, and the
//! tagged unions used for concretes and contextual implementations.
//!
//! Services resolved by the container are held as [`Instance`] values, a
//! shared, type-erased handle. Typed access goes through [`downcast`] or
//! [`Container::make_as`].
//!
//! [`Container::make_as`]: crate::Container::make_as

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{Container, Error};

/// A realized service held by the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A construction recipe: receives the container and the caller's parameter
/// overrides, returns a fresh instance.
pub type Factory =
    Arc<dyn Fn(&Container, &Overrides) -> Result<Instance, Error> + Send + Sync>;

/// Wrap a concrete value into an [`Instance`].
pub fn to_instance<T: Any + Send + Sync>(value: T) -> Instance {
    Arc::new(value)
}

/// Downcast an instance to a concrete type.
pub fn downcast<T: Any + Send + Sync>(instance: &Instance) -> Option<Arc<T>> {
    Arc::clone(instance).downcast::<T>().ok()
}

/// Downcast a positional constructor argument, failing with a descriptive
/// error. Intended for use inside registered constructors and method handlers.
pub fn arg<T: Any + Send + Sync>(args: &[Instance], index: usize) -> Result<Arc<T>, Error> {
    args.get(index)
        .and_then(|instance| downcast::<T>(instance))
        .ok_or_else(|| Error::Downcast {
            id: format!("argument #{index}"),
            expected: std::any::type_name::<T>().to_string(),
        })
}

/// What a binding points at: another identifier, or a factory closure.
#[derive(Clone)]
pub enum Concrete {
    /// Build the named type through the introspector (or its own binding).
    Identifier(String),
    /// The factory owns its own construction logic.
    Factory(Factory),
}

impl Concrete {
    /// A factory concrete from a plain closure.
    pub fn factory(
        factory: impl Fn(&Container, &Overrides) -> Result<Instance, Error> + Send + Sync + 'static,
    ) -> Self {
        Concrete::Factory(Arc::new(factory))
    }
}

impl From<&str> for Concrete {
    fn from(identifier: &str) -> Self {
        Concrete::Identifier(identifier.to_string())
    }
}

impl From<String> for Concrete {
    fn from(identifier: String) -> Self {
        Concrete::Identifier(identifier)
    }
}

impl fmt::Debug for Concrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concrete::Identifier(id) => f.debug_tuple("Identifier").field(id).finish(),
            Concrete::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// The implementation side of a contextual binding.
#[derive(Clone)]
pub enum ContextualImpl {
    /// Resolve the named identifier.
    Identifier(String),
    /// Invoke the factory.
    Factory(Factory),
    /// Inject the value as-is.
    Value(Instance),
    /// Resolve every entry; feeds variadic dependencies, or is injected as a
    /// `Vec<Instance>` collection elsewhere.
    Sequence(Vec<ContextualImpl>),
}

impl ContextualImpl {
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        ContextualImpl::Value(to_instance(value))
    }

    pub fn instance(instance: Instance) -> Self {
        ContextualImpl::Value(instance)
    }

    pub fn factory(
        factory: impl Fn(&Container, &Overrides) -> Result<Instance, Error> + Send + Sync + 'static,
    ) -> Self {
        ContextualImpl::Factory(Arc::new(factory))
    }

    pub fn sequence(entries: impl IntoIterator<Item = ContextualImpl>) -> Self {
        ContextualImpl::Sequence(entries.into_iter().collect())
    }
}

impl From<&str> for ContextualImpl {
    fn from(identifier: &str) -> Self {
        ContextualImpl::Identifier(identifier.to_string())
    }
}

impl From<String> for ContextualImpl {
    fn from(identifier: String) -> Self {
        ContextualImpl::Identifier(identifier)
    }
}

impl fmt::Debug for ContextualImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextualImpl::Identifier(id) => f.debug_tuple("Identifier").field(id).finish(),
            ContextualImpl::Factory(_) => f.write_str("Factory(..)"),
            ContextualImpl::Value(_) => f.write_str("Value(..)"),
            ContextualImpl::Sequence(entries) => {
                f.debug_tuple("Sequence").field(&entries.len()).finish()
            }
        }
    }
}

/// A registered binding: the wrapped factory plus its lifetime flag.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) concrete: Factory,
    pub(crate) shared: bool,
}

/// Named parameter overrides for a single `make`/`call` invocation.
///
/// Override values are matched by parameter name and used verbatim, skipping
/// contextual bindings and recursive resolution for that parameter.
#[derive(Clone, Default)]
pub struct Overrides {
    values: HashMap<String, Instance>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typed override value.
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.values.insert(name.into(), to_instance(value));
        self
    }

    /// Add an already-erased override value.
    pub fn with_instance(mut self, name: impl Into<String>, instance: Instance) -> Self {
        self.values.insert(name.into(), instance);
        self
    }

    pub fn get(&self, name: &str) -> Option<Instance> {
        self.values.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Overrides").field("names", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_round_trip() {
        let instance = to_instance(42_u32);
        assert_eq!(*downcast::<u32>(&instance).unwrap(), 42);
        assert!(downcast::<String>(&instance).is_none());
    }

    #[test]
    fn test_arg_reports_index_and_type() {
        let args = vec![to_instance("hello".to_string())];
        assert_eq!(*arg::<String>(&args, 0).unwrap(), "hello");

        let error = arg::<u32>(&args, 0).unwrap_err();
        assert!(matches!(error, Error::Downcast { .. }));
        let error = arg::<String>(&args, 1).unwrap_err();
        assert!(error.to_string().contains("argument #1"));
    }

    #[test]
    fn test_overrides_builder() {
        let overrides = Overrides::new()
            .with("name", "cask".to_string())
            .with("port", 8080_u16);
        assert_eq!(overrides.len(), 2);
        assert!(overrides.contains("name"));
        assert!(!overrides.contains("host"));
        let port = overrides.get("port").unwrap();
        assert_eq!(*downcast::<u16>(&port).unwrap(), 8080);
    }

    #[test]
    fn test_concrete_from_identifier() {
        let concrete = Concrete::from("Logger");
        assert!(matches!(concrete, Concrete::Identifier(ref id) if id == "Logger"));
    }
}
