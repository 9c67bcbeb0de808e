//! Type introspection through an explicit descriptor registry.
//!
//! The container does not reflect over Rust types at runtime. Instead, hosts
//! describe each constructable type up front: its ordered constructor
//! parameters, the interfaces it implements, and a closure that performs the
//! actual positional instantiation. The [`DescriptorRegistry`] is the default
//! [`TypeIntrospector`]; anything satisfying the trait can stand in for it.
//!
//! ## Describing a type
//!
//! ```
//! use cask_core::{DescriptorRegistry, ParameterDescriptor, TypeDescriptor, arg, to_instance};
//!
//! struct FileLogger {
//!     path: String,
//! }
//!
//! let registry = DescriptorRegistry::new();
//! registry.register(
//!     TypeDescriptor::new("FileLogger")
//!         .implements("Logger")
//!         .parameter(ParameterDescriptor::primitive("path").default_value("app.log".to_string()))
//!         .constructor(|args| {
//!             let path = arg::<String>(&args, 0)?;
//!             Ok(to_instance(FileLogger {
//!                 path: (*path).clone(),
//!             }))
//!         }),
//! );
//! assert!(registry.contains("FileLogger"));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Error, Instance, to_instance};

/// Positional constructor for a described type. Variadic tails arrive
/// flattened into the argument list.
pub type Constructor = Arc<dyn Fn(Vec<Instance>) -> Result<Instance, Error> + Send + Sync>;

/// Producer for a parameter's declared default value.
pub type DefaultValue = Arc<dyn Fn() -> Instance + Send + Sync>;

/// Invoker for a described method: receiver (absent for static methods) plus
/// resolved positional arguments.
pub type MethodInvoke =
    Arc<dyn Fn(Option<Instance>, Vec<Instance>) -> Result<Instance, Error> + Send + Sync>;

/// The `"Type@method"` key format shared by method descriptors and method
/// bindings.
pub fn method_key(class: &str, method: &str) -> String {
    format!("{class}@{method}")
}

/// One constructor (or method) parameter: name, declared class-like type if
/// any, optional default, variadic flag.
#[derive(Clone)]
pub struct ParameterDescriptor {
    name: String,
    class: Option<String>,
    default: Option<DefaultValue>,
    variadic: bool,
}

impl ParameterDescriptor {
    /// A parameter with a declared class-like type, resolved recursively.
    pub fn class(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: Some(class.into()),
            default: None,
            variadic: false,
        }
    }

    /// A primitive (scalar/untyped) parameter, resolved from overrides,
    /// contextual `$name` bindings, or its default.
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: None,
            default: None,
            variadic: false,
        }
    }

    /// Declare a default value, cloned on each use.
    pub fn default_value<T: Any + Clone + Send + Sync>(mut self, value: T) -> Self {
        self.default = Some(Arc::new(move || to_instance(value.clone())));
        self
    }

    /// Declare a default produced lazily by a closure.
    pub fn default_with(mut self, producer: impl Fn() -> Instance + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(producer));
        self
    }

    /// Mark the parameter as variadic.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn resolve_default(&self) -> Option<Instance> {
        self.default.as_ref().map(|producer| producer())
    }
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("variadic", &self.variadic)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Everything the resolver needs to know about one constructable type.
#[derive(Clone)]
pub struct TypeDescriptor {
    id: String,
    parameters: Vec<ParameterDescriptor>,
    interfaces: Vec<String>,
    instantiable: bool,
    constructor: Option<Constructor>,
}

impl TypeDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parameters: Vec::new(),
            interfaces: Vec::new(),
            instantiable: true,
            constructor: None,
        }
    }

    /// Append a constructor parameter. Order matters: arguments are passed
    /// positionally to the constructor closure.
    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declare an interface (or supertype) identifier this type implements.
    /// Drives subtype matching for resolution callbacks.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Mark the type as an interface or abstract type that cannot be built
    /// directly.
    pub fn abstract_only(mut self) -> Self {
        self.instantiable = false;
        self
    }

    pub fn constructor(
        mut self,
        constructor: impl Fn(Vec<Instance>) -> Result<Instance, Error> + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Instantiable means not declared abstract and carrying a constructor.
    pub fn is_instantiable(&self) -> bool {
        self.instantiable && self.constructor.is_some()
    }

    pub fn implements_type(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|entry| entry == interface)
    }

    pub(crate) fn instantiate(&self, args: Vec<Instance>) -> Result<Instance, Error> {
        match &self.constructor {
            Some(constructor) => constructor(args),
            None => Err(Error::NotInstantiable {
                concrete: self.id.clone(),
                build_stack: Vec::new(),
            }),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("parameters", &self.parameters)
            .field("interfaces", &self.interfaces)
            .field("instantiable", &self.instantiable)
            .finish()
    }
}

/// A callable method on a described type, addressed as `"Type@method"`.
#[derive(Clone)]
pub struct MethodDescriptor {
    class: String,
    name: String,
    parameters: Vec<ParameterDescriptor>,
    is_static: bool,
    invoke: MethodInvoke,
}

impl MethodDescriptor {
    pub fn new(
        class: impl Into<String>,
        name: impl Into<String>,
        invoke: impl Fn(Option<Instance>, Vec<Instance>) -> Result<Instance, Error>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            parameters: Vec::new(),
            is_static: false,
            invoke: Arc::new(invoke),
        }
    }

    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Static methods are invoked without resolving a receiver instance.
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub(crate) fn invoke(
        &self,
        receiver: Option<Instance>,
        args: Vec<Instance>,
    ) -> Result<Instance, Error> {
        (self.invoke)(receiver, args)
    }
}

/// The capability the resolver trusts for constructor enumeration and
/// instantiation.
pub trait TypeIntrospector: Send + Sync {
    /// Describe a constructable type, if known.
    fn describe(&self, id: &str) -> Option<TypeDescriptor>;

    /// Describe a callable method, if known.
    fn describe_method(&self, class: &str, method: &str) -> Option<MethodDescriptor> {
        let _ = (class, method);
        None
    }
}

/// The default introspector: an explicit registration table.
#[derive(Default)]
pub struct DescriptorRegistry {
    types: RwLock<HashMap<String, TypeDescriptor>>,
    methods: RwLock<HashMap<String, MethodDescriptor>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a type descriptor.
    pub fn register(&self, descriptor: TypeDescriptor) {
        tracing::trace!(id = %descriptor.id(), "Type descriptor registered");
        self.types
            .write()
            .insert(descriptor.id().to_string(), descriptor);
    }

    /// Register (or replace) a method descriptor.
    pub fn register_method(&self, descriptor: MethodDescriptor) {
        let key = method_key(descriptor.class(), descriptor.name());
        tracing::trace!(method = %key, "Method descriptor registered");
        self.methods.write().insert(key, descriptor);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.types.read().contains_key(id)
    }
}

impl TypeIntrospector for DescriptorRegistry {
    fn describe(&self, id: &str) -> Option<TypeDescriptor> {
        self.types.read().get(id).cloned()
    }

    fn describe_method(&self, class: &str, method: &str) -> Option<MethodDescriptor> {
        self.methods.read().get(&method_key(class, method)).cloned()
    }
}
