//! Core library for the Cask service container.
//!
//! Cask maps abstract identifiers (opaque strings) to concrete construction
//! recipes and resolves whole object graphs on demand: constructor
//! dependencies are walked recursively through an explicit type-descriptor
//! registry, singleton and scoped lifetimes are enforced by an instance
//! cache, contextual bindings override what a specific consumer receives,
//! and resolution events fire around every fresh build.
//!
//! ## Quick start
//!
//! ```
//! use cask_core::{
//!     Container, DescriptorRegistry, ParameterDescriptor, TypeDescriptor, arg, downcast,
//!     to_instance,
//! };
//! use std::sync::Arc;
//!
//! struct FileLogger {
//!     path: String,
//! }
//!
//! let registry = Arc::new(DescriptorRegistry::new());
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
//!
//! let container = Container::with_introspector(registry);
//! container.singleton("Logger", Some("FileLogger".into())).unwrap();
//!
//! let logger = container.make("Logger").unwrap();
//! assert_eq!(downcast::<FileLogger>(&logger).unwrap().path, "app.log");
//!
//! // Shared bindings cache their instance.
//! let again = container.make("Logger").unwrap();
//! assert!(Arc::ptr_eq(&logger, &again));
//! ```

pub mod binding;
pub mod config;
pub mod container;
pub mod contextual;
pub mod error;
pub mod events;
pub mod invoker;
pub mod registry;
pub mod resolve;
pub mod tagged;

pub use binding::{Concrete, ContextualImpl, Factory, Instance, Overrides, arg, downcast,
    to_instance};
pub use config::{CONFIG_ID, Config};
pub use container::Container;
pub use contextual::{ContextualBindingBuilder, ContextualBindingNeeds};
pub use error::Error;
pub use events::{BeforeCallback, ResolvingCallback};
pub use invoker::Thunk;
pub use registry::{
    Constructor, DefaultValue, DescriptorRegistry, MethodDescriptor, MethodInvoke,
    ParameterDescriptor, TypeDescriptor, TypeIntrospector, method_key,
};
pub use tagged::TaggedServices;
