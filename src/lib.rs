// Cask - a contextual service container for Rust
//
// This library maps abstract service identifiers to construction recipes and
// resolves whole object graphs with constructor injection, contextual
// overrides, lifetimes, and resolution events.

// Re-export core functionality
pub use cask_core::*;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Concrete,
        Config,
        Container,
        ContextualImpl,
        DescriptorRegistry,
        Error,
        Instance,
        MethodDescriptor,
        Overrides,
        ParameterDescriptor,
        TaggedServices,
        TypeDescriptor,
        TypeIntrospector,
        arg,
        downcast,
        to_instance,
    };
}
