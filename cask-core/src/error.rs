// Error types for the Cask container

use thiserror::Error;

/// Errors raised while registering bindings or resolving services.
#[derive(Error, Debug)]
pub enum Error {
    /// No type descriptor is registered for the requested concrete identifier.
    #[error("target type [{concrete}] does not exist")]
    DescriptorNotFound { concrete: String },

    /// The concrete type is abstract or carries no usable constructor.
    #[error("target [{concrete}] is not instantiable{}", build_trail(.build_stack))]
    NotInstantiable {
        concrete: String,
        build_stack: Vec<String>,
    },

    /// A primitive constructor parameter had no override, no contextual
    /// binding, and no declared default.
    #[error("unresolvable dependency resolving [${parameter}] in [{declared_in}]")]
    UnresolvablePrimitive {
        parameter: String,
        declared_in: String,
    },

    /// Construction recursed into a type already on the build stack.
    #[error("circular dependency detected while resolving [{concrete}]{}", build_trail(.chain))]
    CircularDependency { concrete: String, chain: Vec<String> },

    #[error("[{abstract_id}] is aliased to itself")]
    SelfAlias { abstract_id: String },

    /// Registering the alias would make `get_alias` non-terminating.
    #[error("aliasing [{alias}] to [{abstract_id}] would create an alias cycle")]
    AliasCycle { abstract_id: String, alias: String },

    /// The identifier is genuinely unbound. Raised only by [`Container::get`],
    /// never by `make`.
    ///
    /// [`Container::get`]: crate::Container::get
    #[error("no entry was found for identifier [{id}]")]
    NotFound { id: String },

    #[error("method not provided for call target [{target}]")]
    MethodNotProvided { target: String },

    #[error("no method binding or method descriptor found for [{method}]")]
    MethodNotFound { method: String },

    #[error("failed to downcast [{id}] to [{expected}]")]
    Downcast { id: String, expected: String },
}

impl Error {
    /// Whether this error belongs to the binding-resolution family that
    /// dependency fallback logic may swallow in favor of a declared default.
    /// Everything else, circular dependencies included, always propagates.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Error::DescriptorNotFound { .. }
                | Error::NotInstantiable { .. }
                | Error::UnresolvablePrimitive { .. }
        )
    }
}

fn build_trail(stack: &[String]) -> String {
    if stack.is_empty() {
        String::new()
    } else {
        format!(" while building [{}]", stack.join(", "))
    }
}
