//! Fluent construction of contextual bindings:
//! `container.when("Consumer").needs("Dependency").give(...)`.

use serde_json::Value;
use tracing::trace;

use crate::config::CONFIG_ID;
use crate::{Config, Container, ContextualImpl, Error, downcast, to_instance};

/// Builder returned by [`Container::when`]; names the consumer(s) whose
/// builds the binding applies to.
#[must_use = "contextual bindings are only recorded once `give` is called"]
pub struct ContextualBindingBuilder {
    container: Container,
    concrete: Vec<String>,
}

impl ContextualBindingBuilder {
    pub(crate) fn new(container: Container, concrete: Vec<String>) -> Self {
        Self { container, concrete }
    }

    /// The abstract dependency the consumer needs. Use a `$name` key to
    /// target a primitive constructor parameter by name.
    pub fn needs(self, abstract_id: &str) -> ContextualBindingNeeds {
        ContextualBindingNeeds {
            container: self.container,
            concrete: self.concrete,
            needs: abstract_id.to_string(),
        }
    }
}

/// Terminal step of the contextual builder: what to give the consumer.
#[must_use = "contextual bindings are only recorded once `give` is called"]
pub struct ContextualBindingNeeds {
    container: Container,
    concrete: Vec<String>,
    needs: String,
}

impl ContextualBindingNeeds {
    /// Record the implementation: an identifier, factory, value, or sequence.
    pub fn give(self, implementation: impl Into<ContextualImpl>) {
        let implementation = implementation.into();
        for concrete in &self.concrete {
            trace!(consumer = %concrete, needs = %self.needs, "Recording contextual binding");
            self.container
                .add_contextual_binding(concrete, &self.needs, implementation.clone());
        }
    }

    /// Give through a factory closure.
    pub fn give_factory(
        self,
        factory: impl Fn(&Container, &crate::Overrides) -> Result<crate::Instance, Error>
        + Send
        + Sync
        + 'static,
    ) {
        self.give(ContextualImpl::factory(factory));
    }

    /// Give every service tagged with `tag`, collected eagerly at build time
    /// into a `Vec<Instance>`.
    pub fn give_tagged(self, tag: &str) {
        let tag = tag.to_string();
        self.give_factory(move |container, _| {
            let tagged = container.tagged(&tag);
            let mut services = Vec::with_capacity(tagged.len());
            for service in tagged.iter() {
                services.push(service?);
            }
            Ok(to_instance(services))
        });
    }

    /// Give a configuration value looked up from the `"config"` service,
    /// falling back to `default` (then to JSON null) when the key is absent.
    pub fn give_config(self, key: &str, default: Option<Value>) {
        let key = key.to_string();
        self.give_factory(move |container, _| {
            let config = container.make(CONFIG_ID)?;
            let config = downcast::<Config>(&config).ok_or_else(|| Error::Downcast {
                id: CONFIG_ID.to_string(),
                expected: std::any::type_name::<Config>().to_string(),
            })?;
            let value = config
                .get(&key)
                .or_else(|| default.clone())
                .unwrap_or(Value::Null);
            Ok(to_instance(value))
        });
    }
}
