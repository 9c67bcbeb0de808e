//! Tag index: named groups of identifiers resolved together.

use std::fmt;

use tracing::debug;

use crate::{Container, Error, Instance};

impl Container {
    /// Assign a set of tags to the given identifiers. Duplicates are kept.
    pub fn tag(&self, abstracts: &[&str], tags: &[&str]) {
        let mut index = self.state.tags.write();
        for tag in tags {
            let group = index.entry((*tag).to_string()).or_default();
            for abstract_id in abstracts {
                group.push((*abstract_id).to_string());
            }
        }
        debug!(tags = ?tags, count = abstracts.len(), "Tagged identifiers");
    }

    /// The services registered under a tag, as a lazy, restartable sequence.
    /// An unknown tag yields an empty sequence.
    pub fn tagged(&self, tag: &str) -> TaggedServices {
        let ids = self.state.tags.read().get(tag).cloned().unwrap_or_default();
        TaggedServices {
            container: self.clone(),
            ids,
        }
    }
}

/// A restartable resolution pass over a tag group.
///
/// Nothing is memoized: every call to [`TaggedServices::iter`] re-resolves
/// each tagged identifier through `make`, so non-shared bindings produce
/// fresh instances per pass. The element count is fixed at the time
/// [`Container::tagged`] was called.
pub struct TaggedServices {
    container: Container,
    ids: Vec<String>,
}

impl TaggedServices {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// A fresh resolution pass over the group.
    pub fn iter(&self) -> impl Iterator<Item = Result<Instance, Error>> + '_ {
        self.ids.iter().map(|id| self.container.make(id))
    }
}

impl fmt::Debug for TaggedServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedServices").field("ids", &self.ids).finish()
    }
}
