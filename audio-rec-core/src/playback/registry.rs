use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::artifact::{Artifact, PlayableRef};

/// Process-lifetime store of playable references.
///
/// Each published artifact gets a fresh `blob:` URI that resolves until it
/// is explicitly revoked. Publishing a new artifact never revokes older
/// references. Clones share the same store.
#[derive(Clone, Default)]
pub struct PlaybackRegistry {
    entries: Arc<Mutex<HashMap<PlayableRef, Arc<Artifact>>>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, artifact: Arc<Artifact>) -> PlayableRef {
        let reference = PlayableRef::generate();
        self.entries.lock().insert(reference.clone(), artifact);
        reference
    }

    pub fn resolve(&self, reference: &PlayableRef) -> Option<Arc<Artifact>> {
        self.entries.lock().get(reference).cloned()
    }

    /// Returns whether the reference was live.
    pub fn revoke(&self, reference: &PlayableRef) -> bool {
        self.entries.lock().remove(reference).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for PlaybackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackRegistry")
            .field("live_references", &self.len())
            .finish()
    }
}
