//! The server-side election: voter and candidate registry, ballot issuance
//! and counting, and aggregate results.
//!
//! An [`Election`] is cheap to clone and is placed in Rocket managed state.

use std::sync::Arc;

use crate::model::{memory::MemoryStore, store::VotingStore, voter::VoterKeys};

mod balloting;
pub mod redaction;
mod registry;

#[derive(Clone)]
pub struct Election {
    store: Arc<dyn VotingStore>,
    keys: Arc<VoterKeys>,
}

impl Election {
    pub fn new(store: Arc<dyn VotingStore>, keys: VoterKeys) -> Self {
        Self {
            store,
            keys: Arc::new(keys),
        }
    }

    /// An election backed by a fresh in-memory store.
    pub fn in_memory(keys: VoterKeys) -> Self {
        Self::new(Arc::new(MemoryStore::new()), keys)
    }

    pub fn keys(&self) -> &VoterKeys {
        &self.keys
    }

    pub(crate) fn store(&self) -> &dyn VotingStore {
        self.store.as_ref()
    }
}
