//! In-memory identity store for tests and ephemeral runs

use super::IdentityStore;
use crate::core_identity::{IdentityError, PeerIdentity};
use std::sync::Mutex;

/// In-memory identity store
#[derive(Default)]
pub struct MemoryIdentityStore {
    identity: Mutex<Option<PeerIdentity>>,
    /// When set, every operation fails (for exercising fallback paths)
    fail: bool,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose operations always fail
    pub fn failing() -> Self {
        Self {
            identity: Mutex::new(None),
            fail: true,
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<PeerIdentity>, IdentityError> {
        if self.fail {
            return Err(IdentityError::Other("memory store failure".to_string()));
        }
        Ok(self.identity.lock().expect("lock poisoned").clone())
    }

    fn store(&self, identity: &PeerIdentity) -> Result<(), IdentityError> {
        if self.fail {
            return Err(IdentityError::Other("memory store failure".to_string()));
        }
        *self.identity.lock().expect("lock poisoned") = Some(identity.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store_loads_none() {
        let store = MemoryIdentityStore::new();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_store_round_trip() {
        let store = MemoryIdentityStore::new();
        let identity = PeerIdentity::generate();
        store.store(&identity).unwrap();
        assert_eq!(
            store.load().unwrap().unwrap().peer_id(),
            identity.peer_id()
        );
    }

    #[test]
    fn test_failing_store() {
        let store = MemoryIdentityStore::failing();
        assert!(store.load().is_err());
        assert!(store.store(&PeerIdentity::generate()).is_err());
    }
}
