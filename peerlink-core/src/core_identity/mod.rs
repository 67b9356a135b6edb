//! Node identity management
//!
//! Owns generation and loading of the node's cryptographic identity and the
//! peer id derived from it. The policy is load-or-generate: a stored identity
//! is reused as-is so the peer id stays stable across restarts; any failure
//! degrades to a fresh identity for this run, never to a crash.

mod error;
mod keypair;
pub mod keystore;

pub use error::IdentityError;
pub use keypair::PeerIdentity;
pub use keystore::{FileIdentityStore, IdentityStore, MemoryIdentityStore};

use tracing::{info, warn};

/// Load the stored identity or create (and persist) a new one.
///
/// The process always ends up with a usable identity: load failures fall back
/// to a fresh keypair, and persistence failures leave that keypair ephemeral
/// with a warning.
pub fn get_or_create(store: &dyn IdentityStore) -> PeerIdentity {
    match store.load() {
        Ok(Some(identity)) => {
            info!(peer_id = %identity.peer_id(), "Using existing identity");
            return identity;
        }
        Ok(None) => {}
        Err(e) => {
            warn!("Failed to load stored identity, generating a new one: {}", e);
        }
    }

    let identity = PeerIdentity::generate();
    match store.store(&identity) {
        Ok(()) => info!(peer_id = %identity.peer_id(), "Stored new identity"),
        Err(e) => warn!(
            peer_id = %identity.peer_id(),
            "Failed to persist identity, continuing with an ephemeral one: {}", e
        ),
    }
    identity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_generates_and_persists() {
        let store = MemoryIdentityStore::new();
        let first = get_or_create(&store);
        let second = get_or_create(&store);
        assert_eq!(first.peer_id(), second.peer_id());
    }

    #[test]
    fn test_get_or_create_survives_store_failure() {
        let store = MemoryIdentityStore::failing();
        // Both load and persist fail; we still get a usable identity.
        let identity = get_or_create(&store);
        assert_eq!(identity.peer_id(), identity.keypair().public().to_peer_id());
    }

    #[test]
    fn test_peer_id_stable_across_restarts_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.key");

        let first = get_or_create(&FileIdentityStore::new(path.clone()));
        let second = get_or_create(&FileIdentityStore::new(path));
        assert_eq!(first.peer_id(), second.peer_id());
    }
}
