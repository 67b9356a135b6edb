//! Keystore module
//!
//! Abstract store API for durable node identities. The storage medium is
//! pluggable; the daemon uses the file-backed store, tests the in-memory one.

use super::{IdentityError, PeerIdentity};

pub mod file_keystore;
pub mod memory_keystore;

pub use file_keystore::FileIdentityStore;
pub use memory_keystore::MemoryIdentityStore;

/// Abstract identity store trait
pub trait IdentityStore: Send + Sync {
    /// Load the stored identity, if any
    fn load(&self) -> Result<Option<PeerIdentity>, IdentityError>;

    /// Persist an identity
    fn store(&self, identity: &PeerIdentity) -> Result<(), IdentityError>;
}
