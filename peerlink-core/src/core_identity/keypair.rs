//! Node identity keypair

use super::IdentityError;
use libp2p::identity::Keypair;
use libp2p::PeerId;
use zeroize::Zeroize;

/// The node's cryptographic identity.
///
/// Wraps an Ed25519 keypair and derives the stable peer id from its public
/// key. Created once at startup; never mutated afterwards.
#[derive(Clone)]
pub struct PeerIdentity {
    keypair: Keypair,
    peer_id: PeerId,
}

impl PeerIdentity {
    /// Generate a fresh Ed25519 identity
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::generate_ed25519())
    }

    /// Wrap an existing keypair
    pub fn from_keypair(keypair: Keypair) -> Self {
        let peer_id = keypair.public().to_peer_id();
        Self { keypair, peer_id }
    }

    /// The stable peer id derived from the public key
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Borrow the underlying keypair (for swarm construction)
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Decode an identity from its protobuf keypair encoding.
    ///
    /// The input buffer is zeroized after decoding.
    pub fn from_protobuf_encoding(bytes: &mut Vec<u8>) -> Result<Self, IdentityError> {
        let result = Keypair::from_protobuf_encoding(bytes)
            .map(Self::from_keypair)
            .map_err(|e| IdentityError::InvalidEncoding(e.to_string()));
        bytes.zeroize();
        result
    }

    /// Encode the identity as the protobuf keypair encoding.
    ///
    /// Callers are responsible for zeroizing the returned buffer once it has
    /// been persisted.
    pub fn to_protobuf_encoding(&self) -> Result<Vec<u8>, IdentityError> {
        self.keypair
            .to_protobuf_encoding()
            .map_err(|e| IdentityError::InvalidEncoding(e.to_string()))
    }
}

impl std::fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of debug output
        f.debug_struct("PeerIdentity")
            .field("peer_id", &self.peer_id)
            .finish()
    }
}
