//! File-backed identity store
//!
//! Stores the keypair as a single line of base64 over the libp2p protobuf
//! keypair encoding. Writes go through a temp file followed by a rename so a
//! crash mid-write never leaves a truncated key behind.

use super::IdentityStore;
use crate::core_identity::{IdentityError, PeerIdentity};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fs;
use std::path::PathBuf;
use zeroize::Zeroize;

/// File-backed identity store
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<PeerIdentity>, IdentityError> {
        let mut encoded = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IdentityError::Io(e)),
        };

        let mut bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| IdentityError::InvalidEncoding(e.to_string()))?;
        encoded.zeroize();

        let identity = PeerIdentity::from_protobuf_encoding(&mut bytes)?;
        Ok(Some(identity))
    }

    fn store(&self, identity: &PeerIdentity) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut bytes = identity.to_protobuf_encoding()?;
        let mut encoded = BASE64.encode(&bytes);
        bytes.zeroize();

        let temp = self.temp_path();
        let result = fs::write(&temp, encoded.as_bytes())
            .and_then(|_| fs::rename(&temp, &self.path))
            .map_err(IdentityError::Io);
        encoded.zeroize();

        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result
    }
}
