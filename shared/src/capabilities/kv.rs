use crux_kv::KeyValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::offline_store::{snapshot_key, LocalSnapshot, StoreError};
use crate::sync::UserNamespace;

pub const MAX_KEY_LENGTH: usize = 512;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error(transparent)]
    Snapshot(#[from] StoreError),
}

const SNAPSHOT_PREFIX: &str = "snapshot";

/// A validated key-value store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvKey {
    key: String,
}

impl KvKey {
    fn new(key: impl Into<String>) -> Result<Self, KvError> {
        let key = key.into();
        Self::validate_key(&key)?;
        Ok(Self { key })
    }

    /// Key of the on-device snapshot for a namespace.
    pub fn guest_snapshot(namespace: &UserNamespace) -> Result<Self, KvError> {
        Self::new(snapshot_key(namespace.uid()))
    }

    #[must_use]
    pub fn raw(&self) -> String {
        format!("{SNAPSHOT_PREFIX}:{}", self.key)
    }

    fn validate_key(key: &str) -> Result<(), KvError> {
        let invalid = |reason: &str| KvError::InvalidKey {
            key: key.chars().take(50).collect(),
            reason: reason.to_string(),
        };
        if key.trim().is_empty() {
            return Err(invalid("key cannot be empty"));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(invalid("key is too long"));
        }
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(invalid("key cannot contain path sequences"));
        }
        if key.chars().any(char::is_control) {
            return Err(invalid("key contains control characters"));
        }
        Ok(())
    }
}

/// Reads the guest snapshot. A missing value is `Ok(None)`.
pub fn load_guest_snapshot<Ev, F>(
    kv: &KeyValue<Ev>,
    namespace: &UserNamespace,
    make_event: F,
) -> Result<(), KvError>
where
    Ev: Send + 'static,
    F: FnOnce(Result<Option<Vec<u8>>, String>) -> Ev + Send + Sync + 'static,
{
    let key = KvKey::guest_snapshot(namespace)?;
    debug!(key = %key.raw(), "loading guest snapshot");
    kv.get(key.raw(), move |result| {
        make_event(result.map_err(|e| e.to_string()))
    });
    Ok(())
}

/// Encodes and writes the guest snapshot.
pub fn save_guest_snapshot<Ev, F>(
    kv: &KeyValue<Ev>,
    namespace: &UserNamespace,
    snapshot: &LocalSnapshot,
    make_event: F,
) -> Result<(), KvError>
where
    Ev: Send + 'static,
    F: FnOnce(Result<(), String>) -> Ev + Send + Sync + 'static,
{
    let bytes = snapshot.encode()?;
    let key = KvKey::guest_snapshot(namespace)?;
    debug!(key = %key.raw(), size = bytes.len(), "saving guest snapshot");
    kv.set(key.raw(), bytes, move |result| {
        make_event(result.map(|_| ()).map_err(|e| e.to_string()))
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;

    #[test]
    fn rejects_unsafe_keys() {
        assert!(KvKey::new("").is_err());
        assert!(KvKey::new("   ").is_err());
        assert!(KvKey::new("key\0value").is_err());
        assert!(KvKey::new("../etc/passwd").is_err());
        assert!(KvKey::new("/abs").is_err());
        assert!(KvKey::new("a".repeat(MAX_KEY_LENGTH + 1)).is_err());
        assert!(KvKey::new("key\x01value").is_err());
        assert_eq!(KvKey::new("abc123").unwrap().raw(), "snapshot:abc123");
    }

    #[test]
    fn guest_snapshot_keys_are_per_namespace() {
        let guest = KvKey::guest_snapshot(&UserNamespace::for_user(None)).unwrap();
        let user =
            KvKey::guest_snapshot(&UserNamespace::for_user(Some(&UserId::new("../abc")))).unwrap();
        assert_ne!(guest, user);
        assert!(guest.raw().starts_with("snapshot:"));
        assert!(!user.raw().contains(".."));
    }
}
