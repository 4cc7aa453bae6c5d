use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{EmergencyContact, JournalEntry, MoodEntry};
use crate::MAX_EMERGENCY_CONTACTS;

const CURRENT_SCHEMA_VERSION: u32 = 1;
const MAX_SNAPSHOT_BYTES: usize = 16 * 1024 * 1024;
const SNAPSHOT_MAGIC: &[u8; 4] = b"SBLS";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted snapshot: {reason}")]
    Corrupted { reason: &'static str },

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityCheckFailed { expected: String, actual: String },

    #[error("schema version {found} is newer than supported {max}")]
    FutureSchema { found: u32, max: u32 },

    #[error("unknown schema version: {0}")]
    UnknownSchema(u32),

    #[error("snapshot too large: {size} bytes, max {max}")]
    SnapshotTooLarge { size: usize, max: usize },

    #[error("too many emergency contacts: {count}, max {max}")]
    TooManyContacts { count: usize, max: usize },
}

impl From<ciborium::de::Error<std::io::Error>> for StoreError {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for StoreError {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for crate::AppError {
    fn from(err: StoreError) -> Self {
        let kind = match err {
            StoreError::Serialization(_) => crate::ErrorKind::Serialization,
            _ => crate::ErrorKind::Storage,
        };
        crate::AppError::new(kind, "Local data could not be restored").with_internal(err.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct SnapshotEnvelope {
    magic: [u8; 4],
    schema_version: u32,
    checksum: [u8; 32],
    payload: Vec<u8>,
}

/// Everything a signed-out, local-only session keeps between launches.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LocalSnapshot {
    pub mood_entries: Vec<MoodEntry>,
    pub journal_entries: Vec<JournalEntry>,
    pub emergency_contacts: Vec<EmergencyContact>,
    pub sos_consent: bool,
}

impl LocalSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        let mut payload = Vec::new();
        ciborium::into_writer(self, &mut payload)?;

        let checksum = blake3::hash(&payload);
        let envelope = SnapshotEnvelope {
            magic: *SNAPSHOT_MAGIC,
            schema_version: CURRENT_SCHEMA_VERSION,
            checksum: *checksum.as_bytes(),
            payload,
        };

        let mut bytes = Vec::new();
        ciborium::into_writer(&envelope, &mut bytes)?;
        if bytes.len() > MAX_SNAPSHOT_BYTES {
            return Err(StoreError::SnapshotTooLarge {
                size: bytes.len(),
                max: MAX_SNAPSHOT_BYTES,
            });
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.is_empty() {
            return Err(StoreError::Corrupted {
                reason: "empty snapshot",
            });
        }
        if bytes.len() > MAX_SNAPSHOT_BYTES {
            return Err(StoreError::SnapshotTooLarge {
                size: bytes.len(),
                max: MAX_SNAPSHOT_BYTES,
            });
        }

        let envelope: SnapshotEnvelope = ciborium::from_reader(bytes)?;

        if envelope.magic != *SNAPSHOT_MAGIC {
            return Err(StoreError::Corrupted {
                reason: "invalid magic bytes",
            });
        }

        if envelope.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::FutureSchema {
                found: envelope.schema_version,
                max: CURRENT_SCHEMA_VERSION,
            });
        }
        if envelope.schema_version < CURRENT_SCHEMA_VERSION {
            return Err(StoreError::UnknownSchema(envelope.schema_version));
        }

        let actual = blake3::hash(&envelope.payload);
        if actual.as_bytes() != &envelope.checksum {
            return Err(StoreError::IntegrityCheckFailed {
                expected: blake3::Hash::from(envelope.checksum).to_hex().to_string(),
                actual: actual.to_hex().to_string(),
            });
        }

        let snapshot: Self = ciborium::from_reader(&envelope.payload[..])?;
        if snapshot.emergency_contacts.len() > MAX_EMERGENCY_CONTACTS {
            return Err(StoreError::TooManyContacts {
                count: snapshot.emergency_contacts.len(),
                max: MAX_EMERGENCY_CONTACTS,
            });
        }
        Ok(snapshot)
    }
}

/// Key under which a namespace's snapshot is stored. The namespace is hashed
/// so the key is stable but does not spell out the user id.
#[must_use]
pub fn snapshot_key(namespace: &str) -> String {
    let digest = blake3::hash(format!("local-snapshot:v{CURRENT_SCHEMA_VERSION}:{namespace}").as_bytes());
    digest.to_hex()[..32].to_string()
}
