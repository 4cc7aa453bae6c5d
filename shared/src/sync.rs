//! Mirrors of remote document collections.
//!
//! Each [`SyncedCollection`] holds the latest snapshot the shell delivered for
//! one collection. Subscriptions are tagged with a [`SubscriptionId`] whose
//! generation is bumped on every (re)subscribe, so snapshots and failures
//! that belong to a retired subscription are dropped instead of overwriting
//! newer data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::model::UserId;
use crate::{AppError, ErrorKind, GUEST_USER_ID, MAX_DIAGNOSTICS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    MoodEntries,
    JournalEntries,
    EmergencyContacts,
}

impl CollectionKind {
    pub const ALL: [Self; 3] = [
        Self::MoodEntries,
        Self::JournalEntries,
        Self::EmergencyContacts,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MoodEntries => "moodEntries",
            Self::JournalEntries => "journalEntries",
            Self::EmergencyContacts => "emergencyContacts",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The `users/{uid}` prefix all synced collections live under. Signed-out
/// sessions share the guest placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserNamespace(String);

impl UserNamespace {
    #[must_use]
    pub fn for_user(user: Option<&UserId>) -> Self {
        Self(user.map_or_else(|| GUEST_USER_ID.to_string(), |u| u.as_str().to_string()))
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.0 == GUEST_USER_ID
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn collection(&self, kind: CollectionKind) -> CollectionPath {
        CollectionPath {
            namespace: self.clone(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionPath {
    pub namespace: UserNamespace,
    pub kind: CollectionKind,
}

impl CollectionPath {
    #[must_use]
    pub fn document(&self, id: impl Into<String>) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.into(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "users/{}/{}", self.namespace.uid(), self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentPath {
    pub collection: CollectionPath,
    pub id: String,
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId {
    pub kind: CollectionKind,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOperation {
    Get,
    List,
    Create,
    Update,
    Delete,
}

/// A request the remote store's security rules refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionError {
    pub path: String,
    pub operation: RuleOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_resource_data: Option<Value>,
}

impl PermissionError {
    #[must_use]
    pub fn new(path: impl fmt::Display, operation: RuleOperation) -> Self {
        Self {
            path: path.to_string(),
            operation,
            request_resource_data: None,
        }
    }

    #[must_use]
    pub fn with_resource_data(mut self, data: Value) -> Self {
        self.request_resource_data = Some(data);
        self
    }
}

impl fmt::Display for PermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let context = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        write!(
            f,
            "Missing or insufficient permissions: The following request was denied by security rules:\n{context}"
        )
    }
}

impl std::error::Error for PermissionError {}

impl From<&PermissionError> for AppError {
    fn from(err: &PermissionError) -> Self {
        AppError::new(ErrorKind::Authorization, "Permission denied")
            .with_internal(err.to_string())
            .with_context("path", err.path.clone())
    }
}

/// A document as delivered by the shell: the server id plus its raw fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub fields: Value,
}

/// A failure reported by the shell for a subscription or a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFailure {
    pub code: String,
    pub message: String,
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

const PERMISSION_DENIED: &str = "permission-denied";

/// A write-through create or delete the shell could not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteFailure {
    pub collection: CollectionKind,
    pub path: String,
    pub operation: RuleOperation,
    pub payload: Option<Value>,
    pub failure: StoreFailure,
}

impl WriteFailure {
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.failure.code == PERMISSION_DENIED
    }

    #[must_use]
    pub fn to_permission_error(&self) -> PermissionError {
        let err = PermissionError::new(&self.path, self.operation);
        match &self.payload {
            Some(payload) => err.with_resource_data(payload.clone()),
            None => err,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("document {id} in {kind} does not match the schema: {reason}")]
    InvalidDocument {
        kind: CollectionKind,
        id: String,
        reason: String,
    },
}

/// An entity that can be mirrored from a remote collection.
pub trait SyncedEntity: Clone {
    const KIND: CollectionKind;

    fn from_remote(doc: &RemoteDocument) -> Result<Self, SnapshotError>;

    fn id(&self) -> &str;
}

/// What the caller has to tell the shell after a subscription change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriptionChange {
    pub retired: Option<SubscriptionId>,
    pub opened: Option<(SubscriptionId, CollectionPath)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied { accepted: usize, skipped: usize },
    Stale,
}

#[derive(Debug, Clone)]
pub struct SyncedCollection<T> {
    items: Vec<T>,
    loading: bool,
    error: Option<PermissionError>,
    active: Option<(SubscriptionId, CollectionPath)>,
    generation: u64,
}

impl<T> Default for SyncedCollection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            active: None,
            generation: 0,
        }
    }
}

impl<T: SyncedEntity> SyncedCollection<T> {
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&PermissionError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.active.as_ref().map(|(id, _)| *id)
    }

    #[must_use]
    pub fn path(&self) -> Option<&CollectionPath> {
        self.active.as_ref().map(|(_, path)| path)
    }

    #[must_use]
    pub fn is_current(&self, id: SubscriptionId) -> bool {
        self.subscription() == Some(id)
    }

    /// Retires the current subscription (if any) and, when a path is given,
    /// opens a fresh one and marks the collection as loading.
    pub fn subscribe(&mut self, path: Option<CollectionPath>) -> SubscriptionChange {
        let retired = self.unsubscribe();
        self.error = None;

        let Some(path) = path else {
            self.items.clear();
            self.loading = false;
            return SubscriptionChange {
                retired,
                opened: None,
            };
        };

        self.generation += 1;
        let id = SubscriptionId {
            kind: T::KIND,
            generation: self.generation,
        };
        debug!(collection = %path, generation = id.generation, "subscribing");
        self.loading = true;
        self.active = Some((id, path.clone()));
        SubscriptionChange {
            retired,
            opened: Some((id, path)),
        }
    }

    /// Retires the current subscription. Calling it twice is harmless.
    pub fn unsubscribe(&mut self) -> Option<SubscriptionId> {
        let (id, _) = self.active.take()?;
        self.loading = false;
        Some(id)
    }

    pub fn apply_snapshot(&mut self, id: SubscriptionId, docs: &[RemoteDocument]) -> SnapshotOutcome {
        if !self.is_current(id) {
            warn!(
                collection = %T::KIND,
                generation = id.generation,
                "ignoring snapshot for retired subscription"
            );
            return SnapshotOutcome::Stale;
        }

        let mut skipped = 0;
        let items: Vec<T> = docs
            .iter()
            .filter_map(|doc| match T::from_remote(doc) {
                Ok(item) => Some(item),
                Err(e) => {
                    skipped += 1;
                    warn!(error = %e, "skipping malformed document");
                    None
                }
            })
            .collect();

        let accepted = items.len();
        self.items = items;
        self.loading = false;
        self.error = None;
        SnapshotOutcome::Applied { accepted, skipped }
    }

    /// Records a subscription failure for the current subscription and
    /// returns the permission error to publish. Stale failures yield `None`.
    pub fn apply_failure(&mut self, id: SubscriptionId, failure: &StoreFailure) -> Option<PermissionError> {
        let path = match &self.active {
            Some((current, path)) if *current == id => path.to_string(),
            _ => {
                warn!(collection = %T::KIND, "ignoring failure for retired subscription");
                return None;
            }
        };

        let permission_error = PermissionError::new(path, RuleOperation::List);
        error!(
            collection = %T::KIND,
            code = %failure.code,
            "{permission_error}"
        );
        self.loading = false;
        self.error = Some(permission_error.clone());
        Some(permission_error)
    }

    pub fn push_local(&mut self, item: T) {
        self.items.push(item);
    }

    /// Removes the item with the given id. Returns whether anything changed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() != before
    }

    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
    }
}

/// Bounded feed of permission errors for developer tooling.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsChannel {
    entries: VecDeque<PermissionError>,
}

impl DiagnosticsChannel {
    pub fn publish(&mut self, err: PermissionError) {
        if self.entries.len() == MAX_DIAGNOSTICS {
            self.entries.pop_front();
        }
        self.entries.push_back(err);
    }

    pub fn entries(&self) -> impl Iterator<Item = &PermissionError> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: String,
        text: String,
    }

    impl SyncedEntity for Note {
        const KIND: CollectionKind = CollectionKind::JournalEntries;

        fn from_remote(doc: &RemoteDocument) -> Result<Self, SnapshotError> {
            let text = doc
                .fields
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| SnapshotError::InvalidDocument {
                    kind: Self::KIND,
                    id: doc.id.clone(),
                    reason: "missing text".into(),
                })?;
            Ok(Self {
                id: doc.id.clone(),
                text: text.to_string(),
            })
        }

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn doc(id: &str, text: &str) -> RemoteDocument {
        RemoteDocument {
            id: id.into(),
            fields: json!({ "text": text }),
        }
    }

    fn path(uid: &str) -> CollectionPath {
        UserNamespace::for_user(Some(&UserId::new(uid))).collection(CollectionKind::JournalEntries)
    }

    #[test]
    fn denied_writes_carry_their_payload() {
        let failure = WriteFailure {
            collection: CollectionKind::JournalEntries,
            path: path("u1").to_string(),
            operation: RuleOperation::Create,
            payload: Some(json!({ "text": "hi" })),
            failure: StoreFailure {
                code: PERMISSION_DENIED.into(),
                message: "denied".into(),
            },
        };
        assert!(failure.is_permission_denied());
        let err = failure.to_permission_error();
        assert_eq!(err.operation, RuleOperation::Create);
        assert!(err.to_string().contains("\"requestResourceData\""));
    }

    #[test]
    fn paths_are_namespaced_by_user() {
        assert_eq!(path("u1").to_string(), "users/u1/journalEntries");
        let guest = UserNamespace::for_user(None);
        assert!(guest.is_guest());
        assert_eq!(
            guest.collection(CollectionKind::EmergencyContacts).document("c1").to_string(),
            "users/local-user/emergencyContacts/c1"
        );
    }

    #[test]
    fn subscribe_marks_loading_and_snapshot_clears_it() {
        let mut notes = SyncedCollection::<Note>::default();
        let change = notes.subscribe(Some(path("u1")));
        let (id, _) = change.opened.unwrap();
        assert!(notes.is_loading());

        let outcome = notes.apply_snapshot(id, &[doc("a", "one"), doc("b", "two")]);
        assert_eq!(outcome, SnapshotOutcome::Applied { accepted: 2, skipped: 0 });
        assert!(!notes.is_loading());
        assert_eq!(notes.items().len(), 2);
    }

    #[test]
    fn subscribe_none_clears_data() {
        let mut notes = SyncedCollection::<Note>::default();
        let (id, _) = notes.subscribe(Some(path("u1"))).opened.unwrap();
        notes.apply_snapshot(id, &[doc("a", "one")]);

        let change = notes.subscribe(None);
        assert_eq!(change.retired, Some(id));
        assert!(change.opened.is_none());
        assert!(notes.items().is_empty());
        assert!(!notes.is_loading());
    }

    #[test]
    fn stale_snapshot_is_ignored() {
        let mut notes = SyncedCollection::<Note>::default();
        let (old, _) = notes.subscribe(Some(path("u1"))).opened.unwrap();
        let (new, _) = notes.subscribe(Some(path("u2"))).opened.unwrap();
        assert_ne!(old, new);

        notes.apply_snapshot(new, &[doc("fresh", "new user")]);
        assert_eq!(notes.apply_snapshot(old, &[doc("stale", "old user")]), SnapshotOutcome::Stale);
        assert_eq!(notes.items()[0].id, "fresh");
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let mut notes = SyncedCollection::<Note>::default();
        let (id, _) = notes.subscribe(Some(path("u1"))).opened.unwrap();
        let bad = RemoteDocument {
            id: "bad".into(),
            fields: json!({ "body": 3 }),
        };
        let outcome = notes.apply_snapshot(id, &[doc("a", "ok"), bad]);
        assert_eq!(outcome, SnapshotOutcome::Applied { accepted: 1, skipped: 1 });
    }

    #[test]
    fn failure_builds_permission_error_for_current_subscription() {
        let mut notes = SyncedCollection::<Note>::default();
        let (old, _) = notes.subscribe(Some(path("u1"))).opened.unwrap();
        let (id, _) = notes.subscribe(Some(path("u2"))).opened.unwrap();
        let failure = StoreFailure {
            code: "permission-denied".into(),
            message: "denied".into(),
        };

        assert!(notes.apply_failure(old, &failure).is_none());

        let err = notes.apply_failure(id, &failure).unwrap();
        assert_eq!(err.path, "users/u2/journalEntries");
        assert_eq!(err.operation, RuleOperation::List);
        assert!(!notes.is_loading());
        assert_eq!(notes.error(), Some(&err));
        assert!(err.to_string().contains("\"operation\": \"list\""));
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut notes = SyncedCollection::<Note>::default();
        let (id, _) = notes.subscribe(Some(path("u1"))).opened.unwrap();
        assert_eq!(notes.unsubscribe(), Some(id));
        assert_eq!(notes.unsubscribe(), None);
        assert_eq!(notes.apply_snapshot(id, &[doc("a", "x")]), SnapshotOutcome::Stale);
    }

    #[test]
    fn diagnostics_are_bounded() {
        let mut channel = DiagnosticsChannel::default();
        for i in 0..(MAX_DIAGNOSTICS + 5) {
            channel.publish(PermissionError::new(format!("p{i}"), RuleOperation::List));
        }
        assert_eq!(channel.len(), MAX_DIAGNOSTICS);
        assert_eq!(channel.entries().next().unwrap().path, "p5");
        channel.clear();
        assert!(channel.is_empty());
    }

    proptest! {
        #[test]
        fn only_the_latest_subscription_can_write(resubscribes in 1usize..8, stale_pick in 0usize..8) {
            let mut notes = SyncedCollection::<Note>::default();
            let mut ids = Vec::new();
            for i in 0..=resubscribes {
                let (id, _) = notes.subscribe(Some(path(&format!("u{i}")))).opened.unwrap();
                ids.push(id);
            }
            let latest = *ids.last().unwrap();
            notes.apply_snapshot(latest, &[doc("live", "latest")]);

            let stale = ids[stale_pick % resubscribes];
            prop_assert_eq!(notes.apply_snapshot(stale, &[doc("old", "stale")]), SnapshotOutcome::Stale);
            prop_assert_eq!(notes.items().len(), 1);
            prop_assert_eq!(&notes.items()[0].id, "live");
        }
    }
}
