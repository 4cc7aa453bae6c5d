//! Session state: the chat transcript plus the synced collections.
//!
//! With [`SyncMode::Remote`] the collections are mirrors of the remote store
//! and creates are handed back to the caller as a [`WriteThrough`] request;
//! the new entity only shows up once the next snapshot arrives. With
//! [`SyncMode::LocalOnly`] everything is applied in place with local ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{
    ContactId, EmergencyContact, EntryId, JournalEntry, Message, MessageId, MoodEntry,
    NewEmergencyContact, NewMessage, NewMoodEntry, Page, Role, UserId,
};
use crate::offline_store::LocalSnapshot;
use crate::sync::{
    CollectionKind, CollectionPath, DocumentPath, RemoteDocument, SnapshotError,
    SubscriptionChange, SyncedCollection, SyncedEntity, UserNamespace,
};
use crate::validation::MoodScore;
use crate::{WELCOME_MESSAGE, WELCOME_MESSAGE_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Remote,
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteThrough {
    Create {
        collection: CollectionPath,
        fields: Value,
    },
    Delete {
        document: DocumentPath,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Applied to local state; nothing to send.
    Local,
    WriteThrough(WriteThrough),
}

// --- Remote document schemas ---

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoodEntryFields {
    date: DateTime<Utc>,
    mood_score: MoodScore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalEntryFields {
    date: DateTime<Utc>,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmergencyContactFields {
    name: String,
    relationship: String,
    phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

fn parse_fields<F: serde::de::DeserializeOwned>(
    kind: CollectionKind,
    doc: &RemoteDocument,
) -> Result<F, SnapshotError> {
    F::deserialize(&doc.fields).map_err(|e| SnapshotError::InvalidDocument {
        kind,
        id: doc.id.clone(),
        reason: e.to_string(),
    })
}

impl SyncedEntity for MoodEntry {
    const KIND: CollectionKind = CollectionKind::MoodEntries;

    fn from_remote(doc: &RemoteDocument) -> Result<Self, SnapshotError> {
        let fields: MoodEntryFields = parse_fields(Self::KIND, doc)?;
        Ok(Self {
            id: EntryId::new(doc.id.clone()),
            date: fields.date,
            mood_score: fields.mood_score,
            tags: fields.tags,
            notes: fields.notes,
        })
    }

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

impl SyncedEntity for JournalEntry {
    const KIND: CollectionKind = CollectionKind::JournalEntries;

    fn from_remote(doc: &RemoteDocument) -> Result<Self, SnapshotError> {
        let fields: JournalEntryFields = parse_fields(Self::KIND, doc)?;
        Ok(Self {
            id: EntryId::new(doc.id.clone()),
            date: fields.date,
            content: fields.content,
        })
    }

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

impl SyncedEntity for EmergencyContact {
    const KIND: CollectionKind = CollectionKind::EmergencyContacts;

    fn from_remote(doc: &RemoteDocument) -> Result<Self, SnapshotError> {
        let fields: EmergencyContactFields = parse_fields(Self::KIND, doc)?;
        Ok(Self {
            id: ContactId::new(doc.id.clone()),
            name: fields.name,
            relationship: fields.relationship,
            phone: fields.phone,
            email: fields.email,
        })
    }

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

fn to_fields<T: Serialize>(value: &T) -> Value {
    // These field structs only hold strings, numbers and timestamps, which
    // always serialize.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    mode: SyncMode,
    namespace: UserNamespace,
    bound: bool,
    pending_contact_creates: usize,
    local_load_pending: bool,
    messages: Vec<Message>,
    pub mood_entries: SyncedCollection<MoodEntry>,
    pub journal_entries: SyncedCollection<JournalEntry>,
    pub emergency_contacts: SyncedCollection<EmergencyContact>,
    pub active_page: Page,
    pub sos_consent: bool,
}

impl SessionStore {
    #[must_use]
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            namespace: UserNamespace::for_user(None),
            bound: false,
            pending_contact_creates: 0,
            local_load_pending: false,
            messages: vec![Message {
                id: MessageId::new(WELCOME_MESSAGE_ID),
                role: Role::Assistant,
                content: WELCOME_MESSAGE.to_string(),
                rationale: None,
                is_helpful: None,
            }],
            mood_entries: SyncedCollection::default(),
            journal_entries: SyncedCollection::default(),
            emergency_contacts: SyncedCollection::default(),
            active_page: Page::default(),
            sos_consent: true,
        }
    }

    #[must_use]
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    #[must_use]
    pub fn namespace(&self) -> &UserNamespace {
        &self.namespace
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn mood_history(&self) -> &[MoodEntry] {
        self.mood_entries.items()
    }

    #[must_use]
    pub fn journal(&self) -> &[JournalEntry] {
        self.journal_entries.items()
    }

    #[must_use]
    pub fn contacts(&self) -> &[EmergencyContact] {
        self.emergency_contacts.items()
    }

    /// Most recently recorded mood entry, in snapshot order.
    #[must_use]
    pub fn latest_mood(&self) -> Option<&MoodEntry> {
        self.mood_history().last()
    }

    #[must_use]
    pub fn is_bound_to(&self, user: Option<&UserId>) -> bool {
        self.bound && self.namespace == UserNamespace::for_user(user)
    }

    /// Points the synced collections at the given user's namespace. Returns
    /// the subscription changes the shell has to carry out. In local-only
    /// mode a namespace switch empties the collections instead.
    pub fn bind_namespace(&mut self, user: Option<&UserId>) -> Vec<SubscriptionChange> {
        let namespace = UserNamespace::for_user(user);
        let switched = namespace != self.namespace;
        self.namespace = namespace;
        self.bound = true;
        self.pending_contact_creates = 0;
        match self.mode {
            SyncMode::Remote => self.subscribe_all(),
            SyncMode::LocalOnly => {
                if switched {
                    self.mood_entries.replace_all(Vec::new());
                    self.journal_entries.replace_all(Vec::new());
                    self.emergency_contacts.replace_all(Vec::new());
                }
                Vec::new()
            }
        }
    }

    pub fn set_mode(&mut self, mode: SyncMode) -> Vec<SubscriptionChange> {
        if mode == self.mode {
            return Vec::new();
        }
        self.mode = mode;
        self.pending_contact_creates = 0;
        match mode {
            SyncMode::Remote => self.subscribe_all(),
            SyncMode::LocalOnly => {
                // The guest snapshot refills these.
                self.mood_entries.replace_all(Vec::new());
                self.journal_entries.replace_all(Vec::new());
                self.emergency_contacts.replace_all(Vec::new());
                vec![
                    SubscriptionChange {
                        retired: self.mood_entries.unsubscribe(),
                        opened: None,
                    },
                    SubscriptionChange {
                        retired: self.journal_entries.unsubscribe(),
                        opened: None,
                    },
                    SubscriptionChange {
                        retired: self.emergency_contacts.unsubscribe(),
                        opened: None,
                    },
                ]
            }
        }
    }

    fn subscribe_all(&mut self) -> Vec<SubscriptionChange> {
        let ns = self.namespace.clone();
        vec![
            self.mood_entries
                .subscribe(Some(ns.collection(CollectionKind::MoodEntries))),
            self.journal_entries
                .subscribe(Some(ns.collection(CollectionKind::JournalEntries))),
            self.emergency_contacts
                .subscribe(Some(ns.collection(CollectionKind::EmergencyContacts))),
        ]
    }

    pub fn add_message(&mut self, message: NewMessage) -> &Message {
        let index = self.messages.len();
        self.messages.push(Message {
            id: MessageId::generate(),
            role: message.role,
            content: message.content,
            rationale: message.rationale,
            is_helpful: None,
        });
        &self.messages[index]
    }

    /// Overwrites the helpfulness flag. Unknown ids are ignored.
    pub fn set_feedback(&mut self, id: &MessageId, is_helpful: bool) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == id) {
            Some(message) => {
                message.is_helpful = Some(is_helpful);
                true
            }
            None => {
                debug!(message_id = %id, "feedback for unknown message");
                false
            }
        }
    }

    pub fn add_mood_entry(&mut self, entry: NewMoodEntry, now: DateTime<Utc>) -> MutationOutcome {
        let tags = (!entry.tags.is_empty()).then_some(entry.tags);
        match self.mode {
            SyncMode::Remote => MutationOutcome::WriteThrough(WriteThrough::Create {
                collection: self.namespace.collection(CollectionKind::MoodEntries),
                fields: to_fields(&MoodEntryFields {
                    date: now,
                    mood_score: entry.mood_score,
                    tags,
                    notes: entry.notes,
                }),
            }),
            SyncMode::LocalOnly => {
                self.mood_entries.push_local(MoodEntry {
                    id: EntryId::generate(),
                    date: now,
                    mood_score: entry.mood_score,
                    tags,
                    notes: entry.notes,
                });
                MutationOutcome::Local
            }
        }
    }

    pub fn add_journal_entry(&mut self, content: String, now: DateTime<Utc>) -> MutationOutcome {
        match self.mode {
            SyncMode::Remote => MutationOutcome::WriteThrough(WriteThrough::Create {
                collection: self.namespace.collection(CollectionKind::JournalEntries),
                fields: to_fields(&JournalEntryFields { date: now, content }),
            }),
            SyncMode::LocalOnly => {
                self.journal_entries.push_local(JournalEntry {
                    id: EntryId::generate(),
                    date: now,
                    content,
                });
                MutationOutcome::Local
            }
        }
    }

    /// Contacts shown plus remote creates that no snapshot has confirmed yet.
    /// This is what the per-account cap is checked against.
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.contacts().len() + self.pending_contact_creates
    }

    /// Adds a contact. The per-account cap is checked by the caller.
    pub fn add_emergency_contact(&mut self, contact: NewEmergencyContact) -> MutationOutcome {
        match self.mode {
            SyncMode::Remote => {
                self.pending_contact_creates += 1;
                MutationOutcome::WriteThrough(WriteThrough::Create {
                    collection: self.namespace.collection(CollectionKind::EmergencyContacts),
                    fields: to_fields(&EmergencyContactFields {
                        name: contact.name,
                        relationship: contact.relationship,
                        phone: contact.phone,
                        email: contact.email,
                    }),
                })
            }
            SyncMode::LocalOnly => {
                self.emergency_contacts.push_local(EmergencyContact {
                    id: ContactId::generate(),
                    name: contact.name,
                    relationship: contact.relationship,
                    phone: contact.phone,
                    email: contact.email,
                });
                MutationOutcome::Local
            }
        }
    }

    /// Removes a contact. In remote mode the local list is filtered right
    /// away for display and the delete is returned for the shell.
    pub fn remove_emergency_contact(&mut self, id: &ContactId) -> MutationOutcome {
        self.emergency_contacts.remove(id.as_str());
        match self.mode {
            SyncMode::Remote => MutationOutcome::WriteThrough(WriteThrough::Delete {
                document: self
                    .namespace
                    .collection(CollectionKind::EmergencyContacts)
                    .document(id.as_str()),
            }),
            SyncMode::LocalOnly => MutationOutcome::Local,
        }
    }

    #[must_use]
    pub fn to_local_snapshot(&self) -> LocalSnapshot {
        LocalSnapshot {
            mood_entries: self.mood_history().to_vec(),
            journal_entries: self.journal().to_vec(),
            emergency_contacts: self.contacts().to_vec(),
            sos_consent: self.sos_consent,
        }
    }

    /// A contacts snapshot reflects every create the shell has applied.
    pub fn contacts_synced(&mut self) {
        self.pending_contact_creates = 0;
    }

    /// A remote contact create failed and will never show up in a snapshot.
    pub fn contact_create_failed(&mut self) {
        self.pending_contact_creates = self.pending_contact_creates.saturating_sub(1);
    }

    pub fn begin_local_load(&mut self) {
        self.local_load_pending = true;
    }

    #[must_use]
    pub fn is_local_load_pending(&self) -> bool {
        self.local_load_pending
    }

    /// Ends a guest snapshot load. Records added while the load was in
    /// flight are kept after the stored ones; contacts beyond `max_contacts`
    /// are dropped. Returns whether anything was added locally meanwhile, in
    /// which case the merged state still has to be saved.
    pub fn finish_local_load(
        &mut self,
        snapshot: Option<LocalSnapshot>,
        max_contacts: usize,
    ) -> bool {
        self.local_load_pending = false;
        let added_meanwhile = !(self.mood_history().is_empty()
            && self.journal().is_empty()
            && self.contacts().is_empty());
        let Some(snapshot) = snapshot else {
            return added_meanwhile;
        };

        let mut moods = snapshot.mood_entries;
        moods.extend_from_slice(self.mood_history());
        let mut journal = snapshot.journal_entries;
        journal.extend_from_slice(self.journal());
        let mut contacts = snapshot.emergency_contacts;
        contacts.extend_from_slice(self.contacts());
        if contacts.len() > max_contacts {
            warn!(
                dropped = contacts.len() - max_contacts,
                "contacts added during restore exceed the cap"
            );
            contacts.truncate(max_contacts);
        }

        self.mood_entries.replace_all(moods);
        self.journal_entries.replace_all(journal);
        self.emergency_contacts.replace_all(contacts);
        self.sos_consent = snapshot.sos_consent;
        added_meanwhile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn contact(name: &str) -> NewEmergencyContact {
        NewEmergencyContact {
            name: name.into(),
            relationship: "Friend".into(),
            phone: "9876543210".into(),
            email: None,
        }
    }

    #[test]
    fn transcript_starts_with_welcome() {
        let store = SessionStore::new(SyncMode::LocalOnly);
        let first = &store.messages()[0];
        assert_eq!(first.id.as_str(), WELCOME_MESSAGE_ID);
        assert_eq!(first.role, Role::Assistant);
        assert!(store.sos_consent);
        assert_eq!(store.active_page, Page::Chat);
    }

    #[test]
    fn added_messages_get_unique_ids() {
        let mut store = SessionStore::new(SyncMode::LocalOnly);
        let a = store.add_message(NewMessage::user("hi")).id.clone();
        let b = store.add_message(NewMessage::user("hi")).id.clone();
        assert_ne!(a, b);
        assert_eq!(store.messages().len(), 3);
    }

    #[test]
    fn feedback_overwrites_and_ignores_unknown_ids() {
        let mut store = SessionStore::new(SyncMode::LocalOnly);
        let id = store
            .add_message(NewMessage::assistant("reply", Some("why".into())))
            .id
            .clone();
        assert!(store.set_feedback(&id, true));
        assert!(store.set_feedback(&id, false));
        assert_eq!(store.messages()[1].is_helpful, Some(false));
        assert!(!store.set_feedback(&MessageId::new("nope"), true));
    }

    #[test]
    fn local_mood_entry_round_trips() {
        let mut store = SessionStore::new(SyncMode::LocalOnly);
        let now = Utc::now();
        let outcome = store.add_mood_entry(
            NewMoodEntry {
                mood_score: MoodScore::new(7).unwrap(),
                tags: vec!["work".into(), "sleep".into()],
                notes: Some("long day".into()),
            },
            now,
        );
        assert_eq!(outcome, MutationOutcome::Local);

        let entry = store.latest_mood().unwrap();
        assert_eq!(entry.mood_score.value(), 7);
        assert_eq!(entry.tags.as_deref(), Some(&["work".to_string(), "sleep".to_string()][..]));
        assert_eq!(entry.notes.as_deref(), Some("long day"));
        assert_eq!(entry.date, now);
        assert!(!entry.date.to_rfc3339().is_empty());
    }

    #[test]
    fn remote_mood_entry_round_trips_through_snapshot() {
        let mut store = SessionStore::new(SyncMode::Remote);
        let changes = store.bind_namespace(Some(&UserId::new("u1")));
        let (mood_sub, _) = changes[0].opened.clone().unwrap();
        let now = Utc::now();

        let outcome = store.add_mood_entry(
            NewMoodEntry {
                mood_score: MoodScore::new(3).unwrap(),
                tags: vec!["family".into()],
                notes: None,
            },
            now,
        );
        assert!(store.mood_history().is_empty());

        let MutationOutcome::WriteThrough(WriteThrough::Create { collection, fields }) = outcome
        else {
            panic!("expected a create");
        };
        assert_eq!(collection.to_string(), "users/u1/moodEntries");
        assert_eq!(fields["moodScore"], json!(3));
        assert!(fields.get("notes").is_none());

        store.mood_entries.apply_snapshot(
            mood_sub,
            &[RemoteDocument {
                id: "srv-1".into(),
                fields,
            }],
        );
        let entry = store.latest_mood().unwrap();
        assert_eq!(entry.id.as_str(), "srv-1");
        assert_eq!(entry.mood_score.value(), 3);
        assert_eq!(entry.tags, Some(vec!["family".to_string()]));
        assert_eq!(entry.date, now);
    }

    #[test]
    fn guest_namespace_is_used_when_signed_out() {
        let mut store = SessionStore::new(SyncMode::Remote);
        let changes = store.bind_namespace(None);
        let paths: Vec<String> = changes
            .iter()
            .filter_map(|c| c.opened.as_ref().map(|(_, p)| p.to_string()))
            .collect();
        assert_eq!(
            paths,
            vec![
                "users/local-user/moodEntries",
                "users/local-user/journalEntries",
                "users/local-user/emergencyContacts",
            ]
        );
    }

    #[test]
    fn local_namespace_switch_empties_collections() {
        let mut store = SessionStore::new(SyncMode::LocalOnly);
        assert!(!store.is_bound_to(None));
        store.bind_namespace(None);
        assert!(store.is_bound_to(None));
        store.add_emergency_contact(contact("Asha"));

        store.bind_namespace(None);
        assert_eq!(store.contacts().len(), 1);
        store.bind_namespace(Some(&UserId::new("u2")));
        assert!(store.contacts().is_empty());
        assert!(!store.is_bound_to(None));
    }

    #[test]
    fn rebinding_retires_previous_subscriptions() {
        let mut store = SessionStore::new(SyncMode::Remote);
        let first = store.bind_namespace(None);
        let second = store.bind_namespace(Some(&UserId::new("u9")));
        for (old, new) in first.iter().zip(&second) {
            assert_eq!(new.retired, old.opened.as_ref().map(|(id, _)| *id));
        }
    }

    #[test]
    fn malformed_remote_mood_score_is_skipped() {
        let mut store = SessionStore::new(SyncMode::Remote);
        let (sub, _) = store.bind_namespace(None)[0].opened.clone().unwrap();
        store.mood_entries.apply_snapshot(
            sub,
            &[RemoteDocument {
                id: "bad".into(),
                fields: json!({ "date": "2024-05-01T10:00:00Z", "moodScore": 42 }),
            }],
        );
        assert!(store.mood_history().is_empty());
    }

    #[test]
    fn remote_contact_removal_is_optimistic() {
        let mut store = SessionStore::new(SyncMode::Remote);
        let changes = store.bind_namespace(Some(&UserId::new("u1")));
        let (sub, _) = changes[2].opened.clone().unwrap();
        store.emergency_contacts.apply_snapshot(
            sub,
            &[RemoteDocument {
                id: "c1".into(),
                fields: json!({ "name": "Asha", "relationship": "Sister", "phone": "9876543210" }),
            }],
        );
        let outcome = store.remove_emergency_contact(&ContactId::new("c1"));
        assert!(store.contacts().is_empty());
        assert_eq!(
            outcome,
            MutationOutcome::WriteThrough(WriteThrough::Delete {
                document: UserNamespace::for_user(Some(&UserId::new("u1")))
                    .collection(CollectionKind::EmergencyContacts)
                    .document("c1"),
            })
        );
    }

    #[test]
    fn switching_to_local_only_retires_subscriptions() {
        let mut store = SessionStore::new(SyncMode::Remote);
        store.bind_namespace(None);
        let changes = store.set_mode(SyncMode::LocalOnly);
        assert!(changes.iter().all(|c| c.retired.is_some() && c.opened.is_none()));
        assert!(store.set_mode(SyncMode::LocalOnly).is_empty());
    }

    #[test]
    fn local_snapshot_restores_collections() {
        let mut store = SessionStore::new(SyncMode::LocalOnly);
        store.add_emergency_contact(contact("Asha"));
        store.add_journal_entry("today".into(), Utc::now());
        store.sos_consent = false;
        let snapshot = store.to_local_snapshot();

        let mut fresh = SessionStore::new(SyncMode::LocalOnly);
        fresh.begin_local_load();
        assert!(!fresh.finish_local_load(Some(snapshot), 3));
        assert_eq!(fresh.contacts().len(), 1);
        assert_eq!(fresh.journal().len(), 1);
        assert!(!fresh.sos_consent);
    }

    #[test]
    fn remote_contact_creates_count_until_synced() {
        let mut store = SessionStore::new(SyncMode::Remote);
        let changes = store.bind_namespace(None);
        let (contacts_sub, _) = changes[2].opened.clone().unwrap();

        store.add_emergency_contact(contact("Asha"));
        store.add_emergency_contact(contact("Ravi"));
        assert!(store.contacts().is_empty());
        assert_eq!(store.contact_count(), 2);

        store.contact_create_failed();
        assert_eq!(store.contact_count(), 1);

        store.emergency_contacts.apply_snapshot(
            contacts_sub,
            &[RemoteDocument {
                id: "c1".into(),
                fields: json!({ "name": "Asha", "relationship": "Friend", "phone": "9876543210" }),
            }],
        );
        store.contacts_synced();
        assert_eq!(store.contact_count(), 1);

        store.contact_create_failed();
        store.contact_create_failed();
        assert_eq!(store.contact_count(), 1);
    }

    #[test]
    fn switching_to_local_only_drops_remote_items() {
        let mut store = SessionStore::new(SyncMode::Remote);
        let changes = store.bind_namespace(None);
        let (contacts_sub, _) = changes[2].opened.clone().unwrap();
        store.emergency_contacts.apply_snapshot(
            contacts_sub,
            &[RemoteDocument {
                id: "c1".into(),
                fields: json!({ "name": "Asha", "relationship": "Friend", "phone": "9876543210" }),
            }],
        );
        store.add_emergency_contact(contact("Ravi"));

        store.set_mode(SyncMode::LocalOnly);
        assert!(store.contacts().is_empty());
        assert_eq!(store.contact_count(), 0);
    }

    #[test]
    fn local_load_merges_stored_items_first() {
        let mut stored = SessionStore::new(SyncMode::LocalOnly);
        stored.add_emergency_contact(contact("Asha"));
        stored.add_emergency_contact(contact("Ravi"));
        stored.add_journal_entry("stored".into(), Utc::now());
        stored.sos_consent = false;
        let snapshot = stored.to_local_snapshot();

        let mut store = SessionStore::new(SyncMode::LocalOnly);
        store.begin_local_load();
        assert!(store.is_local_load_pending());
        store.add_emergency_contact(contact("Meera"));
        store.add_emergency_contact(contact("Kiran"));
        store.add_journal_entry("meanwhile".into(), Utc::now());

        assert!(store.finish_local_load(Some(snapshot), 3));
        assert!(!store.is_local_load_pending());
        let names: Vec<&str> = store.contacts().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Asha", "Ravi", "Meera"]);
        let journal: Vec<&str> = store.journal().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(journal, vec!["stored", "meanwhile"]);
        assert!(!store.sos_consent);
    }

    #[test]
    fn empty_local_load_needs_no_save() {
        let mut store = SessionStore::new(SyncMode::LocalOnly);
        store.begin_local_load();
        assert!(!store.finish_local_load(None, 3));
        assert!(!store.is_local_load_pending());
    }

    #[derive(Debug, Clone)]
    enum ContactOp {
        Add(String),
        Remove(usize),
    }

    fn contact_op() -> impl Strategy<Value = ContactOp> {
        prop_oneof![
            "[A-Za-z]{2,8}".prop_map(ContactOp::Add),
            (0usize..6).prop_map(ContactOp::Remove),
        ]
    }

    proptest! {
        #[test]
        fn contact_sequences_yield_net_effect(ops in prop::collection::vec(contact_op(), 0..20)) {
            let mut store = SessionStore::new(SyncMode::LocalOnly);
            let mut expected: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    ContactOp::Add(name) => {
                        store.add_emergency_contact(contact(&name));
                        expected.push(name);
                    }
                    ContactOp::Remove(index) => {
                        if let Some(existing) = store.contacts().get(index).cloned() {
                            store.remove_emergency_contact(&existing.id);
                            expected.remove(index);
                        }
                    }
                }
            }

            let names: Vec<String> = store.contacts().iter().map(|c| c.name.clone()).collect();
            prop_assert_eq!(names, expected);
        }
    }
}
