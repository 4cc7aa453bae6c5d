use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::breathing::BreathingExercise;
use crate::capabilities::{AuthUser, Timers};
use crate::config::AppConfig;
use crate::crisis::CrisisDetector;
use crate::flows::MoodInsights;
use crate::sos::VitalsMonitor;
use crate::store::SessionStore;
use crate::sync::DiagnosticsChannel;
use crate::validation::MoodScore;
use crate::{AppError, ToastKind, ToastMessage};

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(UserId);
typed_id!(MessageId);
typed_id!(EntryId);
typed_id!(ContactId);

// --- Chat ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub rationale: Option<String>,
    pub is_helpful: Option<bool>,
}

/// A message before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub rationale: Option<String>,
}

impl NewMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            rationale: None,
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>, rationale: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            rationale,
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            rationale: None,
        }
    }
}

// Redact debug output because this carries what the person wrote.
impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("content_len", &self.content.len())
            .field("rationale_present", &self.rationale.is_some())
            .field("is_helpful", &self.is_helpful)
            .finish()
    }
}

// --- Mood ---

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoodEntry {
    pub id: EntryId,
    pub date: DateTime<Utc>,
    pub mood_score: MoodScore,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMoodEntry {
    pub mood_score: MoodScore,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

impl fmt::Debug for MoodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoodEntry")
            .field("id", &self.id)
            .field("date", &self.date)
            .field("mood_score", &self.mood_score)
            .field("tag_count", &self.tags.as_ref().map_or(0, Vec::len))
            .field("notes_present", &self.notes.is_some())
            .finish()
    }
}

/// Working state of the mood logger before it is saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoodDraft {
    pub mood_score: MoodScore,
    pub tags: Vec<String>,
    pub notes: String,
}

impl MoodDraft {
    /// Adds a tag unless an identical one is already present.
    pub fn add_tag(&mut self, tag: String) -> bool {
        if self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    pub fn merge_tags(&mut self, suggested: impl IntoIterator<Item = String>) {
        for tag in suggested {
            self.add_tag(tag);
        }
    }

    #[must_use]
    pub fn to_entry(&self) -> NewMoodEntry {
        let notes = self.notes.trim();
        NewMoodEntry {
            mood_score: self.mood_score,
            tags: self.tags.clone(),
            notes: (!notes.is_empty()).then(|| notes.to_string()),
        }
    }
}

// --- Journal ---

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: EntryId,
    pub date: DateTime<Utc>,
    pub content: String,
}

impl fmt::Debug for JournalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JournalEntry")
            .field("id", &self.id)
            .field("date", &self.date)
            .field("content_len", &self.content.len())
            .finish()
    }
}

// --- Emergency contacts ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencyContact {
    pub id: ContactId,
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub email: Option<String>,
}

// --- Navigation & auth ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Chat,
    Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthState {
    #[default]
    Loading,
    SignedOut,
    SignedIn(AuthUser),
}

impl AuthState {
    #[must_use]
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::Loading | Self::SignedOut => None,
        }
    }
}

/// What the chat is waiting on after a user message was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReply {
    Assistant { request_id: u64 },
    CrisisPause,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowActivity {
    pub insights: bool,
    pub summary: bool,
    pub tags: bool,
}

pub struct Model {
    pub config: AppConfig,
    pub auth: AuthState,
    pub auth_pending: bool,
    pub store: SessionStore,
    pub diagnostics: DiagnosticsChannel,
    pub crisis: CrisisDetector,
    pub crisis_list_locked: bool,

    pub pending_reply: Option<PendingReply>,
    pub next_request_id: u64,

    pub mood_draft: MoodDraft,
    pub mood_insights: Option<MoodInsights>,
    pub showing_insights: bool,
    pub journal_summary: Option<String>,
    pub flows: FlowActivity,

    pub vitals: VitalsMonitor,
    pub rng: StdRng,
    pub breathing: BreathingExercise,
    pub timers: Timers,

    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
}

impl Default for Model {
    fn default() -> Self {
        let config = AppConfig::default();
        Self {
            vitals: VitalsMonitor::new(config.simulator_settings()),
            rng: StdRng::from_entropy(),
            store: SessionStore::new(config.sync_mode()),
            config,
            auth: AuthState::Loading,
            auth_pending: false,
            diagnostics: DiagnosticsChannel::default(),
            crisis: CrisisDetector::bundled(),
            crisis_list_locked: false,
            pending_reply: None,
            next_request_id: 1,
            mood_draft: MoodDraft::default(),
            mood_insights: None,
            showing_insights: false,
            journal_summary: None,
            flows: FlowActivity::default(),
            breathing: BreathingExercise::default(),
            timers: Timers::default(),
            active_error: None,
            active_toast: None,
        }
    }
}

impl Model {
    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, toast: ToastMessage) {
        self.active_toast = Some(toast);
    }

    pub fn toast_with(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        kind: ToastKind,
    ) {
        self.show_toast(ToastMessage::new(title, kind).with_description(description));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }

    pub fn expire_toast(&mut self, now_ms: u64) {
        if self.active_toast.as_ref().is_some_and(|t| t.is_expired(now_ms)) {
            self.active_toast = None;
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth.user().is_some()
    }

    #[must_use]
    pub fn is_replying(&self) -> bool {
        self.pending_reply.is_some()
    }

    pub fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_ids_are_unique() {
        assert_ne!(MessageId::generate(), MessageId::generate());
        assert_eq!(EntryId::new("abc").to_string(), "abc");
    }

    #[test]
    fn draft_tags_are_deduplicated() {
        let mut draft = MoodDraft::default();
        assert!(draft.add_tag("work".into()));
        assert!(!draft.add_tag("work".into()));
        draft.merge_tags(vec!["sleep".to_string(), "work".to_string()]);
        assert_eq!(draft.tags, vec!["work", "sleep"]);
        draft.remove_tag("work");
        assert_eq!(draft.tags, vec!["sleep"]);
    }

    #[test]
    fn draft_blank_notes_become_none() {
        let draft = MoodDraft {
            notes: "   ".into(),
            ..MoodDraft::default()
        };
        assert_eq!(draft.to_entry().notes, None);
    }

    #[test]
    fn message_debug_hides_content() {
        let msg = Message {
            id: MessageId::new("m1"),
            role: Role::User,
            content: "something private".into(),
            rationale: None,
            is_helpful: None,
        };
        let rendered = format!("{msg:?}");
        assert!(!rendered.contains("private"));
        assert!(rendered.contains("content_len"));
    }

    #[test]
    fn default_model_starts_loading_with_welcome() {
        let model = Model::default();
        assert_eq!(model.auth, AuthState::Loading);
        assert_eq!(model.store.messages().len(), 1);
        assert!(!model.is_replying());
    }

    #[test]
    fn request_ids_increase() {
        let mut model = Model::default();
        let a = model.next_request_id();
        let b = model.next_request_id();
        assert!(b > a);
    }
}
