use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{AuthAction, AuthOutput, AuthUser, Coordinates, LocationFailure, Secret, TimerId, TimerOutput};
use crate::config::AppConfig;
use crate::flows::{ConversationReply, FlowError, JournalSummary, MoodInsights, TagSuggestion};
use crate::model::{ContactId, MessageId, Page};
use crate::sos::{AlertResponse, Vitals};
use crate::sync::{CollectionKind, RemoteDocument, RuleOperation, StoreFailure, SubscriptionId, WriteFailure};

/// Raw emergency contact form input, validated in `update`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct ContactForm {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub email: Option<String>,
}

impl fmt::Debug for ContactForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactForm")
            .field("name_len", &self.name.len())
            .field("relationship", &self.relationship)
            .field("email_present", &self.email.is_some())
            .finish_non_exhaustive()
    }
}

// --- Event enum: large variants boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Startup & configuration
    Configure(Box<AppConfig>),
    CrisisKeywordsLoaded(String),
    AppStarted,

    // Auth
    AuthStateChanged(Option<Box<AuthUser>>),
    SignInRequested {
        email: String,
        password: Secret,
    },
    SignUpRequested {
        name: String,
        email: String,
        password: Secret,
    },
    SignOutRequested,
    AuthResponse {
        action: AuthAction,
        output: Box<AuthOutput>,
    },

    // Settings
    NavigateTo(Page),
    SosConsentChanged(bool),

    // Chat
    SendMessage(String),
    ChatReplyReceived {
        request_id: u64,
        result: Box<Result<ConversationReply, FlowError>>,
    },
    FeedbackGiven {
        message_id: MessageId,
        is_helpful: bool,
    },

    // Mood logger
    MoodScoreChanged(u8),
    MoodTagAdded(String),
    MoodTagRemoved(String),
    MoodNotesChanged(String),
    LogMoodRequested,
    SuggestTagsRequested,
    TagsSuggested(Box<Result<TagSuggestion, FlowError>>),
    InsightsRequested,
    InsightsReceived(Box<Result<MoodInsights, FlowError>>),
    InsightsClosed,

    // Journal
    SaveJournalEntry(String),
    SummarizeJournalRequested,
    JournalSummaryReceived(Box<Result<JournalSummary, FlowError>>),

    // Emergency contacts
    AddEmergencyContact(Box<ContactForm>),
    RemoveEmergencyContact(ContactId),

    // Remote sync (pushed by the shell or answered by Documents)
    SnapshotReceived {
        subscription: SubscriptionId,
        documents: Vec<RemoteDocument>,
    },
    SubscriptionFailed {
        subscription: SubscriptionId,
        failure: StoreFailure,
    },
    WriteCompleted {
        collection: CollectionKind,
        operation: RuleOperation,
    },
    WriteFailed(Box<WriteFailure>),

    // Guest snapshot
    GuestSnapshotLoaded(Result<Option<Vec<u8>>, String>),
    GuestSnapshotSaved(Result<(), String>),

    // Timers
    TimerFired {
        id: TimerId,
        output: TimerOutput,
    },

    // Vitals & SOS
    VitalsReported(Vitals),
    AlertAcknowledged(AlertResponse),
    LocationResolved(Result<Coordinates, LocationFailure>),

    // Breathing exercise
    BreathingStarted,
    BreathingStopped,

    // UI housekeeping
    DismissToast,
    DismissError,
    ClearDiagnostics,
}

impl Event {
    /// Variant name, safe to log: never includes payloads.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "Configure",
            Self::CrisisKeywordsLoaded(_) => "CrisisKeywordsLoaded",
            Self::AppStarted => "AppStarted",
            Self::AuthStateChanged(_) => "AuthStateChanged",
            Self::SignInRequested { .. } => "SignInRequested",
            Self::SignUpRequested { .. } => "SignUpRequested",
            Self::SignOutRequested => "SignOutRequested",
            Self::AuthResponse { .. } => "AuthResponse",
            Self::NavigateTo(_) => "NavigateTo",
            Self::SosConsentChanged(_) => "SosConsentChanged",
            Self::SendMessage(_) => "SendMessage",
            Self::ChatReplyReceived { .. } => "ChatReplyReceived",
            Self::FeedbackGiven { .. } => "FeedbackGiven",
            Self::MoodScoreChanged(_) => "MoodScoreChanged",
            Self::MoodTagAdded(_) => "MoodTagAdded",
            Self::MoodTagRemoved(_) => "MoodTagRemoved",
            Self::MoodNotesChanged(_) => "MoodNotesChanged",
            Self::LogMoodRequested => "LogMoodRequested",
            Self::SuggestTagsRequested => "SuggestTagsRequested",
            Self::TagsSuggested(_) => "TagsSuggested",
            Self::InsightsRequested => "InsightsRequested",
            Self::InsightsReceived(_) => "InsightsReceived",
            Self::InsightsClosed => "InsightsClosed",
            Self::SaveJournalEntry(_) => "SaveJournalEntry",
            Self::SummarizeJournalRequested => "SummarizeJournalRequested",
            Self::JournalSummaryReceived(_) => "JournalSummaryReceived",
            Self::AddEmergencyContact(_) => "AddEmergencyContact",
            Self::RemoveEmergencyContact(_) => "RemoveEmergencyContact",
            Self::SnapshotReceived { .. } => "SnapshotReceived",
            Self::SubscriptionFailed { .. } => "SubscriptionFailed",
            Self::WriteCompleted { .. } => "WriteCompleted",
            Self::WriteFailed(_) => "WriteFailed",
            Self::GuestSnapshotLoaded(_) => "GuestSnapshotLoaded",
            Self::GuestSnapshotSaved(_) => "GuestSnapshotSaved",
            Self::TimerFired { .. } => "TimerFired",
            Self::VitalsReported(_) => "VitalsReported",
            Self::AlertAcknowledged(_) => "AlertAcknowledged",
            Self::LocationResolved(_) => "LocationResolved",
            Self::BreathingStarted => "BreathingStarted",
            Self::BreathingStopped => "BreathingStopped",
            Self::DismissToast => "DismissToast",
            Self::DismissError => "DismissError",
            Self::ClearDiagnostics => "ClearDiagnostics",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_are_redacted_in_debug() {
        let event = Event::SignInRequested {
            email: "m@example.com".into(),
            password: Secret::from(&crate::validation::Password::new("hunter22")),
        };
        let rendered = format!("{event:?}");
        assert!(!rendered.contains("hunter22"));
        assert_eq!(event.name(), "SignInRequested");
    }

    #[test]
    fn contact_form_debug_hides_phone() {
        let form = ContactForm {
            name: "Asha".into(),
            relationship: "Sister".into(),
            phone: "9876543210".into(),
            email: None,
        };
        assert!(!format!("{form:?}").contains("9876543210"));
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = Event::FeedbackGiven {
            message_id: MessageId::new("m1"),
            is_helpful: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(serde_json::from_str::<Event>(&json).unwrap(), event);
    }

    #[test]
    fn event_size_is_reasonable() {
        // Ensure boxing keeps the enum small.
        let size = std::mem::size_of::<Event>();
        assert!(
            size <= 128,
            "Event enum is {} bytes, too large, box more variants",
            size
        );
    }
}
