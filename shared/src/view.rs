//! Serializable projection of the model for the shells.

use serde::{Deserialize, Serialize};

use crate::breathing::BreathingPhase;
use crate::flows::MoodInsights;
use crate::model::{AuthState, EmergencyContact, JournalEntry, Message, Model, MoodEntry, Page};
use crate::sos::{SosPhase, Vitals};
use crate::sync::PermissionError;
use crate::{AppError, ToastMessage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFacingError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&AppError> for UserFacingError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.user_facing_message(),
            retryable: err.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthView {
    Loading,
    SignedOut,
    SignedIn {
        uid: String,
        display_name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionView<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<UserFacingError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodView {
    pub score: u8,
    pub tags: Vec<String>,
    pub notes: String,
    pub history: CollectionView<MoodEntry>,
    pub insights: Option<MoodInsights>,
    pub showing_insights: bool,
    pub loading_insights: bool,
    pub suggesting_tags: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalView {
    pub entries: CollectionView<JournalEntry>,
    pub summary: Option<String>,
    pub summarizing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosView {
    pub consent: bool,
    pub vitals: Vitals,
    pub heart_rate_alarming: bool,
    pub spo2_alarming: bool,
    pub phase: SosPhase,
    pub alert_message: Option<String>,
    pub contacts: CollectionView<EmergencyContact>,
    pub can_add_contact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathingView {
    pub running: bool,
    pub label: Option<String>,
    pub moving: bool,
    pub completed_cycles: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub auth: AuthView,
    pub auth_pending: bool,
    pub page: Page,
    pub messages: Vec<Message>,
    pub is_replying: bool,
    pub mood: MoodView,
    pub journal: JournalView,
    pub sos: SosView,
    pub breathing: BreathingView,
    pub toast: Option<ToastMessage>,
    pub error: Option<UserFacingError>,
    /// Empty unless developer diagnostics are enabled.
    pub diagnostics: Vec<String>,
}

fn collection_error(err: Option<&PermissionError>) -> Option<UserFacingError> {
    err.map(|e| UserFacingError::from(&AppError::from(e)))
}

impl ViewModel {
    #[must_use]
    pub fn from_model(model: &Model) -> Self {
        let store = &model.store;
        let auth = match &model.auth {
            AuthState::Loading => AuthView::Loading,
            AuthState::SignedOut => AuthView::SignedOut,
            AuthState::SignedIn(user) => AuthView::SignedIn {
                uid: user.uid.to_string(),
                display_name: user.display_name.clone(),
            },
        };

        let alert_message = match model.vitals.phase() {
            SosPhase::Alerting { reason, .. } => Some(reason.description().to_string()),
            SosPhase::Monitoring | SosPhase::Escalating => None,
        };

        let phase = model.breathing.phase();

        Self {
            auth,
            auth_pending: model.auth_pending,
            page: store.active_page,
            messages: store.messages().to_vec(),
            is_replying: model.is_replying(),
            mood: MoodView {
                score: model.mood_draft.mood_score.value(),
                tags: model.mood_draft.tags.clone(),
                notes: model.mood_draft.notes.clone(),
                history: CollectionView {
                    items: store.mood_history().to_vec(),
                    loading: store.mood_entries.is_loading(),
                    error: collection_error(store.mood_entries.error()),
                },
                insights: model.mood_insights.clone(),
                showing_insights: model.showing_insights,
                loading_insights: model.flows.insights,
                suggesting_tags: model.flows.tags,
            },
            journal: JournalView {
                entries: CollectionView {
                    items: store.journal().to_vec(),
                    loading: store.journal_entries.is_loading(),
                    error: collection_error(store.journal_entries.error()),
                },
                summary: model.journal_summary.clone(),
                summarizing: model.flows.summary,
            },
            sos: SosView {
                consent: store.sos_consent,
                vitals: model.vitals.vitals(),
                heart_rate_alarming: model.vitals.heart_rate_alarming(),
                spo2_alarming: model.vitals.spo2_alarming(),
                phase: model.vitals.phase(),
                alert_message,
                contacts: CollectionView {
                    items: store.contacts().to_vec(),
                    loading: store.emergency_contacts.is_loading(),
                    error: collection_error(store.emergency_contacts.error()),
                },
                can_add_contact: store.contact_count() < model.config.max_emergency_contacts,
            },
            breathing: BreathingView {
                running: model.breathing.is_running(),
                label: phase.map(|p| p.label().to_string()),
                moving: phase.is_some_and(BreathingPhase::is_moving),
                completed_cycles: model.breathing.completed_cycles(),
            },
            toast: model.active_toast.clone(),
            error: model.active_error.as_ref().map(UserFacingError::from),
            diagnostics: if model.config.developer_diagnostics {
                model.diagnostics.entries().map(ToString::to_string).collect()
            } else {
                Vec::new()
            },
        }
    }
}
