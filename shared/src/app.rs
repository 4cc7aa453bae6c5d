//! The Crux app: every state change happens in [`App::update`].

use chrono::Utc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::capabilities::{
    load_guest_snapshot, run_flow, save_guest_snapshot, AuthAction, AuthOutput, AuthUser,
    Capabilities, Coordinates, LocationFailure, Secret, TimerId, TimerOutput, TimerPurpose,
};
use crate::config::AppConfig;
use crate::crisis::{CrisisDetector, CRISIS_RESOURCES};
use crate::event::{ContactForm, Event};
use crate::flows::{
    ConversationInput, ConversationReply, FlowError, JournalSummary, JournalSummaryInput,
    MoodInsights, MoodInsightsInput, TagSuggestion, TagSuggestionInput,
};
use crate::model::{
    AuthState, ContactId, Model, MoodDraft, NewEmergencyContact, NewMessage, PendingReply,
    UserId,
};
use crate::offline_store::LocalSnapshot;
use crate::sos::{AckOutcome, AlertResponse, CountdownStep, EscalationStep, Vitals};
use crate::store::{MutationOutcome, SyncMode, WriteThrough};
use crate::sync::{
    CollectionKind, RemoteDocument, RuleOperation, SnapshotOutcome, StoreFailure, SubscriptionId,
    WriteFailure,
};
use crate::validation::{self, Email, MoodScore, Password, ValidationError};
use crate::view::ViewModel;
use crate::{
    current_time_ms, AppError, ErrorKind, ToastKind, FALLBACK_REPLY, MAX_JOURNAL_ENTRY_LENGTH,
    MAX_MESSAGE_LENGTH, SOS_COUNTDOWN_STEP,
};

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(event = event.name(), "update");
        model.expire_toast(current_time_ms());

        match event {
            Event::Configure(config) => configure(*config, model, caps),
            Event::CrisisKeywordsLoaded(raw) => load_crisis_keywords(&raw, model),
            Event::AppStarted => {
                info!("app started");
                let user = model.auth.user().map(|u| u.uid.clone());
                bind_namespace(user.as_ref(), model, caps);
                sync_vitals_loop(model, caps);
            }

            Event::AuthStateChanged(user) => set_user(user.map(|u| *u), model, caps),
            Event::SignInRequested { email, password } => sign_in(&email, &password, model, caps),
            Event::SignUpRequested {
                name,
                email,
                password,
            } => sign_up(&name, &email, &password, model, caps),
            Event::SignOutRequested => {
                model.auth_pending = true;
                caps.auth.sign_out(|output| Event::AuthResponse {
                    action: AuthAction::SignOut,
                    output: Box::new(output),
                });
            }
            Event::AuthResponse { action, output } => auth_response(action, *output, model, caps),

            Event::NavigateTo(page) => model.store.active_page = page,
            Event::SosConsentChanged(enabled) => {
                info!(enabled, "SOS consent changed");
                model.store.sos_consent = enabled;
                sync_vitals_loop(model, caps);
                persist_guest_snapshot(model, caps);
            }

            Event::SendMessage(text) => send_message(&text, model, caps),
            Event::ChatReplyReceived { request_id, result } => {
                chat_reply(request_id, *result, model);
            }
            Event::FeedbackGiven {
                message_id,
                is_helpful,
            } => {
                model.store.set_feedback(&message_id, is_helpful);
            }

            Event::MoodScoreChanged(score) => match MoodScore::new(score) {
                Ok(score) => model.mood_draft.mood_score = score,
                Err(e) => warn!(%e, "ignoring mood score"),
            },
            Event::MoodTagAdded(raw) => match validation::tag(&raw) {
                Ok(tag) => {
                    model.mood_draft.add_tag(tag);
                }
                Err(e) => debug!(%e, "ignoring tag"),
            },
            Event::MoodTagRemoved(tag) => model.mood_draft.remove_tag(&tag),
            Event::MoodNotesChanged(notes) => model.mood_draft.notes = notes,
            Event::LogMoodRequested => log_mood(model, caps),
            Event::SuggestTagsRequested => suggest_tags(model, caps),
            Event::TagsSuggested(result) => tags_suggested(*result, model),
            Event::InsightsRequested => request_insights(model, caps),
            Event::InsightsReceived(result) => insights_received(*result, model),
            Event::InsightsClosed => model.showing_insights = false,

            Event::SaveJournalEntry(text) => save_journal_entry(&text, model, caps),
            Event::SummarizeJournalRequested => summarize_journal(model, caps),
            Event::JournalSummaryReceived(result) => journal_summary_received(*result, model),

            Event::AddEmergencyContact(form) => add_contact(&form, model, caps),
            Event::RemoveEmergencyContact(id) => remove_contact(&id, model, caps),

            Event::SnapshotReceived {
                subscription,
                documents,
            } => apply_snapshot(subscription, &documents, model),
            Event::SubscriptionFailed {
                subscription,
                failure,
            } => apply_subscription_failure(subscription, &failure, model),
            Event::WriteCompleted {
                collection,
                operation,
            } => debug!(%collection, ?operation, "write-through completed"),
            Event::WriteFailed(failure) => write_failed(&failure, model),

            Event::GuestSnapshotLoaded(result) => guest_snapshot_loaded(result, model, caps),
            Event::GuestSnapshotSaved(result) => match result {
                Ok(()) => debug!("guest snapshot saved"),
                Err(e) => {
                    error!(error = %e, "guest snapshot could not be saved");
                    model.set_error(
                        AppError::new(
                            ErrorKind::Storage,
                            "Your changes could not be saved on this device",
                        )
                        .with_internal(e),
                    );
                }
            },

            Event::TimerFired { id, output } => timer_fired(id, output, model, caps),

            Event::VitalsReported(vitals) => vitals_reported(vitals, model, caps),
            Event::AlertAcknowledged(response) => acknowledge_alert(response, model, caps),
            Event::LocationResolved(location) => location_resolved(location, model),

            Event::BreathingStarted => {
                model.breathing.start();
                let after = model.config.breathing_phase();
                start_timer(TimerPurpose::BreathingPhase, after, model, caps);
            }
            Event::BreathingStopped => {
                model.breathing.stop();
                stop_timer(TimerPurpose::BreathingPhase, model, caps);
            }

            Event::DismissToast => model.clear_toast(),
            Event::DismissError => model.clear_error(),
            Event::ClearDiagnostics => model.diagnostics.clear(),
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from_model(model)
    }
}

// --- Configuration ---

fn configure(config: AppConfig, model: &mut Model, caps: &Capabilities) {
    if let Err(e) = config.validate() {
        error!(%e, "rejecting configuration; keeping the previous one");
        model.set_error(
            AppError::new(ErrorKind::Validation, "Invalid configuration")
                .with_internal(e.to_string()),
        );
        return;
    }

    info!(
        remote_sync = config.remote_sync,
        flows = config.flow_base_url.is_some(),
        "configuration applied"
    );
    let mode = config.sync_mode();
    model.vitals.set_settings(config.simulator_settings());
    model.config = config;

    let switched = mode != model.store.mode();
    for change in model.store.set_mode(mode) {
        caps.documents.apply(change);
    }
    let bound = model.store.is_bound_to(current_uid(model).as_ref());
    if switched && mode == SyncMode::LocalOnly && bound {
        request_guest_snapshot(model, caps);
    }
}

fn load_crisis_keywords(raw: &str, model: &mut Model) {
    if model.crisis_list_locked {
        warn!("crisis keywords already loaded; ignoring replacement");
        return;
    }
    model.crisis_list_locked = true;
    match CrisisDetector::from_json(raw) {
        Ok(detector) => {
            info!(terms = detector.terms().len(), "crisis keywords loaded");
            model.crisis = detector;
        }
        Err(e) => error!(%e, "keeping bundled crisis keywords"),
    }
}

// --- Auth & namespace binding ---

fn current_uid(model: &Model) -> Option<UserId> {
    model.auth.user().map(|u| u.uid.clone())
}

fn bind_namespace(user: Option<&UserId>, model: &mut Model, caps: &Capabilities) {
    if model.store.is_bound_to(user) {
        return;
    }
    for change in model.store.bind_namespace(user) {
        caps.documents.apply(change);
    }
    if model.store.mode() == SyncMode::LocalOnly {
        request_guest_snapshot(model, caps);
    }
}

fn set_user(user: Option<AuthUser>, model: &mut Model, caps: &Capabilities) {
    let uid = user.as_ref().map(|u| u.uid.clone());
    debug!(signed_in = uid.is_some(), "auth state changed");
    model.auth_pending = false;
    model.auth = match user {
        Some(user) => AuthState::SignedIn(user),
        None => AuthState::SignedOut,
    };
    bind_namespace(uid.as_ref(), model, caps);
}

fn sign_in(email: &str, password: &Secret, model: &mut Model, caps: &Capabilities) {
    let password = Password::new(password.expose());
    let email = match Email::new(email).and_then(|email| password.validate().map(|()| email)) {
        Ok(email) => email,
        Err(e) => {
            model.toast_with("Login Failed", e.to_string(), ToastKind::Error);
            return;
        }
    };
    model.auth_pending = true;
    caps.auth.sign_in(&email, &password, |output| Event::AuthResponse {
        action: AuthAction::SignIn,
        output: Box::new(output),
    });
}

fn sign_up(name: &str, email: &str, password: &Secret, model: &mut Model, caps: &Capabilities) {
    let password = Password::new(password.expose());
    let validated = validation::display_name(name).and_then(|name| {
        let email = Email::new(email)?;
        password.validate()?;
        Ok((name, email))
    });
    let (name, email) = match validated {
        Ok(valid) => valid,
        Err(e) => {
            model.toast_with("Registration Failed", e.to_string(), ToastKind::Error);
            return;
        }
    };
    model.auth_pending = true;
    caps.auth.sign_up(name, &email, &password, |output| Event::AuthResponse {
        action: AuthAction::SignUp,
        output: Box::new(output),
    });
}

fn auth_response(action: AuthAction, output: AuthOutput, model: &mut Model, caps: &Capabilities) {
    model.auth_pending = false;
    match (action, output) {
        (AuthAction::SignIn, AuthOutput::SignedIn(user)) => {
            info!("signed in");
            set_user(Some(user), model, caps);
            model.toast_with("Login Successful", "Welcome back!", ToastKind::Success);
        }
        (AuthAction::SignUp, AuthOutput::SignedIn(user)) => {
            info!("registered");
            set_user(Some(user), model, caps);
            model.toast_with(
                "Registration Successful",
                "Welcome to SupportBot!",
                ToastKind::Success,
            );
        }
        (AuthAction::SignOut, AuthOutput::SignedOut) => {
            info!("signed out");
            set_user(None, model, caps);
        }
        (action, AuthOutput::Failed(failure)) => {
            warn!(?action, code = %failure.code, "auth request failed");
            let title = match action {
                AuthAction::SignIn => "Login Failed",
                AuthAction::SignUp => "Registration Failed",
                AuthAction::SignOut => "Sign Out Failed",
            };
            model.toast_with(title, failure.message, ToastKind::Error);
        }
        (action, output) => warn!(?action, ?output, "unexpected auth response"),
    }
}

// --- Chat ---

fn send_message(text: &str, model: &mut Model, caps: &Capabilities) {
    if model.is_replying() {
        debug!("reply pending; ignoring send");
        return;
    }
    let text = match validation::non_blank(text, MAX_MESSAGE_LENGTH) {
        Ok(text) => text.to_string(),
        Err(ValidationError::EmptyText) => return,
        Err(e) => {
            model.toast_with("Message not sent", e.to_string(), ToastKind::Error);
            return;
        }
    };

    model.store.add_message(NewMessage::user(text.clone()));

    if model.crisis.is_crisis(&text) {
        info!("crisis keywords detected; showing resources instead of an assistant reply");
        model.pending_reply = Some(PendingReply::CrisisPause);
        let pause = model.config.crisis_pause();
        start_timer(TimerPurpose::CrisisPause, pause, model, caps);
        return;
    }

    let request_id = model.next_request_id();
    let input = ConversationInput::new(text, model.store.latest_mood());
    model.pending_reply = Some(PendingReply::Assistant { request_id });
    let endpoint = model.config.flow_endpoint();
    if let Err(e) = run_flow(&caps.http, endpoint.as_ref(), &input, move |result| {
        Event::ChatReplyReceived {
            request_id,
            result: Box::new(result),
        }
    }) {
        chat_failed(&e, model);
    }
}

fn chat_reply(request_id: u64, result: Result<ConversationReply, FlowError>, model: &mut Model) {
    if model.pending_reply != Some(PendingReply::Assistant { request_id }) {
        warn!(request_id, "ignoring stale assistant reply");
        return;
    }
    match result {
        Ok(reply) => {
            model.pending_reply = None;
            let rationale = (!reply.rationale.trim().is_empty()).then_some(reply.rationale);
            model
                .store
                .add_message(NewMessage::assistant(reply.response, rationale));
        }
        Err(e) => chat_failed(&e, model),
    }
}

fn chat_failed(err: &FlowError, model: &mut Model) {
    error!(error = %err, "conversation flow failed");
    model.pending_reply = None;
    model.store.add_message(NewMessage::assistant(FALLBACK_REPLY, None));
    model.toast_with(
        "Oh no! Something went wrong.",
        "There was a problem communicating with the AI. Please try again.",
        ToastKind::Error,
    );
}

// --- Mood ---

fn log_mood(model: &mut Model, caps: &Capabilities) {
    let len = model.mood_draft.notes.len();
    if len > MAX_JOURNAL_ENTRY_LENGTH {
        let e = ValidationError::TooLong {
            len,
            max: MAX_JOURNAL_ENTRY_LENGTH,
        };
        model.toast_with("Notes are too long", e.to_string(), ToastKind::Error);
        return;
    }
    let entry = model.mood_draft.to_entry();
    let outcome = model.store.add_mood_entry(entry, Utc::now());
    apply_mutation(outcome, model, caps);
    model.mood_draft = MoodDraft::default();
    model.toast_with("Mood logged", "Your mood has been saved for today.", ToastKind::Success);
}

fn suggest_tags(model: &mut Model, caps: &Capabilities) {
    if model.flows.tags {
        return;
    }
    let notes = model.mood_draft.notes.trim();
    if notes.is_empty() {
        model.toast_with(
            "Notes are empty",
            "Please write some notes to get tag suggestions.",
            ToastKind::Error,
        );
        return;
    }
    let input = TagSuggestionInput {
        text: notes.to_string(),
    };
    model.flows.tags = true;
    let endpoint = model.config.flow_endpoint();
    if let Err(e) = run_flow(&caps.http, endpoint.as_ref(), &input, |result| {
        Event::TagsSuggested(Box::new(result))
    }) {
        tags_suggested(Err(e), model);
    }
}

fn tags_suggested(result: Result<TagSuggestion, FlowError>, model: &mut Model) {
    model.flows.tags = false;
    match result {
        Ok(suggestion) => {
            model.mood_draft.merge_tags(suggestion.cleaned());
            model.toast_with(
                "Tags suggested",
                "We've added some suggestions based on your notes.",
                ToastKind::Success,
            );
        }
        Err(e) => flow_failed("Failed to suggest tags", &e, model),
    }
}

fn request_insights(model: &mut Model, caps: &Capabilities) {
    if model.flows.insights {
        return;
    }
    let Some(input) = MoodInsightsInput::from_history(model.store.mood_history()) else {
        model.toast_with(
            "No mood history",
            "Log your mood to get weekly insights.",
            ToastKind::Error,
        );
        return;
    };
    model.flows.insights = true;
    let endpoint = model.config.flow_endpoint();
    if let Err(e) = run_flow(&caps.http, endpoint.as_ref(), &input, |result| {
        Event::InsightsReceived(Box::new(result))
    }) {
        insights_received(Err(e), model);
    }
}

fn insights_received(result: Result<MoodInsights, FlowError>, model: &mut Model) {
    model.flows.insights = false;
    match result {
        Ok(insights) => {
            model.mood_insights = Some(insights);
            model.showing_insights = true;
        }
        Err(e) => flow_failed("Failed to get insights", &e, model),
    }
}

fn flow_failed(title: &str, err: &FlowError, model: &mut Model) {
    error!(error = %err, "{title}");
    let description = AppError::from(err).user_facing_message();
    model.toast_with(title, description, ToastKind::Error);
}

// --- Journal ---

fn save_journal_entry(text: &str, model: &mut Model, caps: &Capabilities) {
    let content = match validation::non_blank(text, MAX_JOURNAL_ENTRY_LENGTH) {
        Ok(content) => content.to_string(),
        Err(ValidationError::EmptyText) => {
            model.toast_with(
                "Empty Entry",
                "Please write something before saving.",
                ToastKind::Error,
            );
            return;
        }
        Err(e) => {
            model.toast_with("Entry too long", e.to_string(), ToastKind::Error);
            return;
        }
    };
    let outcome = model.store.add_journal_entry(content, Utc::now());
    apply_mutation(outcome, model, caps);
    model.toast_with(
        "Journal Entry Saved",
        "Your thoughts have been recorded.",
        ToastKind::Success,
    );
}

fn summarize_journal(model: &mut Model, caps: &Capabilities) {
    if model.flows.summary {
        return;
    }
    let Some(input) = JournalSummaryInput::from_entries(model.store.journal()) else {
        model.toast_with(
            "No Entries",
            "There are no journal entries to summarize.",
            ToastKind::Error,
        );
        return;
    };
    model.flows.summary = true;
    model.journal_summary = None;
    let endpoint = model.config.flow_endpoint();
    if let Err(e) = run_flow(&caps.http, endpoint.as_ref(), &input, |result| {
        Event::JournalSummaryReceived(Box::new(result))
    }) {
        journal_summary_received(Err(e), model);
    }
}

fn journal_summary_received(result: Result<JournalSummary, FlowError>, model: &mut Model) {
    model.flows.summary = false;
    match result {
        Ok(summary) => model.journal_summary = Some(summary.summary),
        Err(e) => {
            error!(error = %e, "journal summary failed");
            model.toast_with(
                "Summarization Failed",
                "Could not generate a summary at this time.",
                ToastKind::Error,
            );
        }
    }
}

// --- Emergency contacts ---

fn validate_contact(form: &ContactForm) -> Result<NewEmergencyContact, ValidationError> {
    let email = match form.email.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(Email::new(raw)?.as_str().to_string()),
        _ => None,
    };
    Ok(NewEmergencyContact {
        name: validation::display_name(&form.name)?,
        relationship: validation::relationship(&form.relationship)?,
        phone: validation::phone(&form.phone)?,
        email,
    })
}

fn add_contact(form: &ContactForm, model: &mut Model, caps: &Capabilities) {
    let max = model.config.max_emergency_contacts;
    if model.store.contact_count() >= max {
        model.toast_with(
            "Limit Reached",
            format!("You can add a maximum of {max} emergency contacts."),
            ToastKind::Error,
        );
        return;
    }
    let contact = match validate_contact(form) {
        Ok(contact) => contact,
        Err(e) => {
            model.toast_with("Invalid contact", e.to_string(), ToastKind::Error);
            return;
        }
    };
    let name = contact.name.clone();
    let outcome = model.store.add_emergency_contact(contact);
    apply_mutation(outcome, model, caps);
    model.toast_with(
        "Contact Added",
        format!("{name} has been added to your emergency contacts."),
        ToastKind::Success,
    );
}

fn remove_contact(id: &ContactId, model: &mut Model, caps: &Capabilities) {
    let outcome = model.store.remove_emergency_contact(id);
    apply_mutation(outcome, model, caps);
}

// --- Persistence ---

fn apply_mutation(outcome: MutationOutcome, model: &mut Model, caps: &Capabilities) {
    match outcome {
        MutationOutcome::Local => persist_guest_snapshot(model, caps),
        MutationOutcome::WriteThrough(WriteThrough::Create { collection, fields }) => {
            let kind = collection.kind;
            let path = collection.to_string();
            let payload = fields.clone();
            caps.documents.create(collection, fields, move |result| match result {
                Ok(_) => Event::WriteCompleted {
                    collection: kind,
                    operation: RuleOperation::Create,
                },
                Err(failure) => Event::WriteFailed(Box::new(WriteFailure {
                    collection: kind,
                    path,
                    operation: RuleOperation::Create,
                    payload: Some(payload),
                    failure,
                })),
            });
        }
        MutationOutcome::WriteThrough(WriteThrough::Delete { document }) => {
            let kind = document.collection.kind;
            let path = document.to_string();
            caps.documents.delete(document, move |result| match result {
                Ok(()) => Event::WriteCompleted {
                    collection: kind,
                    operation: RuleOperation::Delete,
                },
                Err(failure) => Event::WriteFailed(Box::new(WriteFailure {
                    collection: kind,
                    path,
                    operation: RuleOperation::Delete,
                    payload: None,
                    failure,
                })),
            });
        }
    }
}

fn request_guest_snapshot(model: &mut Model, caps: &Capabilities) {
    let namespace = model.store.namespace();
    match load_guest_snapshot(&caps.key_value, namespace, Event::GuestSnapshotLoaded) {
        Ok(()) => model.store.begin_local_load(),
        Err(e) => {
            error!(%e, "guest snapshot key rejected");
            model.set_error(
                AppError::new(ErrorKind::Storage, "Saved records could not be loaded")
                    .with_internal(e.to_string()),
            );
        }
    }
}

fn persist_guest_snapshot(model: &mut Model, caps: &Capabilities) {
    if model.store.mode() != SyncMode::LocalOnly {
        return;
    }
    if model.store.is_local_load_pending() {
        debug!("guest snapshot still loading; saving after it is merged");
        return;
    }
    let snapshot = model.store.to_local_snapshot();
    if let Err(e) = save_guest_snapshot(
        &caps.key_value,
        model.store.namespace(),
        &snapshot,
        Event::GuestSnapshotSaved,
    ) {
        error!(%e, "guest snapshot could not be encoded");
        model.set_error(
            AppError::new(
                ErrorKind::Storage,
                "Your changes could not be saved on this device",
            )
            .with_internal(e.to_string()),
        );
    }
}

fn guest_snapshot_loaded(
    result: Result<Option<Vec<u8>>, String>,
    model: &mut Model,
    caps: &Capabilities,
) {
    if model.store.mode() != SyncMode::LocalOnly {
        debug!("ignoring guest snapshot outside local-only mode");
        return;
    }
    let snapshot = match result {
        Ok(Some(bytes)) => match LocalSnapshot::decode(&bytes) {
            Ok(snapshot) => {
                info!(
                    moods = snapshot.mood_entries.len(),
                    journal = snapshot.journal_entries.len(),
                    contacts = snapshot.emergency_contacts.len(),
                    "guest snapshot restored"
                );
                Some(snapshot)
            }
            Err(e) => {
                error!(%e, "discarding unreadable guest snapshot");
                None
            }
        },
        Ok(None) => {
            debug!("no guest snapshot stored");
            None
        }
        Err(e) => {
            error!(error = %e, "guest snapshot could not be read");
            None
        }
    };

    let restored = snapshot.is_some();
    let max_contacts = model.config.max_emergency_contacts;
    let added_meanwhile = model.store.finish_local_load(snapshot, max_contacts);
    if restored {
        sync_vitals_loop(model, caps);
    }
    if added_meanwhile {
        persist_guest_snapshot(model, caps);
    }
}

fn apply_snapshot(subscription: SubscriptionId, documents: &[RemoteDocument], model: &mut Model) {
    let store = &mut model.store;
    let outcome = match subscription.kind {
        CollectionKind::MoodEntries => store.mood_entries.apply_snapshot(subscription, documents),
        CollectionKind::JournalEntries => {
            store.journal_entries.apply_snapshot(subscription, documents)
        }
        CollectionKind::EmergencyContacts => {
            store.emergency_contacts.apply_snapshot(subscription, documents)
        }
    };
    if let SnapshotOutcome::Applied { accepted, skipped } = outcome {
        debug!(collection = %subscription.kind, accepted, skipped, "snapshot applied");
        if subscription.kind == CollectionKind::EmergencyContacts {
            model.store.contacts_synced();
        }
    }
}

fn apply_subscription_failure(
    subscription: SubscriptionId,
    failure: &StoreFailure,
    model: &mut Model,
) {
    let store = &mut model.store;
    let published = match subscription.kind {
        CollectionKind::MoodEntries => store.mood_entries.apply_failure(subscription, failure),
        CollectionKind::JournalEntries => {
            store.journal_entries.apply_failure(subscription, failure)
        }
        CollectionKind::EmergencyContacts => {
            store.emergency_contacts.apply_failure(subscription, failure)
        }
    };
    if let Some(err) = published {
        model.diagnostics.publish(err);
    }
}

fn write_failed(failure: &WriteFailure, model: &mut Model) {
    error!(
        path = %failure.path,
        operation = ?failure.operation,
        code = %failure.failure.code,
        "write-through failed"
    );
    if failure.collection == CollectionKind::EmergencyContacts
        && failure.operation == RuleOperation::Create
    {
        model.store.contact_create_failed();
    }
    let err = if failure.is_permission_denied() {
        let permission_error = failure.to_permission_error();
        let err = AppError::from(&permission_error);
        model.diagnostics.publish(permission_error);
        err
    } else {
        AppError::new(ErrorKind::Storage, "Could not save changes")
            .with_internal(failure.failure.to_string())
    };
    model.toast_with("Could not save changes", err.user_facing_message(), ToastKind::Error);
}

// --- Timers ---

fn start_timer(purpose: TimerPurpose, after: Duration, model: &mut Model, caps: &Capabilities) {
    let (id, replaced) = model.timers.arm(purpose);
    if let Some(old) = replaced {
        caps.timer.cancel(old);
    }
    caps.timer
        .start(id, after, move |output| Event::TimerFired { id, output });
}

fn stop_timer(purpose: TimerPurpose, model: &mut Model, caps: &Capabilities) {
    if let Some(id) = model.timers.disarm(purpose) {
        caps.timer.cancel(id);
    }
}

fn timer_fired(id: TimerId, output: TimerOutput, model: &mut Model, caps: &Capabilities) {
    if output == TimerOutput::Cancelled || !model.timers.accept(id) {
        debug!(?id, ?output, "ignoring stale timer");
        return;
    }
    match id.purpose {
        TimerPurpose::CrisisPause => {
            if model.pending_reply == Some(PendingReply::CrisisPause) {
                model.pending_reply = None;
                model.store.add_message(NewMessage::system(CRISIS_RESOURCES));
            }
        }
        TimerPurpose::VitalsTick => vitals_tick(model, caps),
        TimerPurpose::SosCountdown => countdown_tick(model, caps),
        TimerPurpose::BreathingPhase => {
            if model.breathing.advance().is_some() {
                let after = model.config.breathing_phase();
                start_timer(TimerPurpose::BreathingPhase, after, model, caps);
            }
        }
    }
}

// --- Vitals & SOS ---

/// Runs the simulator loop while SOS consent is on and stops it otherwise.
fn sync_vitals_loop(model: &mut Model, caps: &Capabilities) {
    if model.store.sos_consent {
        if !model.timers.is_armed(TimerPurpose::VitalsTick) {
            let tick = model.config.vitals_tick();
            start_timer(TimerPurpose::VitalsTick, tick, model, caps);
        }
    } else {
        stop_timer(TimerPurpose::VitalsTick, model, caps);
        stop_timer(TimerPurpose::SosCountdown, model, caps);
        model.vitals.reset();
    }
}

fn vitals_tick(model: &mut Model, caps: &Capabilities) {
    if !model.store.sos_consent {
        return;
    }
    if model.vitals.tick(&mut model.rng).is_some() {
        start_timer(TimerPurpose::SosCountdown, SOS_COUNTDOWN_STEP, model, caps);
    }
    let tick = model.config.vitals_tick();
    start_timer(TimerPurpose::VitalsTick, tick, model, caps);
}

fn vitals_reported(vitals: Vitals, model: &mut Model, caps: &Capabilities) {
    if !model.store.sos_consent {
        debug!("SOS consent off; ignoring vitals");
        return;
    }
    if model.vitals.observe(vitals).is_some() {
        start_timer(TimerPurpose::SosCountdown, SOS_COUNTDOWN_STEP, model, caps);
    }
}

fn countdown_tick(model: &mut Model, caps: &Capabilities) {
    match model.vitals.countdown_tick() {
        CountdownStep::Remaining(_) => {
            start_timer(TimerPurpose::SosCountdown, SOS_COUNTDOWN_STEP, model, caps);
        }
        CountdownStep::Expired => escalate(model, caps),
        CountdownStep::Inactive => {}
    }
}

fn acknowledge_alert(response: AlertResponse, model: &mut Model, caps: &Capabilities) {
    match model.vitals.acknowledge(response) {
        AckOutcome::Dismissed => stop_timer(TimerPurpose::SosCountdown, model, caps),
        AckOutcome::Escalate => {
            stop_timer(TimerPurpose::SosCountdown, model, caps);
            escalate(model, caps);
        }
        AckOutcome::Ignored => debug!("no open alert to acknowledge"),
    }
}

fn escalate(model: &mut Model, caps: &Capabilities) {
    match model.vitals.begin_escalation(model.store.contacts().len()) {
        EscalationStep::Aborted(notice) => model.show_toast(notice.into_toast()),
        EscalationStep::RequestLocation => {
            caps.location.current_position(Event::LocationResolved);
        }
        EscalationStep::Ignored => {}
    }
}

fn location_resolved(location: Result<Coordinates, LocationFailure>, model: &mut Model) {
    if let Err(e) = &location {
        warn!(%e, "SOS sent without a location");
    }
    if let Some(notice) = model.vitals.complete_escalation(location) {
        model.show_toast(notice.into_toast());
    }
}
