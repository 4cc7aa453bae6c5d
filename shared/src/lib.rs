// lib.rs - SupportBot application core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod breathing;
pub mod capabilities;
pub mod config;
pub mod crisis;
pub mod event;
pub mod flows;
pub mod model;
pub mod offline_store;
pub mod sos;
pub mod store;
pub mod sync;
pub mod validation;
pub mod view;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::AppConfig;
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::Model;
pub use view::ViewModel;

/// Placeholder identity used to namespace remote collections while nobody is signed in.
pub const GUEST_USER_ID: &str = "local-user";
pub const WELCOME_MESSAGE_ID: &str = "welcome-1";
pub const WELCOME_MESSAGE: &str = "I'm SupportBot, and I'm here with you. It's a safe space to share what's on your mind. How are you feeling today?";
pub const FALLBACK_REPLY: &str =
    "I'm having a little trouble connecting right now. Please give me a moment and try again.";

pub const MAX_EMERGENCY_CONTACTS: usize = 3;
pub const MIN_MOOD_SCORE: u8 = 0;
pub const MAX_MOOD_SCORE: u8 = 10;
pub const DEFAULT_MOOD_SCORE: u8 = 5;
pub const MAX_MESSAGE_LENGTH: usize = 8 * 1024;
pub const MAX_JOURNAL_ENTRY_LENGTH: usize = 64 * 1024;
pub const MAX_TAG_LENGTH: usize = 64;
pub const MAX_DIAGNOSTICS: usize = 50;

pub const CRISIS_PAUSE: Duration = Duration::from_millis(1000);
pub const VITALS_TICK: Duration = Duration::from_millis(2000);
pub const SOS_COUNTDOWN_SECS: u32 = 10;
pub const SOS_COUNTDOWN_STEP: Duration = Duration::from_secs(1);
pub const BREATHING_PHASE: Duration = Duration::from_millis(4000);
pub const SOS_TOAST_DURATION_MS: u64 = 10_000;

pub const HR_PANIC_THRESHOLD: f64 = 130.0;
pub const SPO2_LOW_THRESHOLD: f64 = 92.0;
pub const HR_SPIKE_PROBABILITY: f64 = 0.02;
pub const SPO2_DROP_PROBABILITY: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    RateLimited,
    Storage,
    Serialization,
    Deserialization,
    MalformedResponse,
    ServiceUnavailable,
    Location,
    LocationPermissionDenied,
    FeatureUnavailable,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Location => "LOCATION_ERROR",
            Self::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::FeatureUnavailable => "FEATURE_UNAVAILABLE",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network
            | Self::Timeout
            | Self::RateLimited
            | Self::Storage
            | Self::ServiceUnavailable
            | Self::Location => ErrorSeverity::Transient,

            Self::Serialization
            | Self::Deserialization
            | Self::Internal
            | Self::InvalidState => ErrorSeverity::Fatal,

            Self::Authentication
            | Self::Authorization
            | Self::Validation
            | Self::NotFound
            | Self::MalformedResponse
            | Self::LocationPermissionDenied
            | Self::FeatureUnavailable
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network
                | Self::Timeout
                | Self::RateLimited
                | Self::Storage
                | Self::ServiceUnavailable
                | Self::Location
        )
    }

    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 => Self::RateLimited,
            502..=504 => Self::ServiceUnavailable,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    /// Short, non-technical text safe to show to the person using the app.
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Authentication => "Please sign in again to continue.".into(),
            ErrorKind::Authorization => {
                "You don't have permission to access this data.".into()
            }
            ErrorKind::Validation | ErrorKind::FeatureUnavailable => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.".into(),
            ErrorKind::Storage => "Unable to save your data right now. Please try again.".into(),
            ErrorKind::Serialization | ErrorKind::Deserialization | ErrorKind::MalformedResponse => {
                "Something went wrong while reading the response. Please try again.".into()
            }
            ErrorKind::ServiceUnavailable => {
                "The service is temporarily unavailable. Please try again shortly.".into()
            }
            ErrorKind::Location => "Unable to determine your location.".into(),
            ErrorKind::LocationPermissionDenied => {
                "Location permission was denied.".into()
            }
            ErrorKind::InvalidState => "The app is in an unexpected state. Please restart it.".into(),
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 3000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub title: String,
    pub description: Option<String>,
    pub kind: ToastKind,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(title: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            title: title.into(),
            description: None,
            kind,
            created_at_ms: current_time_ms(),
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.duration_ms
    }
}

#[must_use]
pub fn current_time_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_error_defaults_severity_from_kind() {
        let err = AppError::new(ErrorKind::Network, "offline");
        assert_eq!(err.severity, ErrorSeverity::Transient);
        assert!(err.is_retryable());

        let err = AppError::new(ErrorKind::MalformedResponse, "bad json");
        assert_eq!(err.severity, ErrorSeverity::Permanent);
        assert!(!err.is_retryable());
    }

    #[test]
    fn fatal_severity_is_never_retryable() {
        let err = AppError::new(ErrorKind::Network, "x").with_severity(ErrorSeverity::Fatal);
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_includes_code_and_internal() {
        let err = AppError::new(ErrorKind::Authorization, "denied").with_internal("rules");
        assert_eq!(err.to_string(), "[FORBIDDEN] denied (internal: rules)");
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err = AppError::new(ErrorKind::Validation, "Name must be at least 2 characters.");
        assert_eq!(err.user_facing_message(), "Name must be at least 2 characters.");
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorKind::from_http_status(403), ErrorKind::Authorization);
        assert_eq!(ErrorKind::from_http_status(503), ErrorKind::ServiceUnavailable);
        assert_eq!(ErrorKind::from_http_status(500), ErrorKind::Internal);
        assert_eq!(ErrorKind::from_http_status(418), ErrorKind::Unknown);
    }

    #[test]
    fn toast_expiry() {
        let toast = ToastMessage {
            title: "Mood logged".into(),
            description: None,
            kind: ToastKind::Success,
            created_at_ms: 1_000,
            duration_ms: 3_000,
        };
        assert!(!toast.is_expired(3_500));
        assert!(toast.is_expired(4_001));
    }
}
