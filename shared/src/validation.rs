//! Input validation at the UI boundary.
//!
//! Everything in here runs inside `update` before a store mutation or a
//! capability request is made, so invalid input never reaches a collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::{MAX_MOOD_SCORE, MAX_TAG_LENGTH, MIN_MOOD_SCORE};

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_FIELD_LENGTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please write something before sending.")]
    EmptyText,
    #[error("value too long ({len} > {max})")]
    TooLong { len: usize, max: usize },
    #[error("Mood score must be between {MIN_MOOD_SCORE} and {MAX_MOOD_SCORE}.")]
    MoodScoreOutOfRange(u8),
    #[error("Tags must be 1 to {MAX_TAG_LENGTH} characters.")]
    InvalidTag,
    #[error("Please enter a valid email.")]
    InvalidEmail,
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,
    #[error("Name must be at least {MIN_NAME_LENGTH} characters.")]
    NameTooShort,
    #[error("Relationship is required.")]
    RelationshipTooShort,
    #[error("Please enter a valid phone number.")]
    InvalidPhone,
}

/// Returns the trimmed text, or an error when nothing but whitespace was entered.
pub fn non_blank(text: &str, max: usize) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    if text.len() > max {
        return Err(ValidationError::TooLong {
            len: text.len(),
            max,
        });
    }
    Ok(trimmed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MoodScore(u8);

impl MoodScore {
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if !(MIN_MOOD_SCORE..=MAX_MOOD_SCORE).contains(&value) {
            return Err(ValidationError::MoodScoreOutOfRange(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for MoodScore {
    fn default() -> Self {
        Self(crate::DEFAULT_MOOD_SCORE)
    }
}

impl TryFrom<u8> for MoodScore {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MoodScore> for u8 {
    fn from(score: MoodScore) -> Self {
        score.0
    }
}

pub fn tag(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_TAG_LENGTH {
        return Err(ValidationError::InvalidTag);
    }
    Ok(trimmed.to_string())
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let candidate = raw.trim();
        if candidate.len() > MAX_FIELD_LENGTH || candidate.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidEmail);
        }
        let (local, domain) = candidate
            .split_once('@')
            .ok_or(ValidationError::InvalidEmail)?;
        let domain_ok = !domain.contains('@')
            && domain
                .split_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
            && !domain.ends_with('.');
        if local.is_empty() || !domain_ok {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(Self(candidate.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Emails identify people; keep them out of logs.
impl fmt::Debug for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Email([REDACTED])")
    }
}

/// Password held only long enough to hand it to the auth shell.
pub struct Password(SecretString);

impl Password {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::new(raw.into()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.expose().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooShort);
        }
        Ok(())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

pub fn display_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < MIN_NAME_LENGTH {
        return Err(ValidationError::NameTooShort);
    }
    if trimmed.len() > MAX_FIELD_LENGTH {
        return Err(ValidationError::TooLong {
            len: trimmed.len(),
            max: MAX_FIELD_LENGTH,
        });
    }
    Ok(trimmed.to_string())
}

pub fn relationship(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < MIN_NAME_LENGTH {
        return Err(ValidationError::RelationshipTooShort);
    }
    if trimmed.len() > MAX_FIELD_LENGTH {
        return Err(ValidationError::TooLong {
            len: trimmed.len(),
            max: MAX_FIELD_LENGTH,
        });
    }
    Ok(trimmed.to_string())
}

/// Accepts an optional `+CC` prefix (1-3 digits, optionally followed by a
/// dash or space) and exactly ten subscriber digits.
pub fn phone(raw: &str) -> Result<String, ValidationError> {
    let candidate = raw.trim();
    let is_subscriber = |s: &str| s.len() == 10 && s.chars().all(|c| c.is_ascii_digit());

    let valid = match candidate.strip_prefix('+') {
        None => is_subscriber(candidate),
        Some(after_plus) => (1..=3).any(|code_len| {
            let (Some(code), Some(rest)) = (after_plus.get(..code_len), after_plus.get(code_len..))
            else {
                return false;
            };
            if !code.chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
            let rest = rest
                .strip_prefix('-')
                .or_else(|| rest.strip_prefix(' '))
                .unwrap_or(rest);
            is_subscriber(rest)
        }),
    };

    if !valid {
        return Err(ValidationError::InvalidPhone);
    }
    Ok(candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(non_blank("   \n\t", 100), Err(ValidationError::EmptyText));
        assert_eq!(non_blank("", 100), Err(ValidationError::EmptyText));
        assert_eq!(non_blank("  hi  ", 100), Ok("hi"));
    }

    #[test]
    fn overlong_text_is_rejected() {
        let long = "a".repeat(11);
        assert!(matches!(
            non_blank(&long, 10),
            Err(ValidationError::TooLong { len: 11, max: 10 })
        ));
    }

    #[test]
    fn mood_score_bounds() {
        assert!(MoodScore::new(0).is_ok());
        assert!(MoodScore::new(10).is_ok());
        assert_eq!(
            MoodScore::new(11),
            Err(ValidationError::MoodScoreOutOfRange(11))
        );
        assert_eq!(MoodScore::default().value(), 5);
    }

    #[test]
    fn mood_score_deserialization_validates() {
        let ok: MoodScore = serde_json::from_str("7").unwrap();
        assert_eq!(ok.value(), 7);
        assert!(serde_json::from_str::<MoodScore>("42").is_err());
    }

    #[test]
    fn email_shapes() {
        assert!(Email::new("m@example.com").is_ok());
        assert!(Email::new(" jane.doe@mail.co.uk ").is_ok());
        assert!(Email::new("no-at-sign").is_err());
        assert!(Email::new("a@b").is_err());
        assert!(Email::new("@example.com").is_err());
        assert!(Email::new("a b@example.com").is_err());
        assert!(Email::new("a@example.").is_err());
        assert_eq!(
            ValidationError::InvalidEmail.to_string(),
            "Please enter a valid email."
        );
    }

    #[test]
    fn password_rules_and_redaction() {
        assert_eq!(
            Password::new("12345").validate(),
            Err(ValidationError::PasswordTooShort)
        );
        let pw = Password::new("hunter22");
        assert!(pw.validate().is_ok());
        assert_eq!(format!("{pw:?}"), "[REDACTED]");
    }

    #[test]
    fn names_need_two_characters() {
        assert_eq!(display_name(" J "), Err(ValidationError::NameTooShort));
        assert_eq!(display_name("Jo").unwrap(), "Jo");
        assert_eq!(relationship("x"), Err(ValidationError::RelationshipTooShort));
        assert_eq!(relationship(" Sister ").unwrap(), "Sister");
    }

    #[test]
    fn phone_numbers() {
        assert!(phone("9876543210").is_ok());
        assert!(phone("+919876543210").is_ok());
        assert!(phone("+91 9876543210").is_ok());
        assert!(phone("+1-5551234567").is_ok());
        assert!(phone("+4415551234567").is_ok());
        assert!(phone("+12345551234567").is_err());
        assert!(phone("987654321").is_err());
        assert!(phone("98765432100").is_err());
        assert!(phone("+9123 9876543210").is_err());
        assert!(phone("98765x3210").is_err());
    }
}
