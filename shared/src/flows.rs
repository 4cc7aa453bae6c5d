//! Request and response schemas for the hosted prompt flows.
//!
//! Every flow is a JSON POST of `{"data": input}` answered with
//! `{"result": output}`. Outputs are validated after decoding; anything that
//! does not parse or fails validation is a [`FlowError::Malformed`].

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{JournalEntry, MoodEntry};
use crate::validation;
use crate::{AppError, ErrorKind, MAX_MOOD_SCORE, MIN_MOOD_SCORE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowName {
    EmpatheticConversation,
    SummarizeJournal,
    MoodInsights,
    SuggestTags,
}

impl FlowName {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::EmpatheticConversation => "empatheticConversation",
            Self::SummarizeJournal => "summarizeJournal",
            Self::MoodInsights => "moodInsights",
            Self::SuggestTags => "suggestTags",
        }
    }
}

impl fmt::Display for FlowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FlowError {
    #[error("prompt service is not configured")]
    NotConfigured,
    #[error("could not encode request: {0}")]
    Encode(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("prompt service returned HTTP {status}")]
    Status { status: u16 },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<&FlowError> for AppError {
    fn from(err: &FlowError) -> Self {
        let kind = match err {
            FlowError::NotConfigured => ErrorKind::FeatureUnavailable,
            FlowError::Encode(_) => ErrorKind::Serialization,
            FlowError::Transport(_) => ErrorKind::Network,
            FlowError::Status { status } => ErrorKind::from_http_status(*status),
            FlowError::Malformed(_) => ErrorKind::MalformedResponse,
        };
        AppError::new(kind, "The assistant service could not complete the request")
            .with_internal(err.to_string())
    }
}

pub trait FlowOutput: DeserializeOwned {
    fn validate(&self) -> Result<(), String>;
}

pub trait FlowInput: Serialize {
    const FLOW: FlowName;
    type Output: FlowOutput;
}

/// Request body of every flow call.
#[derive(Serialize)]
pub struct FlowRequest<'a, T> {
    data: &'a T,
}

impl<'a, T: FlowInput> FlowRequest<'a, T> {
    pub fn new(data: &'a T) -> Self {
        Self { data }
    }
}

#[derive(Deserialize)]
struct ResultEnvelope<T> {
    result: T,
}

pub fn encode_request<I: FlowInput>(input: &I) -> Result<Vec<u8>, FlowError> {
    serde_json::to_vec(&FlowRequest::new(input)).map_err(|e| FlowError::Encode(e.to_string()))
}

/// Turns a raw HTTP answer into a validated flow output.
pub fn decode<O: FlowOutput>(status: u16, body: &[u8]) -> Result<O, FlowError> {
    if !(200..300).contains(&status) {
        return Err(FlowError::Status { status });
    }
    let envelope: ResultEnvelope<O> =
        serde_json::from_slice(body).map_err(|e| FlowError::Malformed(e.to_string()))?;
    envelope.result.validate().map_err(FlowError::Malformed)?;
    Ok(envelope.result)
}

// --- Empathetic conversation ---

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInput {
    pub user_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_notes: Option<String>,
}

impl ConversationInput {
    #[must_use]
    pub fn new(user_input: impl Into<String>, latest_mood: Option<&MoodEntry>) -> Self {
        Self {
            user_input: user_input.into(),
            mood_score: latest_mood.map(|m| m.mood_score.value()),
            mood_tags: latest_mood.and_then(|m| m.tags.clone()),
            mood_notes: latest_mood.and_then(|m| m.notes.clone()),
        }
    }
}

impl fmt::Debug for ConversationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationInput")
            .field("user_input_len", &self.user_input.len())
            .field("mood_score", &self.mood_score)
            .finish_non_exhaustive()
    }
}

impl FlowInput for ConversationInput {
    const FLOW: FlowName = FlowName::EmpatheticConversation;
    type Output = ConversationReply;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationReply {
    pub response: String,
    pub rationale: String,
}

impl FlowOutput for ConversationReply {
    fn validate(&self) -> Result<(), String> {
        if self.response.trim().is_empty() {
            return Err("empty response".into());
        }
        Ok(())
    }
}

// --- Journal summary ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSummaryInput {
    pub journal_entries: String,
}

impl JournalSummaryInput {
    /// Returns `None` when there is nothing to summarize.
    #[must_use]
    pub fn from_entries(entries: &[JournalEntry]) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let journal_entries = entries
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(Self { journal_entries })
    }
}

impl FlowInput for JournalSummaryInput {
    const FLOW: FlowName = FlowName::SummarizeJournal;
    type Output = JournalSummary;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalSummary {
    pub summary: String,
}

impl FlowOutput for JournalSummary {
    fn validate(&self) -> Result<(), String> {
        if self.summary.trim().is_empty() {
            return Err("empty summary".into());
        }
        Ok(())
    }
}

// --- Mood insights ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodHistoryItem {
    pub date: String,
    pub mood_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodInsightsInput {
    pub mood_history: Vec<MoodHistoryItem>,
}

impl MoodInsightsInput {
    /// Returns `None` for an empty history.
    #[must_use]
    pub fn from_history(history: &[MoodEntry]) -> Option<Self> {
        if history.is_empty() {
            return None;
        }
        let mood_history = history
            .iter()
            .map(|m| MoodHistoryItem {
                date: m.date.to_rfc3339(),
                mood_score: m.mood_score.value(),
                tags: m.tags.clone(),
                notes: m.notes.clone(),
            })
            .collect();
        Some(Self { mood_history })
    }
}

impl FlowInput for MoodInsightsInput {
    const FLOW: FlowName = FlowName::MoodInsights;
    type Output = MoodInsights;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodInsights {
    pub average_mood: f64,
    pub frequent_triggers: Vec<String>,
    pub notable_incidents: Vec<String>,
}

impl FlowOutput for MoodInsights {
    fn validate(&self) -> Result<(), String> {
        let range = f64::from(MIN_MOOD_SCORE)..=f64::from(MAX_MOOD_SCORE);
        if !self.average_mood.is_finite() || !range.contains(&self.average_mood) {
            return Err(format!("average mood {} out of range", self.average_mood));
        }
        Ok(())
    }
}

// --- Tag suggestion ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSuggestionInput {
    pub text: String,
}

impl FlowInput for TagSuggestionInput {
    const FLOW: FlowName = FlowName::SuggestTags;
    type Output = TagSuggestion;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSuggestion {
    pub tags: Vec<String>,
}

impl TagSuggestion {
    /// Suggested tags trimmed, with unusable ones dropped.
    #[must_use]
    pub fn cleaned(self) -> Vec<String> {
        self.tags
            .iter()
            .filter_map(|t| validation::tag(t).ok())
            .collect()
    }
}

impl FlowOutput for TagSuggestion {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}
