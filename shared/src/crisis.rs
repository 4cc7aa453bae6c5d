//! Keyword-based crisis detection for outgoing chat messages.

use serde::Deserialize;
use thiserror::Error;

const BUNDLED_KEYWORDS: &str = include_str!("crisis_keywords.json");

/// Body of the system message shown instead of an AI reply.
pub const CRISIS_RESOURCES: &str = "It sounds like you're going through a lot.\n\
If you are in immediate distress, please reach out for help. You are not alone.\n\
\n\
Emergency Helpline (India): 988\n\
Global Crisis Text Line: Text \"HOME\" to 741741\n\
\n\
I am an AI and not equipped to handle a crisis, but these resources can help.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrisisListError {
    #[error("crisis keyword list is not valid JSON: {0}")]
    Parse(String),
    #[error("crisis keyword list is empty")]
    Empty,
}

#[derive(Deserialize)]
struct KeywordFile {
    keywords: Vec<KeywordEntry>,
}

#[derive(Deserialize)]
struct KeywordEntry {
    term: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrisisDetector {
    terms: Vec<String>,
}

impl CrisisDetector {
    /// Builds a detector from the `{"keywords": [{"term": ...}]}` format.
    /// Terms are lower-cased; blank terms are dropped.
    pub fn from_json(raw: &str) -> Result<Self, CrisisListError> {
        let file: KeywordFile =
            serde_json::from_str(raw).map_err(|e| CrisisListError::Parse(e.to_string()))?;
        Self::new(file.keywords.into_iter().map(|k| k.term))
    }

    pub fn new(terms: impl IntoIterator<Item = String>) -> Result<Self, CrisisListError> {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Err(CrisisListError::Empty);
        }
        Ok(Self { terms })
    }

    #[must_use]
    pub fn bundled() -> Self {
        // The bundled list is checked by `bundled_list_parses`.
        Self::from_json(BUNDLED_KEYWORDS).unwrap_or_else(|_| Self {
            terms: vec!["suicide".into(), "kill myself".into(), "ending it".into()],
        })
    }

    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    #[must_use]
    pub fn is_crisis(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// The first configured term contained in `text`, ignoring case.
    #[must_use]
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let folded = text.to_lowercase();
        self.terms
            .iter()
            .find(|term| folded.contains(term.as_str()))
            .map(String::as_str)
    }
}

impl Default for CrisisDetector {
    fn default() -> Self {
        Self::bundled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bundled_list_parses() {
        let detector = CrisisDetector::from_json(BUNDLED_KEYWORDS).unwrap();
        assert!(detector.terms().iter().any(|t| t == "ending it"));
    }

    #[test]
    fn matches_ignore_case() {
        let detector = CrisisDetector::bundled();
        assert!(detector.is_crisis("I keep thinking about ENDING IT"));
        assert_eq!(detector.first_match("I keep thinking about ending it"), Some("ending it"));
        assert!(!detector.is_crisis("I had a rough day at work"));
    }

    #[test]
    fn terms_are_normalized() {
        let detector =
            CrisisDetector::from_json(r#"{"keywords": [{"term": "  Hopeless "}, {"term": "   "}]}"#)
                .unwrap();
        assert_eq!(detector.terms(), ["hopeless"]);
    }

    #[test]
    fn empty_or_invalid_lists_are_rejected() {
        assert_eq!(
            CrisisDetector::from_json(r#"{"keywords": []}"#),
            Err(CrisisListError::Empty)
        );
        assert!(matches!(
            CrisisDetector::from_json("not json"),
            Err(CrisisListError::Parse(_))
        ));
    }

    #[test]
    fn resources_mention_helplines() {
        assert!(CRISIS_RESOURCES.contains("988"));
        assert!(CRISIS_RESOURCES.contains("741741"));
    }

    proptest! {
        #[test]
        fn detection_is_case_insensitive_containment(
            text in "[a-zA-Z ]{0,40}",
            terms in prop::collection::vec("[a-z]{1,6}( [a-z]{1,6})?", 1..5),
        ) {
            let detector = CrisisDetector::new(terms.clone()).unwrap();
            let expected = terms.iter().any(|t| text.to_lowercase().contains(t.as_str()));
            prop_assert_eq!(detector.is_crisis(&text), expected);
        }

        #[test]
        fn embedding_a_term_always_matches(
            prefix in "[a-z ]{0,10}",
            suffix in "[a-z ]{0,10}",
            upper in any::<bool>(),
        ) {
            let detector = CrisisDetector::bundled();
            let term = "kill myself";
            let term = if upper { term.to_uppercase() } else { term.to_string() };
            let text = format!("{prefix}{term}{suffix}");
            prop_assert!(detector.is_crisis(&text));
        }
    }
}
