use crux_http::Http;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::flows::{self, FlowError, FlowInput, FlowName, FlowRequest};

pub const MAX_URL_LENGTH: usize = 2048;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Validated base URL of the prompt flow service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowEndpoint {
    base: String,
    host: String,
}

impl FlowEndpoint {
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(HttpError::InvalidUrl {
                url: String::new(),
                reason: "URL cannot be empty".to_string(),
            });
        }
        if url.len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(&url),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }

        let parsed = Url::parse(url.trim()).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(&url),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(&url),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(&url),
                reason: "base URL cannot carry a query or fragment".to_string(),
            });
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl {
                url: Self::truncate_url(&url),
                reason: "URL must have a host".to_string(),
            })?
            .to_lowercase();

        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
            host,
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn flow_url(&self, flow: FlowName) -> String {
        format!("{}/{}", self.base, flow.path())
    }

    fn truncate_url(url: &str) -> String {
        if url.len() > 100 {
            format!("{}...", url.chars().take(100).collect::<String>())
        } else {
            url.to_string()
        }
    }
}

/// POSTs `input` to its flow and reports the decoded, validated output.
///
/// Fails synchronously (without issuing a request) when no endpoint is
/// configured or the input cannot be encoded.
pub fn run_flow<I, Ev, F>(
    http: &Http<Ev>,
    endpoint: Option<&FlowEndpoint>,
    input: &I,
    make_event: F,
) -> Result<(), FlowError>
where
    I: FlowInput,
    I::Output: Send + 'static,
    Ev: 'static,
    F: FnOnce(Result<I::Output, FlowError>) -> Ev + Send + 'static,
{
    let endpoint = endpoint.ok_or(FlowError::NotConfigured)?;
    let url = endpoint.flow_url(I::FLOW);
    debug!(flow = %I::FLOW, host = endpoint.host(), "calling prompt flow");

    http.post(url)
        .body_json(&FlowRequest::new(input))
        .map_err(|e| FlowError::Encode(e.to_string()))?
        .send(move |result| {
            make_event(match result {
                Ok(mut response) => {
                    let status = u16::from(response.status());
                    let body = response.take_body().unwrap_or_default();
                    flows::decode(status, &body)
                }
                Err(e) => Err(FlowError::Transport(e.to_string())),
            })
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_urls_are_joined_without_double_slashes() {
        let endpoint = FlowEndpoint::new("https://flows.example.com/api/").unwrap();
        assert_eq!(
            endpoint.flow_url(FlowName::EmpatheticConversation),
            "https://flows.example.com/api/empatheticConversation"
        );
        assert_eq!(endpoint.host(), "flows.example.com");
    }

    #[test]
    fn local_development_endpoints_are_allowed() {
        let endpoint = FlowEndpoint::new("http://localhost:3400").unwrap();
        assert_eq!(
            endpoint.flow_url(FlowName::SuggestTags),
            "http://localhost:3400/suggestTags"
        );
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(FlowEndpoint::new("").is_err());
        assert!(FlowEndpoint::new("   ").is_err());
        assert!(FlowEndpoint::new("javascript:alert(1)").is_err());
        assert!(FlowEndpoint::new("ftp://files.example.com").is_err());
        assert!(FlowEndpoint::new("https://flows.example.com/?key=1").is_err());
        assert!(FlowEndpoint::new(format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH))).is_err());
    }
}
