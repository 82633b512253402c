//! Error taxonomy, API error envelope, and retry utilities.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while decoding a schema document.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unrecognized type name '{found}'")]
    UnknownType { found: String },
    #[error("unrecognized type name '{found}' in a type union")]
    UnknownUnionMember { found: String },
    #[error("malformed value for '{key}': expected {expected}")]
    MalformedField { key: String, expected: &'static str },
    #[error("schema document must be a JSON object")]
    NotAnObject,
    #[error("schema nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
}

/// Error body returned by the API transport, consumed as-is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
    #[serde(default)]
    pub error: ApiErrorDetail,
}

/// The flat detail record inside [`ApiErrorEnvelope`]; every field is
/// independently optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Classification of an API failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    AccessDenied,
    NotFound,
    InvalidRequest,
    RateLimit,
    Server,
    Other,
}

/// Map an HTTP status to a kind and whether a retry can help.
pub fn classify_status(status: u16) -> (ErrorKind, bool) {
    match status {
        400 | 422 => (ErrorKind::InvalidRequest, false),
        401 => (ErrorKind::Authentication, false),
        403 => (ErrorKind::AccessDenied, false),
        404 => (ErrorKind::NotFound, false),
        429 => (ErrorKind::RateLimit, true),
        500 | 502 | 503 | 504 => (ErrorKind::Server, true),
        _ => (ErrorKind::Other, false),
    }
}

/// Errors surfaced by the HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("api error ({status}): {message}")]
    Api {
        status: u16,
        kind: ErrorKind,
        message: String,
        code: Option<String>,
        param: Option<String>,
        retryable: bool,
        retry_after: Option<f64>,
    },
}

impl ClientError {
    pub fn retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Api { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Server-requested delay before the next attempt, in seconds.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            ClientError::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Retry policy for transport-level failures.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: f64,
    pub max_delay: f64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: 1.0,
            max_delay: 60.0,
            backoff_multiplier: 2.0,
        }
    }
}

/// Compute the delay for a retry attempt. Returns `None` when no retry
/// should occur. A server-supplied `retry_after` wins while it stays under
/// the policy cap; beyond the cap the retry is abandoned.
pub fn compute_backoff_delay(
    policy: &RetryPolicy,
    attempt: usize,
    retry_after: Option<f64>,
) -> Option<f64> {
    if let Some(retry_after) = retry_after {
        if retry_after <= policy.max_delay {
            return Some(retry_after);
        }
        return None;
    }
    let raw = policy.base_delay * policy.backoff_multiplier.powi(attempt as i32);
    Some(raw.min(policy.max_delay))
}

/// Retry an async operation for retryable errors only.
///
/// The schema codec never retries anything; this lives at the transport
/// layer and is used around [`crate::Client::complete`].
pub async fn retry<T, Op, Fut>(policy: &RetryPolicy, mut operation: Op) -> Result<T, ClientError>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0usize;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.retryable() || attempt >= policy.max_retries {
                    return Err(error);
                }
                let Some(delay) = compute_backoff_delay(policy, attempt, error.retry_after())
                else {
                    return Err(error);
                };
                tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_status_maps_common_codes() {
        assert_eq!(classify_status(401), (ErrorKind::Authentication, false));
        assert_eq!(classify_status(404), (ErrorKind::NotFound, false));
        assert_eq!(classify_status(429), (ErrorKind::RateLimit, true));
        assert_eq!(classify_status(503), (ErrorKind::Server, true));
        assert_eq!(classify_status(418), (ErrorKind::Other, false));
    }

    #[test]
    fn envelope_tolerates_any_subset_of_fields() {
        let envelope: ApiErrorEnvelope =
            serde_json::from_str(r#"{"error":{"message":"bad schema","code":"invalid"}}"#)
                .unwrap();
        assert_eq!(envelope.error.message.as_deref(), Some("bad schema"));
        assert_eq!(envelope.error.code.as_deref(), Some("invalid"));
        assert!(envelope.error.kind.is_none());
        assert!(envelope.error.param.is_none());

        let empty: ApiErrorEnvelope = serde_json::from_str(r#"{"error":{}}"#).unwrap();
        assert_eq!(empty.error, ApiErrorDetail::default());
    }

    #[test]
    fn envelope_kind_maps_to_the_type_wire_key() {
        let envelope: ApiErrorEnvelope =
            serde_json::from_str(r#"{"error":{"type":"invalid_request_error"}}"#).unwrap();
        assert_eq!(envelope.error.kind.as_deref(), Some("invalid_request_error"));
    }

    #[test]
    fn backoff_grows_geometrically_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(compute_backoff_delay(&policy, 0, None), Some(1.0));
        assert_eq!(compute_backoff_delay(&policy, 1, None), Some(2.0));
        assert_eq!(compute_backoff_delay(&policy, 2, None), Some(4.0));
        assert_eq!(compute_backoff_delay(&policy, 10, None), Some(60.0));
    }

    #[test]
    fn retry_after_overrides_backoff_when_under_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(compute_backoff_delay(&policy, 0, Some(10.0)), Some(10.0));
        assert_eq!(compute_backoff_delay(&policy, 0, Some(120.0)), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn retry_recovers_from_a_retryable_error() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy {
            base_delay: 0.0,
            ..RetryPolicy::default()
        };

        let result = retry(&policy, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(ClientError::Api {
                        status: 429,
                        kind: ErrorKind::RateLimit,
                        message: "slow down".to_string(),
                        code: None,
                        param: None,
                        retryable: true,
                        retry_after: Some(0.0),
                    })
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn retry_gives_up_on_non_retryable_errors() {
        let policy = RetryPolicy::default();
        let result: Result<(), ClientError> = retry(&policy, || async {
            Err(ClientError::Configuration("no api key".to_string()))
        })
        .await;
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
