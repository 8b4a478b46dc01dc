//! HTTP retry helper for routing provider requests.
//!
//! Every networked strategy goes through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so each one gets the same
//! rate-limit delay, bounded retries with exponential backoff, and
//! diagnostic logging.
//!
//! ```ignore
//! let body = retry::send_json(|| client.post(&url).json(&payload), &policy).await?;
//! ```

use crate::RoutingError;
use crate::service_registry::RetryPolicy;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// # Retry behaviour
///
/// Sleeps [`RetryPolicy::initial_delay`] before the first attempt, then
/// makes up to [`RetryPolicy::max_attempts`] attempts with exponential
/// backoff between them. Retried: connection errors, timeouts, HTTP 429,
/// HTTP 5xx, and bodies that cannot be read or parsed as JSON.
///
/// Does **not** retry HTTP 4xx (except 429): the provider rejected the
/// request shape, so the caller should move on to another strategy.
///
/// # Errors
///
/// Returns [`RoutingError::Rejected`] for non-retryable 4xx responses, or
/// the last transient error once every attempt has failed.
pub async fn send_json<F>(
    build_request: F,
    policy: &RetryPolicy,
) -> Result<serde_json::Value, RoutingError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error: Option<RoutingError> = None;

    for attempt in 1..=max_attempts {
        let delay = if attempt == 1 {
            policy.initial_delay()
        } else {
            policy.backoff(attempt - 1)
        };
        if !delay.is_zero() {
            if attempt > 1 {
                log::warn!("  retry {}/{} in {delay:?}...", attempt - 1, max_attempts - 1);
            }
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) => {
                if is_transient(&e) {
                    log::warn!("  transient error: {e}");
                    last_error = Some(RoutingError::Http(e));
                    continue;
                }
                return Err(RoutingError::Http(e));
            }
        };

        let url = response.url().to_string();
        let status = response.status();

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                log::warn!(
                    "Response body read failed (attempt {attempt}/{max_attempts})\n  \
                     url: {url}\n  \
                     status: {status}\n  \
                     error: {e}"
                );
                last_error = Some(RoutingError::Http(e));
                continue;
            }
        };

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            log::warn!(
                "HTTP {status} (attempt {attempt}/{max_attempts})\n  \
                 url: {url}\n  \
                 body preview: {}",
                preview(&text)
            );
            last_error = Some(RoutingError::Provider {
                message: format!("HTTP {status}"),
            });
            continue;
        }

        if status.is_client_error() {
            log::error!(
                "HTTP {status}, request rejected\n  \
                 url: {url}\n  \
                 body preview: {}",
                preview(&text)
            );
            return Err(RoutingError::Rejected {
                status: status.as_u16(),
                message: preview(&text),
            });
        }

        match serde_json::from_str(&text) {
            Ok(value) => return Ok(value),
            Err(json_err) => {
                log::warn!(
                    "JSON parse failed (attempt {attempt}/{max_attempts})\n  \
                     url: {url}\n  \
                     status: {status}\n  \
                     received: {} bytes\n  \
                     parse error: {json_err}\n  \
                     body preview: {}",
                    text.len(),
                    preview(&text)
                );
                last_error = Some(RoutingError::Json(json_err));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| RoutingError::Provider {
        message: "request failed after all retries".to_string(),
    }))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedServer;

    const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        initial_delay_ms: 0,
        backoff_base_ms: 1,
    };

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(BODY_PREVIEW_LEN + 10);
        let p = preview(&body);
        assert_eq!(p.len(), BODY_PREVIEW_LEN + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(BODY_PREVIEW_LEN);
        let p = preview(&body);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn preview_keeps_short_bodies() {
        assert_eq!(preview("{\"error\":1}"), "{\"error\":1}");
    }

    #[tokio::test]
    async fn unreachable_host_fails_after_all_attempts() {
        let client = reqwest::Client::new();
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay_ms: 0,
            backoff_base_ms: 1,
        };
        let result = send_json(|| client.get("http://127.0.0.1:9/unreachable"), &policy).await;
        assert!(matches!(result, Err(RoutingError::Http(_))));
    }

    #[tokio::test]
    async fn server_error_is_retried_until_success() {
        let server = ScriptedServer::start(vec![(500, ""), (503, "{}"), (200, r#"{"ok":true}"#)]);
        let client = reqwest::Client::new();
        let url = format!("{}/v2/directions", server.base_url);

        let value = send_json(|| client.get(&url), &FAST).await.unwrap();

        assert_eq!(value["ok"], true);
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn client_error_is_rejected_without_retry() {
        let server = ScriptedServer::start(vec![(404, r#"{"error":"unknown profile"}"#)]);
        let client = reqwest::Client::new();
        let url = format!("{}/v2/directions", server.base_url);

        let result = send_json(|| client.get(&url), &FAST).await;

        assert!(matches!(result, Err(RoutingError::Rejected { status: 404, .. })));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn persistent_server_errors_exhaust_attempts() {
        let server = ScriptedServer::start(vec![(500, ""), (500, ""), (500, "")]);
        let client = reqwest::Client::new();
        let url = format!("{}/v2/directions", server.base_url);

        let result = send_json(|| client.get(&url), &FAST).await;

        assert!(matches!(result, Err(RoutingError::Provider { .. })));
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn unparseable_body_is_retried() {
        let server = ScriptedServer::start(vec![(200, "not json"), (200, "[1,2]")]);
        let client = reqwest::Client::new();
        let url = format!("{}/v2/directions", server.base_url);

        let value = send_json(|| client.get(&url), &FAST).await.unwrap();

        assert_eq!(value, serde_json::json!([1, 2]));
        assert_eq!(server.requests().len(), 2);
    }
}
