use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{snippet, FetchError};
use crate::policy::{RateLimiter, RetryPolicy};
use crate::transport::{HttpResponse, HttpTransport, TransportError};

/// A GET request: base URL plus query parameters and headers.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The URL with query parameters appended (existing ones are kept).
    pub fn full_url(&self) -> Result<String, FetchError> {
        let mut url = Url::parse(&self.url).map_err(|e| FetchError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url.to_string())
    }
}

/// Where a dataset's payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOrigin {
    Api,
    Fallback,
    Empty,
}

impl std::fmt::Display for FetchOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchOrigin::Api => f.pad("api"),
            FetchOrigin::Fallback => f.pad("fallback"),
            FetchOrigin::Empty => f.pad("empty"),
        }
    }
}

/// Tagged result of a fetch that may fall back to a local snapshot.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Live upstream payload.
    Api(Value),
    /// Upstream failed; a local snapshot was used instead.
    Fallback {
        data: Value,
        path: PathBuf,
        cause: FetchError,
    },
    /// Upstream failed and no usable snapshot exists.
    Empty { cause: FetchError },
}

impl FetchOutcome {
    pub fn origin(&self) -> FetchOrigin {
        match self {
            FetchOutcome::Api(_) => FetchOrigin::Api,
            FetchOutcome::Fallback { .. } => FetchOrigin::Fallback,
            FetchOutcome::Empty { .. } => FetchOrigin::Empty,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            FetchOutcome::Api(data) | FetchOutcome::Fallback { data, .. } => Some(data),
            FetchOutcome::Empty { .. } => None,
        }
    }

    /// The upstream failure, if the API was not the source.
    pub fn cause(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Api(_) => None,
            FetchOutcome::Fallback { cause, .. } | FetchOutcome::Empty { cause } => Some(cause),
        }
    }
}

/// Retrying JSON fetcher bound to one source's rate limit.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    limiter: Arc<RateLimiter>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            limiter: Arc::new(RateLimiter::unlimited()),
        }
    }

    /// Same transport and policy, with its own limiter.
    pub fn with_rate_limit(&self, limiter: RateLimiter) -> Self {
        Self {
            transport: self.transport.clone(),
            policy: self.policy.clone(),
            limiter: Arc::new(limiter),
        }
    }

    /// Same transport and limiter, different retry policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            transport: self.transport.clone(),
            policy,
            limiter: self.limiter.clone(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `request` and decode the body as JSON.
    ///
    /// Network errors, 408, 429 and 5xx responses are retried with backoff.
    /// Other 4xx responses and undecodable bodies fail immediately. When all
    /// attempts fail the error is [`FetchError::Exhausted`] wrapping the last cause.
    pub async fn fetch_json(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        let url = request.full_url()?;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.limiter.acquire().await;
            debug!(url = %url, attempt, "GET");

            let result = self.transport.get(&url, &request.headers).await;
            let (error, retry_after) = match result {
                Ok(response) if response.is_success() => return decode(&url, response),
                Ok(response) if is_retryable_status(response.status) => (
                    FetchError::Status {
                        url: url.clone(),
                        status: response.status,
                        body: snippet(&response.body),
                    },
                    response.retry_after,
                ),
                Ok(response) => {
                    warn!(
                        url = %url,
                        status = response.status,
                        "permanent client error, not retrying"
                    );
                    return Err(FetchError::Client {
                        url: url.clone(),
                        status: response.status,
                        body: snippet(&response.body),
                    });
                }
                Err(e) => (network_error(&url, e), None),
            };

            if attempt >= self.policy.max_attempts {
                warn!(url = %url, attempts = attempt, error = %error, "retries exhausted");
                return Err(FetchError::Exhausted {
                    url,
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay_for(attempt, retry_after);
            warn!(
                url = %url,
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Fetch from the API, falling back to a local JSON snapshot on failure.
    pub async fn fetch_with_fallback(
        &self,
        request: &FetchRequest,
        fallback: Option<&Path>,
    ) -> FetchOutcome {
        let cause = match self.fetch_json(request).await {
            Ok(data) => return FetchOutcome::Api(data),
            Err(e) => e,
        };

        let Some(path) = fallback else {
            return FetchOutcome::Empty { cause };
        };

        match read_snapshot(path).await {
            Ok(data) => {
                info!(path = %path.display(), error = %cause, "using fallback snapshot");
                FetchOutcome::Fallback {
                    data,
                    path: path.to_path_buf(),
                    cause,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "fallback snapshot unusable");
                FetchOutcome::Empty { cause }
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

fn network_error(url: &str, e: TransportError) -> FetchError {
    FetchError::Network {
        url: url.to_string(),
        message: e.to_string(),
    }
}

fn decode(url: &str, response: HttpResponse) -> Result<Value, FetchError> {
    serde_json::from_str(&response.body).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

async fn read_snapshot(path: &Path) -> Result<Value, String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| e.to_string())?;
    serde_json::from_str(&raw).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedTransport;
    use serde_json::json;
    use std::time::Duration;

    const URL: &str = "https://api.example.org/v1/casualties";

    fn fetcher(transport: Arc<ScriptedTransport>, max_attempts: u32) -> Fetcher {
        Fetcher::new(transport, RetryPolicy::immediate(max_attempts))
    }

    #[tokio::test]
    async fn succeeds_after_k_failures_with_k_plus_one_attempts() {
        for k in 0..4usize {
            let transport = Arc::new(
                ScriptedTransport::new()
                    .fail_times(URL, k)
                    .respond_json(URL, json!([{"date": "2024-01-01"}])),
            );
            let f = fetcher(transport.clone(), 5);
            let data = f.fetch_json(&FetchRequest::new(URL)).await.unwrap();
            assert_eq!(data, json!([{"date": "2024-01-01"}]));
            assert_eq!(transport.calls(URL), k + 1);
        }
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let transport = Arc::new(ScriptedTransport::new().fail(URL, "connection reset"));
        let f = fetcher(transport.clone(), 3);
        let err = f.fetch_json(&FetchRequest::new(URL)).await.unwrap_err();
        match err {
            FetchError::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FetchError::Network { .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(transport.calls(URL), 3);
    }

    #[tokio::test]
    async fn server_errors_and_rate_limits_are_retried() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(URL, HttpResponse::status(503))
                .respond(URL, HttpResponse::status(429))
                .respond_json(URL, json!({"ok": true})),
        );
        let f = fetcher(transport.clone(), 3);
        let data = f.fetch_json(&FetchRequest::new(URL)).await.unwrap();
        assert_eq!(data["ok"], true);
        assert_eq!(transport.calls(URL), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let transport = Arc::new(ScriptedTransport::new().respond(URL, HttpResponse::status(404)));
        let f = fetcher(transport.clone(), 5);
        let err = f.fetch_json(&FetchRequest::new(URL)).await.unwrap_err();
        assert!(matches!(err, FetchError::Client { status: 404, .. }));
        assert_eq!(transport.calls(URL), 1);
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let transport = Arc::new(
            ScriptedTransport::new().respond(URL, HttpResponse::ok("<html>maintenance</html>")),
        );
        let f = fetcher(transport.clone(), 3);
        let err = f.fetch_json(&FetchRequest::new(URL)).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        assert_eq!(transport.calls(URL), 1);
    }

    #[tokio::test]
    async fn query_and_headers_are_sent() {
        let transport = Arc::new(ScriptedTransport::new().respond_json(URL, json!([])));
        let f = fetcher(transport.clone(), 1);
        let request = FetchRequest::new(URL)
            .query("app_identifier", "abc")
            .query("limit", "10")
            .header("x-api-key", "k");
        f.fetch_json(&request).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, format!("{URL}?app_identifier=abc&limit=10"));
        assert_eq!(requests[0].1, vec![("x-api-key".to_string(), "k".to_string())]);
    }

    #[tokio::test]
    async fn invalid_url_fails_without_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let f = fetcher(transport.clone(), 3);
        let err = f.fetch_json(&FetchRequest::new("not a url")).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn fallback_outcomes_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("demolitions.json");
        std::fs::write(&snapshot, r#"{"data":[{"date":"2024-02-01"}]}"#).unwrap();

        let ok = Arc::new(ScriptedTransport::new().respond_json(URL, json!([1])));
        let outcome = fetcher(ok, 2)
            .fetch_with_fallback(&FetchRequest::new(URL), Some(&snapshot))
            .await;
        assert_eq!(outcome.origin(), FetchOrigin::Api);
        assert!(outcome.cause().is_none());

        let down = Arc::new(ScriptedTransport::new().fail(URL, "down"));
        let outcome = fetcher(down.clone(), 2)
            .fetch_with_fallback(&FetchRequest::new(URL), Some(&snapshot))
            .await;
        assert_eq!(outcome.origin(), FetchOrigin::Fallback);
        assert_eq!(outcome.data().unwrap()["data"][0]["date"], "2024-02-01");

        let missing = dir.path().join("missing.json");
        let outcome = fetcher(down.clone(), 2)
            .fetch_with_fallback(&FetchRequest::new(URL), Some(&missing))
            .await;
        assert_eq!(outcome.origin(), FetchOrigin::Empty);
        assert!(outcome.data().is_none());

        let outcome = fetcher(down, 2)
            .fetch_with_fallback(&FetchRequest::new(URL), None)
            .await;
        assert!(matches!(
            outcome,
            FetchOutcome::Empty {
                cause: FetchError::Exhausted { attempts: 2, .. }
            }
        ));
    }

    #[tokio::test]
    async fn rate_limit_applies_between_attempts() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail_times(URL, 2)
                .respond_json(URL, json!([])),
        );
        let f = fetcher(transport, 3).with_rate_limit(RateLimiter::new(Duration::from_millis(30)));
        let start = tokio::time::Instant::now();
        f.fetch_json(&FetchRequest::new(URL)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
