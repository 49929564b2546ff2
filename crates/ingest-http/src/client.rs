// SPDX-License-Identifier: MIT OR Apache-2.0
//! Throttled, retrying HTTP requester with endpoint (mirror) rotation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use ingest_error::{ErrorCode, IngestError};
use ingest_retry::{retry_async, RetryDecision, RetryPolicy, DEFAULT_RETRY_STATUSES};
use tracing::debug;

use crate::throttle::Throttle;

/// A successful HTTP response, fully buffered.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header value, if present.
    pub content_type: Option<String>,
    /// Response body, fully read.
    pub body: Vec<u8>,
    /// Number of failed attempts before this response was obtained.
    pub retries: u32,
}

/// A single failed attempt, before retry classification.
#[derive(Debug)]
enum AttemptError {
    Transport(String),
    Status { code: u16, retry_after: Option<Duration> },
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Transport(msg) => write!(f, "transport error: {msg}"),
            AttemptError::Status { code, .. } => write!(f, "http status {code}"),
        }
    }
}

fn classify(err: &AttemptError) -> RetryDecision {
    match err {
        AttemptError::Transport(_) => RetryDecision::Retry,
        AttemptError::Status { code, retry_after } => {
            if let Some(delay) = retry_after {
                return RetryDecision::RetryAfter(*delay);
            }
            if DEFAULT_RETRY_STATUSES.contains(code) {
                RetryDecision::Retry
            } else {
                RetryDecision::Fatal
            }
        }
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Throttled, retrying HTTP client with mirror-endpoint rotation.
pub struct Requester {
    client: reqwest::Client,
    policy: RetryPolicy,
    throttle: Throttle,
}

impl Requester {
    /// Build a requester with the given retry policy, per-attempt timeout,
    /// and minimum inter-request interval.
    pub fn new(policy: RetryPolicy, timeout: Duration, min_interval: Duration) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            IngestError::new(ErrorCode::Internal, format!("failed to build http client: {e}")).with_source(e)
        })?;
        Ok(Self {
            client,
            policy,
            throttle: Throttle::new(min_interval),
        })
    }

    async fn get_once(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        query: &[(String, String)],
    ) -> Result<HttpResponse, AttemptError> {
        let outcome = retry_async(
            &self.policy,
            || async {
                self.throttle.wait().await;
                debug!(target: "ingest.http", url, "issuing request");
                let mut builder = self.client.get(url);
                for (k, v) in headers {
                    builder = builder.header(k.as_str(), v.as_str());
                }
                if !query.is_empty() {
                    builder = builder.query(query);
                }
                let response = builder
                    .send()
                    .await
                    .map_err(|e| AttemptError::Transport(e.to_string()))?;
                let status = response.status();
                if status.is_success() {
                    let content_type = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| AttemptError::Transport(e.to_string()))?
                        .to_vec();
                    Ok(HttpResponse {
                        status: status.as_u16(),
                        content_type,
                        body,
                        retries: 0,
                    })
                } else {
                    let retry_after = parse_retry_after(response.headers());
                    Err(AttemptError::Status {
                        code: status.as_u16(),
                        retry_after,
                    })
                }
            },
            classify,
        )
        .await;

        outcome.map(|o| HttpResponse {
            retries: o.metadata.failed_attempts.len() as u32,
            ..o.value
        })
    }

    /// GET `path` against each endpoint in turn, retrying within each
    /// endpoint before moving to the next; surfaces the last endpoint's
    /// error once all are exhausted.
    pub async fn get(
        &self,
        endpoints: &[String],
        path: &str,
        headers: &BTreeMap<String, String>,
        query: &[(String, String)],
    ) -> Result<HttpResponse, IngestError> {
        let mut last_err = None;
        for endpoint in endpoints {
            let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
            match self.get_once(&url, headers, query).await {
                Ok(resp) => return Ok(resp),
                Err(e) => last_err = Some((endpoint.clone(), e)),
            }
        }
        let (endpoint, err) = last_err.expect("endpoints is non-empty, checked by config validation");
        Err(to_ingest_error(endpoint, err))
    }

    /// GET a single fully-qualified URL (used for the link-file pattern's
    /// second stage, which targets a pre-signed link rather than a
    /// configured endpoint).
    pub async fn get_url(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<HttpResponse, IngestError> {
        self.get_once(url, headers, &[])
            .await
            .map_err(|e| to_ingest_error(url.to_string(), e))
    }
}

fn to_ingest_error(endpoint: String, err: AttemptError) -> IngestError {
    let mut built = IngestError::new(
        ErrorCode::SourceTransportExhausted,
        format!("request to '{endpoint}' failed after retries: {err}"),
    )
    .with_context("endpoint", crate::mask::mask_url_default(&endpoint));
    if let AttemptError::Status { code, .. } = err {
        built = built.with_context("status", code);
    }
    built
}
