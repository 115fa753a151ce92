//! One network request for one logical resource.
//!
//! [`ResourceFetcher`] is the seam between everything that reasons about
//! audit data and the wire. The production implementation is
//! [`HttpFetcher`]; tests substitute fakes that serve canned payloads.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors from a single fetch attempt.
///
/// All three variants isolate to the job that produced them — a batch of
/// jobs never fails as a whole because one fetch did.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx status. When the body still parsed as JSON it is attached
    /// for diagnostics; status classification wins over decode success.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    /// 2xx response whose body was not valid JSON. Carries the raw text.
    #[error("malformed response body: {raw}")]
    Decode { raw: String },
}

/// Outcome of one fetch job.
pub type FetchOutcome = Result<Value, FetchError>;

/// HTTP method for a fetch target. Only the two the backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully described fetch job: where to go and what to send.
/// Immutable once built (by the endpoint catalog).
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub url: String,
    pub method: Method,
    pub body: Option<Value>,
}

impl Target {
    pub fn get(url: String) -> Self {
        Self {
            url,
            method: Method::Get,
            body: None,
        }
    }

    pub fn post(url: String, body: Value) -> Self {
        Self {
            url,
            method: Method::Post,
            body: Some(body),
        }
    }
}

/// Fetch one resource, decoded as JSON.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch_json(&self, target: &Target) -> FetchOutcome;
}

/// Production fetcher over a shared [`reqwest::Client`].
pub struct HttpFetcher {
    client: reqwest::Client,
    csrf_token: Option<String>,
}

impl HttpFetcher {
    pub fn new(csrf_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            csrf_token,
        }
    }
}

/// Pull a human-readable message out of a decoded error body.
fn error_message(body: &Value, status: u16) -> String {
    for key in ["message", "msg", "error"] {
        if let Some(s) = body.get(key).and_then(Value::as_str) {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    format!("HTTP {status}")
}

/// Classify one response into an outcome.
///
/// A non-2xx status wins over decode success: even a body that parses
/// cleanly is a [`FetchError::Status`] then, with the decoded body attached
/// for diagnostics. A 2xx with an undecodable body is [`FetchError::Decode`]
/// carrying the raw text.
fn classify_response(status: u16, text: String) -> FetchOutcome {
    let decoded: Result<Value, _> = serde_json::from_str(&text);

    if !(200..300).contains(&status) {
        let body = decoded.ok();
        let message = body
            .as_ref()
            .map(|b| error_message(b, status))
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(FetchError::Status { status, message, body });
    }

    decoded.map_err(|_| FetchError::Decode { raw: text })
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch_json(&self, target: &Target) -> FetchOutcome {
        let mut req = match target.method {
            Method::Get => self.client.get(&target.url),
            Method::Post => self.client.post(&target.url),
        };
        if let Some(body) = &target.body {
            // .json sets the content-type header as well
            req = req.json(body);
        }
        if let Some(token) = &self.csrf_token {
            // the backend accepts either spelling; send both
            req = req.header("x-csrftoken", token).header("x-csrf-token", token);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        let outcome = classify_response(status, text);
        if let Err(err) = &outcome {
            debug!(url = %target.url, error = %err, "fetch failed");
        }
        outcome
    }
}
