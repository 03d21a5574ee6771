//! Execution context injected into the gate.
//!
//! Bundles the two ambient capabilities a request needs: the origin that
//! relative routes resolve against, and the transport that moves bytes.
//! Tests swap in [`MockTransport`] and a fixed origin; the live client uses
//! [`ReqwestTransport`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use tracing::trace;
use url::Url;

use crate::error::{FetchError, Result};
use crate::request::RequestDescriptor;
use crate::response::RawResponse;

/// Moves a prepared request over the wire and buffers the response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform exactly one network call.
    ///
    /// Non-2xx responses are returned as `Ok`; only failures to obtain a
    /// response at all are errors.
    async fn execute(&self, url: Url, request: RequestDescriptor) -> Result<RawResponse>;
}

/// Origin plus transport, passed once into the gate.
#[derive(Clone)]
pub struct ExecutionContext {
    origin: Option<Url>,
    transport: Arc<dyn Transport>,
}

impl ExecutionContext {
    /// Create a context with an explicit origin and transport
    pub fn new(origin: Option<Url>, transport: Arc<dyn Transport>) -> Self {
        Self { origin, transport }
    }

    /// Context with no origin; only absolute routes can be resolved
    pub fn detached(transport: Arc<dyn Transport>) -> Self {
        Self::new(None, transport)
    }

    /// Origin that relative routes resolve against
    pub fn origin(&self) -> Option<&Url> {
        self.origin.as_ref()
    }

    /// Transport used for live calls
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("origin", &self.origin.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

// ==================== Live transport ====================

/// Transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with an optional overall timeout
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| FetchError::Configuration(format!("invalid user agent: {}", e)))?,
        );

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, url: Url, request: RequestDescriptor) -> Result<RawResponse> {
        let RequestDescriptor {
            method,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        // A failed read of an error body must not mask the status.
        let body = if status.is_success() {
            response.bytes().await?
        } else {
            response.bytes().await.unwrap_or_default()
        };

        trace!(status = status.as_u16(), bytes = body.len(), "response buffered");
        Ok(RawResponse::new(status, headers, body))
    }
}

// ==================== Mock transport ====================

/// A request as seen by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Recording transport for tests.
///
/// Replies with scripted responses in order, then with the fallback
/// (204 No Content unless changed).
pub struct MockTransport {
    script: Mutex<VecDeque<RawResponse>>,
    fallback: RawResponse,
    recorded: Mutex<Vec<RecordedRequest>>,
    call_count: AtomicU32,
}

impl MockTransport {
    /// Create a mock that answers every call with 204 No Content
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: RawResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), Bytes::new()),
            recorded: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Queue a response for the next unanswered call
    pub fn with_response(self, response: RawResponse) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
        self
    }

    /// Queue a JSON response with status 200
    pub fn with_json(self, value: serde_json::Value) -> Self {
        self.with_response(RawResponse::json(StatusCode::OK, &value))
    }

    /// Set the response used once the script runs out
    pub fn with_fallback(mut self, response: RawResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Number of calls that reached the transport
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Snapshot of every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, url: Url, request: RequestDescriptor) -> Result<RawResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(RecordedRequest {
                url,
                method: request.method,
                headers: request.headers,
                body: request.body,
            });
        }

        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}
