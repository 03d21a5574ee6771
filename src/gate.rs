//! Dispatch gate
//!
//! The single entry point for outbound calls. In a demo environment every
//! call is fulfilled from the caller's mock payload after a fixed delay and
//! nothing touches the network; otherwise the call is built, sent once and
//! decoded.
//!
//! # Example
//!
//! ```rust,no_run
//! use fetch_gate::{DispatchGate, GateConfig, Query, RequestOptions};
//! use serde_json::{json, Value};
//!
//! # async fn example() -> fetch_gate::Result<()> {
//! let gate = DispatchGate::new(GateConfig::from_env()?)?;
//!
//! let sellers: Value = gate
//!     .dispatch(
//!         "/sc3_admin/sellers/list",
//!         RequestOptions::get(Query::map().with("page", 1)),
//!         Some(json!({"success": true, "data": []})),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::GateConfig;
use crate::context::{ExecutionContext, ReqwestTransport};
use crate::env::AppEnv;
use crate::error::{FetchError, Result};
use crate::request::{build_url, prepare_request, RequestOptions, Route};
use crate::response::{decode_response, Payload};

/// Artificial latency applied to every demo-mode call
pub const DEMO_DELAY: Duration = Duration::from_millis(500);

/// Environment-aware request gate.
///
/// Cheap to clone; clones share the transport. Calls are independent of one
/// another and may run concurrently.
#[derive(Debug, Clone)]
pub struct DispatchGate {
    env: AppEnv,
    context: ExecutionContext,
}

impl DispatchGate {
    /// Create a gate with the live reqwest transport
    pub fn new(config: GateConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.user_agent, config.timeout)?;
        Ok(Self::with_context(
            config.env,
            ExecutionContext::new(config.origin, Arc::new(transport)),
        ))
    }

    /// Create a gate over an explicit execution context
    pub fn with_context(env: AppEnv, context: ExecutionContext) -> Self {
        Self { env, context }
    }

    pub fn env(&self) -> AppEnv {
        self.env
    }

    /// Check if calls are fulfilled from mock payloads
    pub fn is_demo(&self) -> bool {
        self.env.is_demo()
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Dispatch a call and convert the result into `T`.
    ///
    /// `mock` is returned unchanged in demo mode and ignored otherwise.
    /// Any present value counts, including `0`, `""` and `false`.
    pub async fn dispatch<T: DeserializeOwned>(
        &self,
        route: impl Into<Route>,
        options: RequestOptions,
        mock: Option<T>,
    ) -> Result<T> {
        let route = route.into();
        if self.is_demo() {
            return self.fulfill_from_mock(&route, mock).await;
        }
        self.send(route, options).await?.into_typed()
    }

    /// Dispatch a call and return the decoded payload as-is
    pub async fn dispatch_payload(
        &self,
        route: impl Into<Route>,
        options: RequestOptions,
        mock: Option<Payload>,
    ) -> Result<Payload> {
        let route = route.into();
        if self.is_demo() {
            return self.fulfill_from_mock(&route, mock).await;
        }
        self.send(route, options).await
    }

    async fn fulfill_from_mock<T>(&self, route: &Route, mock: Option<T>) -> Result<T> {
        let mock = mock.ok_or_else(|| {
            FetchError::Configuration(format!(
                "mock response required for '{}' when APP_ENV is '{}'",
                route, self.env
            ))
        })?;

        debug!(%route, env = %self.env, "fulfilling from mock payload");
        tokio::time::sleep(DEMO_DELAY).await;
        Ok(mock)
    }

    async fn send(&self, route: Route, options: RequestOptions) -> Result<Payload> {
        let url = build_url(self.context.origin(), &route, options.query.as_ref())?;
        let descriptor = prepare_request(options)?;

        debug!(method = %descriptor.method, %url, "dispatching request");
        let response = self.context.transport().execute(url, descriptor).await?;
        decode_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MockTransport;
    use crate::request::Query;
    use crate::response::RawResponse;
    use reqwest::{Method, StatusCode};
    use serde_json::{json, Value};
    use tokio::time::Instant;
    use url::Url;

    fn gate(env: AppEnv, transport: Arc<MockTransport>) -> DispatchGate {
        let origin = Url::parse("https://admin.example.com").unwrap();
        DispatchGate::with_context(env, ExecutionContext::new(Some(origin), transport))
    }

    #[tokio::test]
    async fn test_demo_requires_mock() {
        let transport = Arc::new(MockTransport::new());
        let gate = gate(AppEnv::Lovable, transport.clone());

        let err = gate
            .dispatch::<Value>("/sellers", RequestOptions::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Configuration(ref m) if m.contains("mock response required")));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_returns_mock_after_delay() {
        let transport = Arc::new(MockTransport::new());
        let gate = gate(AppEnv::LovableDev, transport.clone());

        let started = Instant::now();
        let value: Value = gate
            .dispatch("/sellers", RequestOptions::new(), Some(json!({"x": 1})))
            .await
            .unwrap();

        assert_eq!(value, json!({"x": 1}));
        assert!(started.elapsed() >= DEMO_DELAY);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_preserves_falsy_mocks() {
        let gate = gate(AppEnv::Lovable, Arc::new(MockTransport::new()));

        let zero: i64 = gate.dispatch("/n", RequestOptions::new(), Some(0)).await.unwrap();
        assert_eq!(zero, 0);

        let empty: String = gate
            .dispatch("/s", RequestOptions::new(), Some(String::new()))
            .await
            .unwrap();
        assert_eq!(empty, "");

        let no: bool = gate.dispatch("/b", RequestOptions::new(), Some(false)).await.unwrap();
        assert!(!no);
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_skips_route_resolution() {
        let transport = Arc::new(MockTransport::new());
        let gate = DispatchGate::with_context(
            AppEnv::Lovable,
            ExecutionContext::detached(transport.clone()),
        );

        let value: Value = gate
            .dispatch("/relative/without/origin", RequestOptions::new(), Some(json!([])))
            .await
            .unwrap();
        assert_eq!(value, json!([]));
    }

    #[tokio::test]
    async fn test_live_sends_exactly_one_request() {
        let transport = Arc::new(
            MockTransport::new().with_json(json!({"success": true, "data": [{"id": 1}]})),
        );
        let gate = gate(AppEnv::Production, transport.clone());

        let value: Value = gate
            .dispatch(
                "/sc3_admin/sellers/list",
                RequestOptions::get(Query::map().with("page", 2).with("name", Value::Null)),
                Some(json!({"ignored": true})),
            )
            .await
            .unwrap();

        assert_eq!(value["data"][0]["id"], 1);
        assert_eq!(transport.call_count(), 1);

        let requests = transport.requests();
        let sent = &requests[0];
        assert_eq!(sent.method, Method::GET);
        assert_eq!(
            sent.url.as_str(),
            "https://admin.example.com/sc3_admin/sellers/list?page=2"
        );
    }

    #[tokio::test]
    async fn test_live_posts_json() {
        let transport = Arc::new(MockTransport::new().with_json(json!({"seller_id": 9})));
        let gate = gate(AppEnv::Staging, transport.clone());

        #[derive(serde::Deserialize)]
        struct Created {
            seller_id: u32,
        }

        let created: Created = gate
            .dispatch(
                "/sc3_admin/sellers",
                RequestOptions::new()
                    .method("post")
                    .json(&json!({"name": "Acme"}))
                    .unwrap(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(created.seller_id, 9);

        let requests = transport.requests();
        let sent = &requests[0];
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.headers["content-type"], "application/json");
        assert_eq!(sent.body.as_deref(), Some(&br#"{"name":"Acme"}"#[..]));
    }

    #[tokio::test]
    async fn test_live_failure_propagates() {
        let transport = Arc::new(
            MockTransport::new().with_response(RawResponse::text(StatusCode::NOT_FOUND, "not found")),
        );
        let gate = gate(AppEnv::Development, transport);

        let err = gate
            .dispatch::<Value>("/missing", RequestOptions::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_live_no_content_payload() {
        let gate = gate(AppEnv::Development, Arc::new(MockTransport::new()));

        let payload = gate
            .dispatch_payload("/ping", RequestOptions::new().method("DELETE"), None)
            .await
            .unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_live_relative_route_without_origin_fails_before_transport() {
        let transport = Arc::new(MockTransport::new());
        let gate = DispatchGate::with_context(
            AppEnv::Production,
            ExecutionContext::detached(transport.clone()),
        );

        let err = gate
            .dispatch_payload("/sellers", RequestOptions::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(json!({"n": 1}))
                .with_json(json!({"n": 2})),
        );
        let gate = gate(AppEnv::Production, transport.clone());

        let (a, b) = tokio::join!(
            gate.dispatch::<Value>("/a", RequestOptions::new(), None),
            gate.dispatch::<Value>("/b", RequestOptions::new(), None),
        );

        let mut seen = vec![a.unwrap()["n"].as_i64(), b.unwrap()["n"].as_i64()];
        seen.sort();
        assert_eq!(seen, vec![Some(1), Some(2)]);
        assert_eq!(transport.call_count(), 2);
    }
}
