//! fetch-gate - environment-aware request layer
//!
//! Every outbound call an application makes goes through one
//! [`DispatchGate`]. The gate:
//! - fulfills calls from caller-supplied mock payloads in demo environments
//!   (`lovable`, `lovable-dev`), with a fixed artificial delay and no network
//! - otherwise normalizes the call (absolute URL, query merge, method, headers,
//!   JSON vs. wire-ready bodies), sends it once and decodes the response
//!
//! [`SignedTransfer`] builds the two-phase signed-URL upload and download-link
//! flows on top of the gate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │      SignedTransfer      │  ticket → transfer
//! └────────────┬─────────────┘
//!              ▼
//! ┌──────────────────────────┐
//! │       DispatchGate       │  demo: mock + delay
//! └──────┬────────────┬──────┘  live: build → send → decode
//!        ▼            ▼
//! ┌────────────┐ ┌────────────┐
//! │  request   │ │  response  │
//! └────────────┘ └────────────┘
//!        │ ExecutionContext (origin + Transport)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use fetch_gate::{
//!     DispatchGate, GateConfig, LocalFile, Query, SignedTransfer, UploadRequest,
//! };
//!
//! # async fn example() -> fetch_gate::Result<()> {
//! let gate = DispatchGate::new(GateConfig::from_env()?)?;
//! let transfer = SignedTransfer::new(gate);
//!
//! let file = LocalFile::from_path("./kyc.pdf", Some("application/pdf".into()));
//! let storage_path = transfer
//!     .upload_file(
//!         UploadRequest::new("/sc3_admin/gcs/upload_ticket", file)
//!             .with_options(Query::map().with("folder", "kyc")),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod gate;
pub mod request;
pub mod response;
pub mod transfer;

// Re-export main types
pub use config::{GateConfig, DEFAULT_USER_AGENT};
pub use context::{ExecutionContext, MockTransport, RecordedRequest, ReqwestTransport, Transport};
pub use env::AppEnv;
pub use error::{FetchError, Result};
pub use gate::{DispatchGate, DEMO_DELAY};
pub use request::{build_url, prepare_request, Body, Query, RequestDescriptor, RequestOptions, Route};
pub use response::{decode_response, Payload, RawResponse};
pub use transfer::{DownloadRequest, LocalFile, SignedTicket, SignedTransfer, UploadRequest};
