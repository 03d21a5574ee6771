//! Configuration for the request gate
//!
//! `GateConfig` is the library-side configuration, read once at startup and
//! handed to [`DispatchGate::new`](crate::DispatchGate::new). `Args` is the
//! CLI surface: clap arguments backed by environment variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use url::Url;

use crate::env::AppEnv;
use crate::error::{FetchError, Result};

/// User agent sent by the live transport
pub const DEFAULT_USER_AGENT: &str = concat!("fetch-gate/", env!("CARGO_PKG_VERSION"));

/// Process-wide gate configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Deployment environment; demo environments never touch the network
    pub env: AppEnv,
    /// Origin that relative routes resolve against
    pub origin: Option<Url>,
    /// Overall timeout enforced by the transport (none by default)
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            env: AppEnv::default(),
            origin: None,
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl GateConfig {
    /// Read `APP_ENV` (or `VITE_APP_ENV`) and `APP_ORIGIN` from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup("APP_ENV").or_else(|| lookup("VITE_APP_ENV")) {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => AppEnv::default(),
        };

        let origin = match lookup("APP_ORIGIN") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_origin(&raw)?),
            _ => None,
        };

        Ok(Self {
            env,
            origin,
            ..Default::default()
        })
    }

    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Parse an origin; only absolute http(s) URLs qualify
pub fn parse_origin(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| FetchError::Configuration(format!("invalid origin '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(FetchError::Configuration(format!(
            "origin must be an http(s) URL with a host, got '{}'",
            raw
        )));
    }

    Ok(url)
}

// ==================== CLI ====================

/// fetch-gate - environment-aware requests and signed-URL transfers
#[derive(Parser, Debug, Clone)]
#[command(name = "fetch-gate")]
#[command(about = "Dispatch requests and signed-URL transfers through the request gate")]
pub struct Args {
    /// Deployment environment (lovable-dev, lovable, development, staging, production)
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub app_env: AppEnv,

    /// Origin that relative routes resolve against (e.g. "https://admin.example.com")
    #[arg(long, env = "APP_ORIGIN")]
    pub origin: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in milliseconds (unset: no timeout beyond the transport's own)
    #[arg(long, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Dispatch a single request and print the decoded payload
    Request {
        /// Absolute URL or origin-relative path
        route: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header_pair)]
        headers: Vec<(String, String)>,

        /// Query parameter as "key=value" (repeatable)
        #[arg(short = 'q', long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,

        /// JSON body
        #[arg(long, conflicts_with = "data")]
        json: Option<String>,

        /// Raw text body
        #[arg(long)]
        data: Option<String>,

        /// JSON payload returned instead of a network call in demo environments
        #[arg(long)]
        mock: Option<String>,
    },

    /// Upload a local file through a signed-URL ticket
    Upload {
        /// Ticket-issuing route
        route: String,

        /// File to upload
        file: PathBuf,

        /// Declared content type of the file
        #[arg(long)]
        content_type: Option<String>,

        /// Metadata forwarded to the ticket route as "key=value" (repeatable)
        #[arg(short = 'q', long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
    },

    /// Request a time-bounded download link for a stored file
    DownloadUrl {
        /// Ticket-issuing route
        route: String,

        /// Storage path of the file
        file_path: String,

        /// Extra query parameter as "key=value" (repeatable)
        #[arg(short = 'q', long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
    },
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(origin) = &self.origin {
            parse_origin(origin).map_err(|e| e.to_string())?;
        }
        if self.request_timeout_ms == Some(0) {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Build the gate configuration these arguments describe
    pub fn gate_config(&self) -> Result<GateConfig> {
        let origin = self.origin.as_deref().map(parse_origin).transpose()?;

        Ok(GateConfig {
            env: self.app_env,
            origin,
            timeout: self.request_timeout_ms.map(Duration::from_millis),
            ..Default::default()
        })
    }
}

fn parse_query_pair(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn parse_header_pair(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected 'Name: value', got '{}'", raw))
}
