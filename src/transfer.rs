//! Signed-URL transfers against object storage.
//!
//! Both operations are two-phase: a ticket request to the application
//! service, then the transfer itself (upload), or handing the signed link
//! back to the caller (download). Nothing here tracks link expiry.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{FetchError, Result};
use crate::gate::DispatchGate;
use crate::request::{Query, RequestOptions, Route};
use crate::response::Payload;

const EXAMPLE_FILE_PATH: &str = "/uploads/example-file.txt";
const EXAMPLE_FILE_URL: &str = "https://www.example.com/your-bucket/uploads/example-file.txt";

/// Ticket issued by the storage service.
///
/// Producers use either the primary names (`file_path`, `file_url`) or the
/// legacy aliases (`path`, `url`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTicket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SignedTicket {
    /// Demo fixture for upload tickets
    pub fn example() -> Self {
        Self {
            file_path: Some(EXAMPLE_FILE_PATH.to_string()),
            file_url: Some(EXAMPLE_FILE_URL.to_string()),
            ..Default::default()
        }
    }

    /// Demo fixture for download links
    pub fn example_link() -> Self {
        Self {
            file_url: Some(EXAMPLE_FILE_URL.to_string()),
            ..Default::default()
        }
    }

    /// Signed URL: `file_url`, falling back to `url`
    pub fn signed_url(&self) -> Option<&str> {
        resolve_alias(&self.file_url, &self.url)
    }

    /// Storage path: `file_path`, falling back to `path`
    pub fn storage_path(&self) -> Option<&str> {
        resolve_alias(&self.file_path, &self.path)
    }

    /// Read a ticket out of a decoded response.
    ///
    /// Anything other than a JSON object, or a field holding something other
    /// than a string or `null`, is an invalid ticket.
    pub fn from_payload(payload: Payload) -> Result<Self> {
        let fields = match payload {
            Payload::Json(Value::Object(fields)) => fields,
            Payload::Json(other) => {
                return Err(FetchError::InvalidTicket(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
            Payload::Text(_) => {
                return Err(FetchError::InvalidTicket(
                    "expected a JSON object, got a text body".to_string(),
                ))
            }
            Payload::Empty => {
                return Err(FetchError::InvalidTicket(
                    "expected a JSON object, got no content".to_string(),
                ))
            }
        };

        Ok(Self {
            file_path: string_field(&fields, "file_path")?,
            file_url: string_field(&fields, "file_url")?,
            path: string_field(&fields, "path")?,
            url: string_field(&fields, "url")?,
        })
    }

    fn into_payload(self) -> Result<Payload> {
        Ok(Payload::Json(serde_json::to_value(self)?))
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Result<Option<String>> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(FetchError::InvalidTicket(format!(
            "field '{}' must be a string, got {}",
            name,
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Single place where field aliases are resolved. Empty strings count as absent.
fn resolve_alias<'a>(primary: &'a Option<String>, alias: &'a Option<String>) -> Option<&'a str> {
    [primary, alias]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .find(|value| !value.is_empty())
}

// ==================== Local files ====================

#[derive(Debug, Clone)]
enum FileSource {
    Memory(Bytes),
    Disk(PathBuf),
}

/// File to upload: a name, a declared content type and its contents
#[derive(Debug, Clone)]
pub struct LocalFile {
    name: String,
    content_type: String,
    source: FileSource,
}

impl LocalFile {
    /// File already held in memory
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            source: FileSource::Memory(bytes.into()),
        }
    }

    /// File on disk, read when the transfer starts
    pub fn from_path(path: impl AsRef<Path>, content_type: Option<String>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name,
            content_type: content_type.unwrap_or_default(),
            source: FileSource::Disk(path.to_path_buf()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared content type; `None` when nothing was declared
    pub fn content_type(&self) -> Option<&str> {
        Some(self.content_type.as_str()).filter(|ct| !ct.is_empty())
    }

    /// Materialize the full contents in memory
    pub async fn read(&self) -> Result<Bytes> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Disk(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }
}

// ==================== Requests ====================

/// Inputs for [`SignedTransfer::upload_file`]
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub route: Route,
    /// Metadata forwarded to the ticket route as query parameters
    pub options: Option<Query>,
    pub file: LocalFile,
    /// Ticket returned in demo mode
    pub mock_ticket: SignedTicket,
}

impl UploadRequest {
    pub fn new(route: impl Into<Route>, file: LocalFile) -> Self {
        Self {
            route: route.into(),
            options: None,
            file,
            mock_ticket: SignedTicket::example(),
        }
    }

    pub fn with_options(mut self, options: Query) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_mock_ticket(mut self, ticket: SignedTicket) -> Self {
        self.mock_ticket = ticket;
        self
    }
}

/// Inputs for [`SignedTransfer::download_url`]
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub route: Route,
    /// Storage path of the file; sent as the `file_path` query parameter
    pub file_path: String,
    /// Extra query parameters; `file_path` always overrides a same-named entry
    pub options: Option<Query>,
    /// Link returned in demo mode
    pub mock_link: SignedTicket,
}

impl DownloadRequest {
    pub fn new(file_path: impl Into<String>, route: impl Into<Route>) -> Self {
        Self {
            route: route.into(),
            file_path: file_path.into(),
            options: None,
            mock_link: SignedTicket::example_link(),
        }
    }

    pub fn with_options(mut self, options: Query) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_mock_link(mut self, link: SignedTicket) -> Self {
        self.mock_link = link;
        self
    }
}

// ==================== Orchestrator ====================

/// Ticket-then-transfer operations built on a [`DispatchGate`]
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    gate: DispatchGate,
}

impl SignedTransfer {
    pub fn new(gate: DispatchGate) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &DispatchGate {
        &self.gate
    }

    /// Upload a file through a signed URL and return its storage path.
    ///
    /// The ticket request strictly precedes the transfer. A failure in either
    /// step fails the whole operation; retry the whole sequence.
    pub async fn upload_file(&self, request: UploadRequest) -> Result<String> {
        let UploadRequest {
            route,
            options,
            file,
            mock_ticket,
        } = request;

        let payload = self
            .gate
            .dispatch_payload(
                route,
                RequestOptions::get(options.unwrap_or_else(Query::map)),
                Some(mock_ticket.into_payload()?),
            )
            .await?;
        let ticket = SignedTicket::from_payload(payload)?;

        let (Some(signed_url), Some(storage_path)) = (ticket.signed_url(), ticket.storage_path())
        else {
            return Err(FetchError::InvalidTicket(
                "missing signed URL or file path".to_string(),
            ));
        };

        let contents = file.read().await?;
        debug!(
            file = file.name(),
            bytes = contents.len(),
            storage_path,
            "transferring to signed URL"
        );

        // Signed URLs may bind the content type, so send only what was declared.
        let mut options = RequestOptions::new().method("PUT").body(contents);
        if let Some(content_type) = file.content_type() {
            options = options.header("Content-Type", content_type);
        }

        // The transfer target answers with nothing usable; demo mode gets the
        // same absent value so a demo upload completes.
        self.gate
            .dispatch_payload(signed_url, options, Some(Payload::Empty))
            .await?;

        Ok(storage_path.to_string())
    }

    /// Obtain a time-bounded download link for a stored file.
    pub async fn download_url(&self, request: DownloadRequest) -> Result<String> {
        let DownloadRequest {
            route,
            file_path,
            options,
            mock_link,
        } = request;

        let query = options
            .unwrap_or_else(Query::map)
            .with("file_path", file_path);

        let payload = self
            .gate
            .dispatch_payload(route, RequestOptions::get(query), Some(mock_link.into_payload()?))
            .await?;
        let link = SignedTicket::from_payload(payload)?;

        link.signed_url()
            .map(str::to_string)
            .ok_or_else(|| FetchError::InvalidTicket("missing file URL".to_string()))
    }
}
