//! Response decoder

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{FetchError, Result};

/// A completed, fully buffered response
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response with a JSON body and matching content type
    pub fn json(status: StatusCode, value: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self::new(status, headers, Bytes::from(value.to_string()))
    }

    /// Response with a plain-text body
    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::new(status, headers, Bytes::from(text.into()))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    fn content_type(&self) -> &str {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON document
    Json(Value),
    /// Body of any non-JSON content type
    Text(String),
    /// No content (204); distinct from a JSON `null`
    Empty,
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Convert into a caller type.
    ///
    /// Text becomes a JSON string and `Empty` becomes `null`, so `()` and
    /// `Option<T>` accept a no-content response.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self {
            Payload::Json(value) => value,
            Payload::Text(text) => Value::String(text),
            Payload::Empty => Value::Null,
        };
        Ok(serde_json::from_value(value)?)
    }
}

/// Turn a completed response into a payload or a categorized failure.
pub fn decode_response(response: RawResponse) -> Result<Payload> {
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::RequestFailure {
            status: status.as_u16(),
            message: response.text_lossy(),
        });
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(Payload::Empty);
    }

    if response.content_type().contains("application/json") {
        let value = serde_json::from_slice(response.body())?;
        return Ok(Payload::Json(value));
    }

    Ok(Payload::Text(response.text_lossy()))
}
