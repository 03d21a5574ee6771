//! Request builder
//!
//! Turns a route, optional query parameters and per-call options into an
//! absolute URL plus a [`RequestDescriptor`] ready for the transport.

use std::fmt;

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::error::{FetchError, Result};

/// Endpoint identifier: an absolute URL or a path resolved against the origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route(String);

impl Route {
    pub fn new(route: impl Into<String>) -> Self {
        Self(route.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the route carries a scheme (`https://`) or is scheme-relative (`//`)
    pub fn is_absolute(&self) -> bool {
        let route = self.0.as_str();
        if route.starts_with("//") {
            return true;
        }

        let Some((scheme, rest)) = route.split_once(':') else {
            return false;
        };
        let mut chars = scheme.chars();
        let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

        valid_scheme && rest.starts_with("//")
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Route {
    fn from(route: &str) -> Self {
        Self::new(route)
    }
}

impl From<String> for Route {
    fn from(route: String) -> Self {
        Self(route)
    }
}

impl From<&String> for Route {
    fn from(route: &String) -> Self {
        Self(route.clone())
    }
}

impl From<Url> for Route {
    fn from(url: Url) -> Self {
        Self(url.into())
    }
}

// ==================== Query ====================

/// Query parameters merged into the URL
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Pre-built parameter collection, copied entry by entry
    Params(Vec<(String, String)>),
    /// Key/value mapping; null values are skipped, the rest stringified
    Map(Vec<(String, Value)>),
}

impl Query {
    /// Pre-built collection from string pairs
    pub fn params<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Query::Params(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Empty key/value mapping
    pub fn map() -> Self {
        Query::Map(Vec::new())
    }

    /// Append an entry. A `Params` collection stores the stringified value,
    /// and null is skipped there too.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match &mut self {
            Query::Map(entries) => entries.push((key, value)),
            Query::Params(pairs) => {
                if let Some(value) = stringify(&value) {
                    pairs.push((key, value));
                }
            }
        }
        self
    }

    /// Build a mapping from any value that serializes to a JSON object.
    ///
    /// `null` (e.g. `None`) yields an empty mapping.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Null => Ok(Query::map()),
            Value::Object(object) => Ok(Query::Map(object.into_iter().collect())),
            other => Err(FetchError::Configuration(format!(
                "query parameters must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Entries that will reach the URL, in insertion order
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        match self {
            Query::Params(pairs) => pairs.clone(),
            Query::Map(entries) => entries
                .iter()
                .filter_map(|(key, value)| stringify(value).map(|v| (key.clone(), v)))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Query::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
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

// ==================== Body ====================

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Wire-ready bytes, sent untouched
    Bytes(Bytes),
    /// Wire-ready text, sent untouched
    Text(String),
    /// Url-encoded form fields
    Form(Vec<(String, String)>),
    /// Structured value serialized to JSON text
    Json(Value),
}

impl Body {
    /// Serialize any value into a JSON body
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    /// Content type a browser transport would imply for this body
    fn implied_content_type(&self) -> Option<&'static str> {
        match self {
            Body::Bytes(_) => None,
            Body::Text(_) => Some("text/plain;charset=UTF-8"),
            Body::Form(_) => Some("application/x-www-form-urlencoded"),
            Body::Json(_) => Some("application/json"),
        }
    }

    fn into_bytes(self) -> Result<Bytes> {
        Ok(match self {
            Body::Bytes(bytes) => bytes,
            Body::Text(text) => Bytes::from(text),
            Body::Form(fields) => Bytes::from(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields)
                    .finish(),
            ),
            Body::Json(value) => Bytes::from(serde_json::to_vec(&value)?),
        })
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

// ==================== Options ====================

/// Per-call options. Constructed fresh for every call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Method name, any case; `GET` when unset
    pub method: Option<String>,
    /// Headers in write order; later writes to the same name win
    pub headers: Vec<(String, String)>,
    pub query: Option<Query>,
    pub body: Option<Body>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read call with query parameters
    pub fn get(query: Query) -> Self {
        Self::new().method("GET").query(query)
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach a structured JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = Some(Body::json(value)?);
        Ok(self)
    }
}

/// Wire-level request: pure data, safe to inspect or log.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

// ==================== Builders ====================

/// Resolve a route to an absolute URL and merge query parameters into it.
///
/// Relative routes need an origin; without one this is a configuration error.
pub fn build_url(origin: Option<&Url>, route: &Route, query: Option<&Query>) -> Result<Url> {
    let raw = route.as_str();

    let mut url = if route.is_absolute() && !raw.starts_with("//") {
        Url::parse(raw)
            .map_err(|e| FetchError::Configuration(format!("invalid URL '{}': {}", raw, e)))?
    } else {
        let origin = origin.ok_or_else(|| {
            FetchError::Configuration(format!(
                "cannot resolve '{}' without an origin",
                raw
            ))
        })?;
        origin
            .join(raw)
            .map_err(|e| FetchError::Configuration(format!("invalid route '{}': {}", raw, e)))?
    };

    if let Some(query) = query {
        merge_query(&mut url, query.to_pairs());
    }

    Ok(url)
}

/// Merge pairs into the URL with set semantics: the first existing entry for
/// a key takes the new value in place and any later duplicates are dropped.
fn merge_query(url: &mut Url, updates: Vec<(String, String)>) {
    if updates.is_empty() {
        return;
    }

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    for (key, value) in updates {
        match pairs.iter().position(|(k, _)| *k == key) {
            Some(first) => {
                pairs[first].1 = value;
                let mut index = 0;
                pairs.retain(|(k, _)| {
                    let keep = index <= first || *k != key;
                    index += 1;
                    keep
                });
            }
            None => pairs.push((key, value)),
        }
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Normalize options into a descriptor.
///
/// The query part of the options is ignored here; it belongs to [`build_url`].
pub fn prepare_request(options: RequestOptions) -> Result<RequestDescriptor> {
    let RequestOptions {
        method,
        headers: raw_headers,
        body,
        ..
    } = options;

    let method_name = method.as_deref().unwrap_or("GET").to_ascii_uppercase();
    let method = Method::from_bytes(method_name.as_bytes())
        .map_err(|_| FetchError::Configuration(format!("invalid HTTP method '{}'", method_name)))?;

    let mut headers = HeaderMap::new();
    for (name, value) in raw_headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::Configuration(format!("invalid header name '{}': {}", name, e)))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|e| FetchError::Configuration(format!("invalid header value for '{}': {}", name, e)))?;
        headers.insert(header_name, header_value);
    }

    let body = match body {
        None => None,
        Some(_) if method == Method::GET || method == Method::HEAD => {
            trace!(%method, "dropping body on bodiless method");
            None
        }
        Some(body) => {
            if let Some(implied) = body.implied_content_type() {
                if !headers.contains_key(header::CONTENT_TYPE) {
                    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(implied));
                }
            }
            Some(body.into_bytes()?)
        }
    };

    Ok(RequestDescriptor {
        method,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn origin() -> Url {
        Url::parse("https://app.example.com").unwrap()
    }

    #[test]
    fn test_absolute_detection() {
        assert!(Route::from("https://api.test/x").is_absolute());
        assert!(Route::from("HTTP://api.test").is_absolute());
        assert!(Route::from("//cdn.test/a").is_absolute());
        assert!(Route::from("git+ssh://host/repo").is_absolute());
        assert!(!Route::from("/api/items").is_absolute());
        assert!(!Route::from("api/items").is_absolute());
        assert!(!Route::from("mailto:someone@test").is_absolute());
        assert!(!Route::from("1http://x").is_absolute());
    }

    #[test]
    fn test_relative_route_resolves_against_origin() {
        let url = build_url(Some(&origin()), &"/sc3_admin/sellers/list".into(), None).unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/sc3_admin/sellers/list");
    }

    #[test]
    fn test_absolute_route_ignores_origin() {
        let url = build_url(Some(&origin()), &"https://sign.test/a/b.txt".into(), None).unwrap();
        assert_eq!(url.as_str(), "https://sign.test/a/b.txt");
    }

    #[test]
    fn test_scheme_relative_takes_origin_scheme() {
        let url = build_url(Some(&origin()), &"//cdn.test/a".into(), None).unwrap();
        assert_eq!(url.as_str(), "https://cdn.test/a");
    }

    #[test]
    fn test_relative_route_without_origin_is_configuration_error() {
        let err = build_url(None, &"/api/items".into(), None).unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));
    }

    #[test]
    fn test_absolute_route_without_origin_is_fine() {
        let url = build_url(None, &"https://api.test/items".into(), None).unwrap();
        assert_eq!(url.host_str(), Some("api.test"));
    }

    #[test]
    fn test_query_map_skips_null_and_stringifies() {
        let query = Query::map()
            .with("page", 1)
            .with("active", true)
            .with("name", "acme co")
            .with("phone", Value::Null);
        let url = build_url(Some(&origin()), &"/list".into(), Some(&query)).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("page".to_string(), "1".to_string()),
                ("active".to_string(), "true".to_string()),
                ("name".to_string(), "acme co".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_last_write_wins() {
        let query = Query::map().with("page", 1).with("page", 2);
        let url = build_url(Some(&origin()), &"/list?page=0&page=9&x=1".into(), Some(&query)).unwrap();
        assert_eq!(url.query(), Some("page=2&x=1"));
    }

    #[test]
    fn test_prebuilt_params_copied() {
        let query = Query::params([("a", "1"), ("b", "two words")]);
        let url = build_url(Some(&origin()), &"/x".into(), Some(&query)).unwrap();
        assert_eq!(url.query(), Some("a=1&b=two+words"));
    }

    #[test]
    fn test_empty_query_leaves_route_query_alone() {
        let query = Query::map().with("gone", Value::Null);
        let url = build_url(Some(&origin()), &"/x?keep=%20me".into(), Some(&query)).unwrap();
        assert_eq!(url.query(), Some("keep=%20me"));
    }

    #[test]
    fn test_query_from_serializable() {
        #[derive(Serialize)]
        struct Filters {
            warehouse_id: Option<u32>,
            per_page: u32,
        }

        let query = Query::from_serializable(&Filters {
            warehouse_id: None,
            per_page: 20,
        })
        .unwrap();
        assert_eq!(query.to_pairs(), vec![("per_page".to_string(), "20".to_string())]);

        let err = Query::from_serializable(&[1, 2]).unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));
    }

    #[test]
    fn test_method_defaults_to_get_and_is_uppercased() {
        let descriptor = prepare_request(RequestOptions::new()).unwrap();
        assert_eq!(descriptor.method, Method::GET);

        let descriptor = prepare_request(RequestOptions::new().method("patch")).unwrap();
        assert_eq!(descriptor.method, Method::PATCH);
    }

    #[test]
    fn test_json_body_gets_content_type() {
        let payload = json!({"name": "Acme", "tags": [1, 2]});
        let descriptor =
            prepare_request(RequestOptions::new().method("post").body(payload.clone())).unwrap();

        assert_eq!(descriptor.headers[header::CONTENT_TYPE], "application/json");
        let sent: Value = serde_json::from_slice(descriptor.body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, payload);
    }

    #[test]
    fn test_json_body_keeps_caller_content_type() {
        let descriptor = prepare_request(
            RequestOptions::new()
                .method("PUT")
                .header("content-type", "application/vnd.api+json")
                .body(json!([1, 2, 3])),
        )
        .unwrap();

        assert_eq!(descriptor.headers[header::CONTENT_TYPE], "application/vnd.api+json");
        assert_eq!(descriptor.body.as_deref(), Some(&b"[1,2,3]"[..]));
    }

    #[test]
    fn test_headers_case_insensitive_last_write_wins() {
        let descriptor = prepare_request(
            RequestOptions::new()
                .header("X-Trace", "one")
                .header("x-trace", "two"),
        )
        .unwrap();

        assert_eq!(descriptor.headers.get_all("x-trace").iter().count(), 1);
        assert_eq!(descriptor.headers["X-TRACE"], "two");
    }

    #[test]
    fn test_get_and_head_drop_every_body_form() {
        let bodies = [
            Body::Json(json!({"a": 1})),
            Body::Text("text".into()),
            Body::Bytes(Bytes::from_static(b"raw")),
            Body::Form(vec![("a".into(), "1".into())]),
        ];

        for method in ["GET", "head", "get"] {
            for body in bodies.clone() {
                let descriptor =
                    prepare_request(RequestOptions::new().method(method).body(body)).unwrap();
                assert!(descriptor.body.is_none());
                assert!(descriptor.headers.get(header::CONTENT_TYPE).is_none());
            }
        }
    }

    #[test]
    fn test_bytes_pass_through_untouched() {
        let descriptor = prepare_request(
            RequestOptions::new()
                .method("PUT")
                .header("Content-Type", "image/png")
                .body(vec![0u8, 159, 146, 150]),
        )
        .unwrap();

        assert_eq!(descriptor.body.as_deref(), Some(&[0u8, 159, 146, 150][..]));
        assert_eq!(descriptor.headers[header::CONTENT_TYPE], "image/png");
    }

    #[test]
    fn test_form_body_is_urlencoded() {
        let descriptor = prepare_request(
            RequestOptions::new()
                .method("POST")
                .body(Body::Form(vec![("q".into(), "a b".into())])),
        )
        .unwrap();

        assert_eq!(descriptor.body.as_deref(), Some(&b"q=a+b"[..]));
        assert_eq!(
            descriptor.headers[header::CONTENT_TYPE],
            "application/x-www-form-urlencoded"
        );
    }

    #[test]
    fn test_invalid_header_is_configuration_error() {
        let err = prepare_request(RequestOptions::new().header("bad header", "x")).unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));

        let err = prepare_request(RequestOptions::new().header("X-Ok", "line\nbreak")).unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));
    }

    #[test]
    fn test_invalid_method_is_configuration_error() {
        let err = prepare_request(RequestOptions::new().method("NOT A METHOD")).unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));
    }
}
