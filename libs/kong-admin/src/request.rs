use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use http_body_util::Full;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::client::Client;
use crate::endpoint;
use crate::error::KongError;
use crate::response::{RawResponse, Response};

/// Content type attached to every request that carries a body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Request payload in one of the shapes the Admin API accepts.
///
/// Every shape goes through [`RequestBody::into_bytes`]: pre-serialized
/// bytes and text are sent verbatim, values are serialized to JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Pre-serialized bytes, sent verbatim.
    Bytes(Bytes),
    /// Text, sent as its UTF-8 bytes.
    Text(String),
    /// Structured value, serialized to JSON.
    Json(serde_json::Value),
}

impl RequestBody {
    /// Serialize any value into a JSON body.
    ///
    /// # Errors
    /// Returns [`KongError::Serialization`] if `value` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, KongError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Drain an async reader into a byte body.
    ///
    /// # Errors
    /// Returns [`KongError::Io`] if reading fails.
    pub async fn read_from<R>(mut reader: R) -> Result<Self, KongError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(Self::Bytes(Bytes::from(buf)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Encoded bytes, or `None` when no body should be sent.
    ///
    /// # Errors
    /// Returns [`KongError::Serialization`] if a JSON value fails to encode.
    pub fn into_bytes(self) -> Result<Option<Bytes>, KongError> {
        match self {
            Self::Empty => Ok(None),
            Self::Bytes(bytes) => Ok(Some(bytes)),
            Self::Text(text) => Ok(Some(Bytes::from(text))),
            Self::Json(value) => Ok(Some(Bytes::from(serde_json::to_vec(&value)?))),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&[u8]> for RequestBody {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl<T: Into<RequestBody>> From<Option<T>> for RequestBody {
    fn from(body: Option<T>) -> Self {
        body.map_or(Self::Empty, Into::into)
    }
}

/// A fully composed request, ready to hand to a transport.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    /// Assemble a request from parts. A body gets `Content-Type: application/json`
    /// unless `headers` already sets a content type.
    #[must_use]
    pub fn new(method: Method, url: String, mut headers: HeaderMap, body: Option<Bytes>) -> Self {
        if body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub(crate) fn to_http(&self) -> Result<http::Request<Full<Bytes>>, KongError> {
        let mut builder = http::Request::builder()
            .method(self.method.clone())
            .uri(self.url.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
        }
        builder
            .body(Full::new(self.body.clone().unwrap_or_default()))
            .map_err(|e| KongError::InvalidUrl {
                url: self.url.clone(),
                reason: e.to_string(),
            })
    }
}

/// Fluent builder for one Admin API call.
///
/// Created by [`Client::request`]. The workspace is captured when the
/// builder is created. Errors raised while adding parts are deferred and
/// reported by [`build`](Self::build) or any `send*` method.
#[must_use = "RequestBuilder does nothing until it is built or sent"]
pub struct RequestBuilder {
    client: Client,
    method: Method,
    base: String,
    endpoint: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: RequestBody,
    error: Option<KongError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, method: Method, base: String, endpoint: &str) -> Self {
        Self {
            client,
            method,
            base,
            endpoint: endpoint.to_owned(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            error: None,
        }
    }

    /// Append query parameters from any value `serde_urlencoded` accepts:
    /// a struct, a map, or a sequence of pairs. `None` fields are skipped.
    pub fn query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Self {
        if self.error.is_some() {
            return self;
        }
        match serde_urlencoded::to_string(query) {
            Ok(qs) => self.query.extend(endpoint::parse_query(&qs)),
            Err(e) => self.error = Some(e.into()),
        }
        self
    }

    /// Append one query parameter.
    pub fn query_pair(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body serialized from `value`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        if self.error.is_some() {
            return self;
        }
        match RequestBody::json(value) {
            Ok(body) => self.body = body,
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Set the body in any supported shape.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header for this request only.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => {
                self.error = Some(KongError::invalid_argument(format!("invalid header name '{name}': {e}")));
            }
            (_, Err(e)) => {
                self.error = Some(KongError::invalid_argument(format!("invalid value for header '{name}': {e}")));
            }
        }
        self
    }

    /// Compose the URL and encode the body.
    ///
    /// # Errors
    /// Returns the first deferred error, or a URL or serialization error.
    pub fn build(self) -> Result<Request, KongError> {
        self.into_parts().map(|(_, request)| request)
    }

    fn into_parts(self) -> Result<(Client, Request), KongError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let url = endpoint::compose(&self.base, &self.endpoint, &self.query, self.client.cluster_id())?;
        let body = self.body.into_bytes()?;
        Ok((self.client, Request::new(self.method, url, self.headers, body)))
    }

    /// Send and decode the JSON response body.
    ///
    /// # Errors
    /// Returns [`KongError::Api`] for error statuses, or any build, transport
    /// or decoding error.
    pub async fn send<T: DeserializeOwned>(self) -> Result<T, KongError> {
        let (client, request) = self.into_parts()?;
        client.execute(&request).await.map(|(_, value)| value)
    }

    /// Send, discard the body and return the response handle.
    ///
    /// # Errors
    /// Same as [`send`](Self::send), minus decoding.
    pub async fn send_discard(self) -> Result<Response, KongError> {
        let (client, request) = self.into_parts()?;
        client.execute_discard(&request).await
    }

    /// Send without classifying the status; the caller owns the body.
    ///
    /// # Errors
    /// Returns build or transport errors only.
    pub async fn send_raw(self) -> Result<RawResponse, KongError> {
        let (client, request) = self.into_parts()?;
        client.execute_raw(&request).await
    }
}
