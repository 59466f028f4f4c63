use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, KongError};
use crate::transport::ResponseBody;

/// `true` for statuses the Admin API uses to signal success (200 to 399).
#[must_use]
pub fn is_success(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// Turn a status and the fully read body into success or an [`ApiError`].
///
/// # Errors
/// Returns the API error for any status outside 200 to 399.
pub fn classify(status: StatusCode, headers: &HeaderMap, body: &Bytes) -> Result<(), ApiError> {
    if is_success(status) {
        Ok(())
    } else {
        Err(ApiError::from_body(status, headers.clone(), body.clone()))
    }
}

/// Status and headers of a completed exchange whose body the client consumed.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
}

impl Response {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Response whose body has not been read; the caller owns it.
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl RawResponse {
    pub(crate) fn from_http(response: http::Response<ResponseBody>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Drop the body without reading it.
    pub fn into_response(self) -> Response {
        Response::new(self.status, self.headers)
    }

    /// Hand over the streaming body.
    #[must_use]
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Read the whole body.
    ///
    /// # Errors
    /// Returns [`KongError::Transport`] if the body stream fails.
    pub async fn bytes(self) -> Result<Bytes, KongError> {
        read_body(self.body).await
    }

    /// Read and decode the body as JSON without looking at the status.
    ///
    /// # Errors
    /// Returns a transport or serialization error.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, KongError> {
        let body = self.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Keep the response if its status is a success; otherwise read the body
    /// and return the matching [`ApiError`].
    ///
    /// # Errors
    /// Returns [`KongError::Api`] for error statuses.
    pub async fn error_for_status(self) -> Result<Self, KongError> {
        if is_success(self.status) {
            return Ok(self);
        }
        let status = self.status;
        let headers = self.headers;
        let body = read_body(self.body).await?;
        Err(ApiError::from_body(status, headers, body).into())
    }
}

pub(crate) async fn read_body(body: ResponseBody) -> Result<Bytes, KongError> {
    Ok(body.collect().await.map_err(KongError::Transport)?.to_bytes())
}

/// Decode a JSON body, treating an empty body as JSON `null`.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, KongError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn raw(status: u16, body: &'static str) -> RawResponse {
        let body: ResponseBody = Full::new(Bytes::from_static(body.as_bytes()))
            .map_err(|never| match never {})
            .boxed();
        RawResponse::from_http(
            http::Response::builder()
                .status(status)
                .body(body)
                .unwrap(),
        )
    }

    #[test]
    fn test_success_range() {
        assert!(is_success(StatusCode::OK));
        assert!(is_success(StatusCode::NO_CONTENT));
        assert!(is_success(StatusCode::NOT_MODIFIED));
        assert!(!is_success(StatusCode::CONTINUE));
        assert!(!is_success(StatusCode::BAD_REQUEST));
        assert!(!is_success(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_classify_extracts_message() {
        let err = classify(
            StatusCode::INTERNAL_SERVER_ERROR,
            &HeaderMap::new(),
            &Bytes::from_static(br#"{"message":"An unexpected error occurred"}"#),
        )
        .unwrap_err();
        assert_eq!(err.code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "An unexpected error occurred");
    }

    #[tokio::test]
    async fn test_error_for_status_reads_body() {
        let err = raw(404, r#"{"message":"Not found"}"#)
            .error_for_status()
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.api_error().unwrap().message(), "Not found");
    }

    #[tokio::test]
    async fn test_raw_body_is_left_to_caller() {
        let resp = raw(200, r#"{"ok":true}"#);
        assert_eq!(resp.status(), StatusCode::OK);
        let value: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_decode_empty_body_as_null() {
        let value: Option<serde_json::Value> = decode(b"").unwrap();
        assert!(value.is_none());
        decode::<()>(b"  \n").unwrap();
    }
}
