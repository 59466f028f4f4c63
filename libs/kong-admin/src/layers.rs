use crate::error::KongError;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Request;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer that attaches a fixed set of headers to every request.
///
/// Headers already present on the request are left untouched, so a
/// per-call header always wins over the client-wide default.
#[derive(Clone, Debug, Default)]
pub struct FixedHeadersLayer {
    headers: HeaderMap,
}

impl FixedHeadersLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one header to the set.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] if the name or value is not a valid header.
    pub fn try_with(mut self, name: &str, value: &str) -> Result<Self, KongError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| KongError::invalid_argument(format!("invalid header name '{name}': {e}")))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|e| KongError::invalid_argument(format!("invalid value for header '{name}': {e}")))?;
        if name.as_str() == crate::config::ADMIN_TOKEN_HEADER {
            value.set_sensitive(true);
        }
        self.headers.insert(name, value);
        Ok(self)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl<S> Layer<S> for FixedHeadersLayer {
    type Service = FixedHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FixedHeadersService {
            inner,
            headers: self.headers.clone(),
        }
    }
}

/// Service produced by [`FixedHeadersLayer`].
#[derive(Clone, Debug)]
pub struct FixedHeadersService<S> {
    inner: S,
    headers: HeaderMap,
}

impl<S, ReqBody> Service<Request<ReqBody>> for FixedHeadersService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        for (name, value) in &self.headers {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, Response, StatusCode};
    use http_body_util::Full;
    use tower::ServiceExt;

    /// Echoes the request headers back as the response headers.
    #[derive(Clone)]
    struct EchoHeaders;

    impl Service<Request<Full<Bytes>>> for EchoHeaders {
        type Response = Response<()>;
        type Error = std::convert::Infallible;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let mut resp = Response::builder().status(StatusCode::OK).body(()).unwrap();
            *resp.headers_mut() = req.headers().clone();
            std::future::ready(Ok(resp))
        }
    }

    fn request() -> http::request::Builder {
        Request::builder().method(Method::GET).uri("http://kong:8001/status")
    }

    #[tokio::test]
    async fn test_headers_added() {
        let layer = FixedHeadersLayer::new()
            .try_with("kong-admin-token", "t0ken")
            .unwrap()
            .try_with("x-team", "edge")
            .unwrap();
        let service = layer.layer(EchoHeaders);

        let req = request().body(Full::new(Bytes::new())).unwrap();
        let resp = service.oneshot(req).await.unwrap();

        assert_eq!(resp.headers()["kong-admin-token"], "t0ken");
        assert!(resp.headers()["kong-admin-token"].is_sensitive());
        assert_eq!(resp.headers()["x-team"], "edge");
    }

    #[tokio::test]
    async fn test_request_header_not_overwritten() {
        let layer = FixedHeadersLayer::new().try_with("x-team", "edge").unwrap();
        let service = layer.layer(EchoHeaders);

        let req = request()
            .header("x-team", "core")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = service.oneshot(req).await.unwrap();

        assert_eq!(resp.headers()["x-team"], "core");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let err = FixedHeadersLayer::new()
            .try_with("bad header", "v")
            .unwrap_err();
        assert!(matches!(err, KongError::InvalidArgument(_)));
    }
}
