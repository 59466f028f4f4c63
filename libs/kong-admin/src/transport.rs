//! Pluggable HTTP transport.
//!
//! The client never talks to the network directly; it hands a fully built
//! `http::Request` to a [`Transport`] and gets a streaming response back.
//! [`HttpTransport`] is the production implementation: a small tower stack
//! over the hyper-util pooled client with rustls for `https://` roots.
//!
//! ```text
//! Timeout -> FixedHeaders -> hyper_util::client::legacy::Client
//! ```
//!
//! Any status code is returned as `Ok`; classification happens in the client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceBuilder, ServiceExt};

use crate::config::DEFAULT_TIMEOUT;
use crate::error::KongError;
use crate::layers::FixedHeadersLayer;

/// Streaming response body handed back by a [`Transport`].
pub type ResponseBody = http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Outgoing request type accepted by a [`Transport`].
pub type TransportRequest = Request<Full<Bytes>>;

/// Sends one HTTP request and returns the response head with a streaming body.
///
/// Implementations must be safe to share between concurrent calls. Dropping
/// the returned future abandons the request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the exchange.
    ///
    /// # Errors
    /// Returns [`KongError::Transport`] or [`KongError::Timeout`] when no
    /// response could be obtained. HTTP error statuses are not errors here.
    async fn send(&self, request: TransportRequest) -> Result<Response<ResponseBody>, KongError>;
}

type BoxedService = BoxCloneSyncService<TransportRequest, Response<ResponseBody>, KongError>;

/// Default transport backed by hyper.
#[derive(Clone)]
pub struct HttpTransport {
    service: BoxedService,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Transport with default settings (60 second timeouts, no extra headers).
    ///
    /// # Errors
    /// Returns [`KongError::Transport`] if the TLS connector cannot be initialised.
    pub fn new() -> Result<Self, KongError> {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Wrap an arbitrary tower service, e.g. one with extra middleware.
    pub fn from_service<S>(service: S) -> Self
    where
        S: Service<TransportRequest, Response = Response<ResponseBody>, Error = KongError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        Self {
            service: BoxCloneSyncService::new(service),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<Response<ResponseBody>, KongError> {
        self.service.clone().oneshot(request).await
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    pool_idle_timeout: Option<Duration>,
    headers: Vec<(String, String)>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_TIMEOUT,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            headers: Vec::new(),
        }
    }
}

impl HttpTransportBuilder {
    /// Timeout for the whole exchange, up to the response head.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout for establishing the TCP connection.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// How long idle pooled connections are kept. `None` keeps them forever.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Header sent on every request unless the request sets it itself.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for malformed headers and
    /// [`KongError::Transport`] if the TLS connector cannot be initialised.
    pub fn build(self) -> Result<HttpTransport, KongError> {
        let timeout = self.timeout;

        let headers = self
            .headers
            .iter()
            .try_fold(FixedHeadersLayer::new(), |layer, (name, value)| {
                layer.try_with(name, value)
            })?;

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(self.connect_timeout));

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| KongError::Transport(Box::new(e)))?
            .https_or_http()
            .enable_all_versions()
            .wrap_connector(http);

        let mut client_builder = Client::builder(TokioExecutor::new());
        client_builder.pool_timer(TokioTimer::new());
        if let Some(idle) = self.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle);
        }
        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(headers)
            .service(hyper_client)
            .map_response(box_response)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

        Ok(HttpTransport::from_service(service))
    }
}

/// Respect a globally installed rustls provider, else use aws-lc-rs without installing it.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn box_response<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, body.map_err(Into::into).boxed())
}

fn map_tower_error(err: tower::BoxError, timeout: Duration) -> KongError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return KongError::Timeout(timeout);
    }
    match err.downcast::<KongError>() {
        Ok(kong) => *kong,
        Err(other) => KongError::Transport(other),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn get(url: &str) -> TransportRequest {
        Request::builder()
            .method(http::Method::GET)
            .uri(url)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_transport_error() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/services/missing");
            then.status(404).body(r#"{"message":"Not found"}"#);
        });

        let transport = HttpTransport::new().unwrap();
        let resp = transport
            .send(get(&server.url("/services/missing")))
            .await
            .unwrap();

        assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"message":"Not found"}"#);
        mock.assert();
    }

    #[tokio::test]
    async fn test_fixed_headers_are_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/status")
                .header("kong-admin-token", "t0ken");
            then.status(200).body("{}");
        });

        let transport = HttpTransport::builder()
            .header("kong-admin-token", "t0ken")
            .build()
            .unwrap();
        let resp = transport.send(get(&server.url("/status"))).await.unwrap();

        assert_eq!(resp.status(), http::StatusCode::OK);
        mock.assert();
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_secs(2));
        });

        let transport = HttpTransport::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let err = transport.send(get(&server.url("/slow"))).await.unwrap_err();

        assert!(matches!(err, KongError::Timeout(d) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) is almost never bound locally.
        let transport = HttpTransport::builder()
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let err = transport
            .send(get("http://127.0.0.1:9/status"))
            .await
            .unwrap_err();

        assert!(matches!(err, KongError::Transport(_)), "got {err:?}");
    }
}
