use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::HeaderMap;
use http::Method;
use http_body_util::BodyExt;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use crate::config::{ADMIN_TOKEN_HEADER, ClientConfig, DEFAULT_CLUSTER_ID, DEFAULT_TIMEOUT};
use crate::debug::{self, DebugSink, TracingSink};
use crate::endpoint::{self, RootUrl};
use crate::error::{ApiError, KongError};
use crate::registry::{EntityDescriptor, Registry};
use crate::request::{Request, RequestBody, RequestBuilder};
use crate::response::{self, RawResponse, Response};
use crate::transport::{HttpTransport, ResponseBody, Transport};
use crate::workspace::WorkspaceState;

/// Admin API client.
///
/// `Client` is cheap to clone; clones share the transport, the registry and
/// the workspace selection. Every request recomposes its URL from the root
/// and the workspace current at that moment.
///
/// ```ignore
/// use kong_admin::{Client, Service};
///
/// let client = Client::new(Some("http://localhost:8001"))?;
/// let svc = client
///     .services()
///     .create(&Service { name: Some("s1".into()), host: Some("example.com".into()), ..Default::default() })
///     .await?;
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    root: RootUrl,
    workspace: WorkspaceState,
    transport: Arc<dyn Transport>,
    debug: Option<Arc<dyn DebugSink>>,
    cluster_id: Option<String>,
    registry: Registry,
    timeout: Duration,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("root", &self.inner.root)
            .field("workspace", &self.inner.workspace.get())
            .field("debug", &self.inner.debug.is_some())
            .field("cluster_id", &self.inner.cluster_id)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client for `url`, falling back to `KONG_ADMIN_URL` and then
    /// to `http://localhost:8001`. Other `KONG_ADMIN_*` settings apply too.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidUrl`] if the resolved URL is not absolute,
    /// or a configuration error if the environment is malformed.
    pub fn new(url: Option<&str>) -> Result<Self, KongError> {
        let mut builder = ClientBuilder::from_env()?;
        if let Some(url) = url {
            builder = builder.base_url(url);
        }
        builder.build()
    }

    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Root URL, without workspace.
    #[must_use]
    pub fn root_url(&self) -> &str {
        self.inner.root.as_str()
    }

    /// Base URL for the currently selected workspace.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.inner.workspace.with(|ws| self.inner.root.with_workspace(ws))
    }

    /// Base URL and workspace-empty flag, read under one lock acquisition.
    pub(crate) fn base_url_scoped(&self) -> (String, bool) {
        self.inner
            .workspace
            .with(|ws| (self.inner.root.with_workspace(ws), ws.is_empty()))
    }

    /// Currently selected workspace; empty for the default one.
    #[must_use]
    pub fn workspace(&self) -> String {
        self.inner.workspace.get()
    }

    /// Select the workspace for every subsequent request. The empty string
    /// returns to the default workspace. Requests already built keep their URL.
    pub fn set_workspace(&self, workspace: &str) {
        self.inner.workspace.set(workspace);
    }

    /// Value injected as the `cluster.id` query parameter, if any.
    #[must_use]
    pub fn cluster_id(&self) -> Option<&str> {
        self.inner.cluster_id.as_deref()
    }

    /// Custom entity registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Start a request against `endpoint` in the current workspace.
    pub fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, self.base_url(), endpoint)
    }

    /// Start a request against `endpoint` under an explicit base URL.
    pub fn request_with_base(&self, base: &str, method: Method, endpoint: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, base.trim_end_matches('/').to_owned(), endpoint)
    }

    /// Build a request in one call.
    ///
    /// # Errors
    /// Returns a URL, header or serialization error.
    pub fn build_request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: impl Into<RequestBody>,
    ) -> Result<Request, KongError> {
        self.build_request_with_base(&self.base_url(), method, endpoint, query, body)
    }

    /// Like [`build_request`](Self::build_request) with an explicit base URL.
    ///
    /// # Errors
    /// Returns a URL, header or serialization error.
    pub fn build_request_with_base(
        &self,
        base: &str,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: impl Into<RequestBody>,
    ) -> Result<Request, KongError> {
        query
            .iter()
            .fold(self.request_with_base(base, method, endpoint), |b, (k, v)| {
                b.query_pair(*k, *v)
            })
            .body(body)
            .build()
    }

    /// Send `request` and decode the JSON body into `T`.
    ///
    /// The body is always drained. On a status outside 200 to 399 the result
    /// is [`KongError::Api`], which carries the status, headers and raw body.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn execute<T: DeserializeOwned>(&self, request: &Request) -> Result<(Response, T), KongError> {
        let (response, body) = self.execute_bytes(request).await?;
        let value = response::decode(&body)?;
        Ok((response, value))
    }

    /// Send `request` and discard the body.
    ///
    /// # Errors
    /// Returns transport or API errors.
    pub async fn execute_discard(&self, request: &Request) -> Result<Response, KongError> {
        self.execute_bytes(request).await.map(|(response, _)| response)
    }

    /// Send `request` and return the classified response with its body bytes.
    ///
    /// # Errors
    /// Returns transport or API errors.
    pub async fn execute_bytes(&self, request: &Request) -> Result<(Response, Bytes), KongError> {
        let deadline = self.deadline();
        let raw = self.send(request, deadline).await?;
        let status = raw.status();
        let headers = raw.headers().clone();
        let body = self.before(deadline, raw.bytes()).await??;
        self.dump_response(status, &headers, Some(&body));

        response::classify(status, &headers, &body)?;
        Ok((Response::new(status, headers), body))
    }

    /// Send `request` and stream a successful body into `sink`.
    ///
    /// An error body is not written; it is returned inside [`KongError::Api`].
    ///
    /// # Errors
    /// Returns transport, API or I/O errors.
    pub async fn execute_into<W>(&self, request: &Request, sink: &mut W) -> Result<Response, KongError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let deadline = self.deadline();
        let raw = self.send(request, deadline).await?;
        let status = raw.status();
        let headers = raw.headers().clone();

        if !response::is_success(status) {
            let body = self.before(deadline, raw.bytes()).await??;
            self.dump_response(status, &headers, Some(&body));
            return Err(ApiError::from_body(status, headers, body).into());
        }

        self.dump_response(status, &headers, None);
        let mut body: ResponseBody = raw.into_body();
        while let Some(frame) = self.before(deadline, body.frame()).await? {
            let frame = frame.map_err(KongError::Transport)?;
            if let Ok(data) = frame.into_data() {
                sink.write_all(&data).await?;
            }
        }
        sink.flush().await?;
        Ok(Response::new(status, headers))
    }

    /// Send `request` without classifying the status. The caller owns the body.
    ///
    /// The timeout covers the response head only.
    ///
    /// # Errors
    /// Returns transport errors only.
    pub async fn execute_raw(&self, request: &Request) -> Result<RawResponse, KongError> {
        let raw = self.send(request, self.deadline()).await?;
        self.dump_response(raw.status(), raw.headers(), None);
        Ok(raw)
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.inner.timeout
    }

    /// Await `fut`, failing with [`KongError::Timeout`] once `deadline` passes.
    async fn before<F: Future>(&self, deadline: Instant, fut: F) -> Result<F::Output, KongError> {
        tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| KongError::Timeout(self.inner.timeout))
    }

    async fn send(&self, request: &Request, deadline: Instant) -> Result<RawResponse, KongError> {
        if let Some(sink) = &self.inner.debug {
            sink.record(&debug::render_request(request));
        }
        tracing::debug!(method = %request.method(), url = %request.url(), "sending admin API request");

        let response = self
            .before(deadline, self.inner.transport.send(request.to_http()?))
            .await??;

        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            status = response.status().as_u16(),
            "admin API response received"
        );
        Ok(RawResponse::from_http(response))
    }

    fn dump_response(&self, status: http::StatusCode, headers: &HeaderMap, body: Option<&[u8]>) {
        if let Some(sink) = &self.inner.debug {
            sink.record(&debug::render_response(status, headers, body));
        }
    }

    /// `GET endpoint` decoded as `T`.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, KongError> {
        self.request(Method::GET, endpoint).send().await
    }
}

/// Builder for [`Client`].
#[must_use]
pub struct ClientBuilder {
    url: Option<String>,
    workspace: Option<String>,
    token: Option<SecretString>,
    timeout: Duration,
    headers: BTreeMap<String, String>,
    transport: Option<Arc<dyn Transport>>,
    debug: bool,
    debug_sink: Option<Arc<dyn DebugSink>>,
    cluster_id: Option<String>,
    descriptors: Vec<EntityDescriptor>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            url: None,
            workspace: None,
            token: None,
            timeout: DEFAULT_TIMEOUT,
            headers: BTreeMap::new(),
            transport: None,
            debug: false,
            debug_sink: None,
            cluster_id: Some(DEFAULT_CLUSTER_ID.to_owned()),
            descriptors: Vec::new(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            url: Some(config.url),
            workspace: config.workspace,
            token: config.token,
            timeout: config.timeout,
            headers: config.headers,
            debug: config.debug,
            cluster_id: config.cluster_id,
            ..Self::default()
        }
    }

    /// Start from `KONG_ADMIN_*` environment variables.
    ///
    /// # Errors
    /// Returns [`KongError::Config`] if a variable is malformed.
    pub fn from_env() -> Result<Self, KongError> {
        Ok(Self::from_config(ClientConfig::from_env()?))
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// RBAC token sent as `kong-admin-token` by the default transport.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Header sent on every request by the default transport.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Use a caller-supplied transport instead of the default one.
    ///
    /// Token and extra headers then become the transport's concern; the
    /// client timeout still bounds every call.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Dump every request and response through `tracing`.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Dump every request and response to `sink`. Implies `debug(true)`.
    pub fn debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug = true;
        self.debug_sink = Some(sink);
        self
    }

    /// Value of the `cluster.id` query parameter; `None` stops sending it.
    pub fn cluster_id(mut self, cluster_id: Option<&str>) -> Self {
        self.cluster_id = cluster_id.map(str::to_owned);
        self
    }

    /// Register a custom entity type at construction.
    pub fn register(mut self, descriptor: EntityDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Validate the configuration and build the client.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidUrl`] for a bad root URL, a registry error
    /// for an invalid descriptor, or a transport error if the default
    /// transport cannot be created.
    pub fn build(self) -> Result<Client, KongError> {
        let root = RootUrl::parse(self.url.as_deref().unwrap_or(crate::config::DEFAULT_ADMIN_URL))?;
        if root.as_str().starts_with("http://") && self.token.is_some() {
            tracing::warn!(root = %root, "admin token will be sent over plain HTTP");
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => {
                if self.token.is_some() || !self.headers.is_empty() {
                    tracing::warn!("token and extra headers are ignored with a custom transport");
                }
                transport
            }
            None => {
                let mut builder = HttpTransport::builder()
                    .timeout(self.timeout)
                    .connect_timeout(self.timeout);
                for (name, value) in &self.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                if let Some(token) = &self.token {
                    builder = builder.header(ADMIN_TOKEN_HEADER, token.expose_secret());
                }
                Arc::new(builder.build()?)
            }
        };

        let debug: Option<Arc<dyn DebugSink>> = match (self.debug, self.debug_sink) {
            (_, Some(sink)) => Some(sink),
            (true, None) => Some(Arc::new(TracingSink)),
            (false, None) => None,
        };

        let registry = Registry::with_builtin();
        for descriptor in self.descriptors {
            registry.register(descriptor)?;
        }

        let cluster_id = self.cluster_id.filter(|id| !id.trim().is_empty());

        tracing::debug!(root = %root, workspace = ?self.workspace, "admin API client created");

        Ok(Client {
            inner: Arc::new(ClientInner {
                root,
                workspace: WorkspaceState::new(self.workspace.as_deref()),
                transport,
                debug,
                cluster_id,
                registry,
                timeout: self.timeout,
            }),
        })
    }
}

/// Join an endpoint prefix and an identifier, escaping the identifier.
pub(crate) fn join_id(prefix: &str, id: &str) -> String {
    format!("{prefix}/{}", endpoint::segment(id))
}
