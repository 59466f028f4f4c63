use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::KongError;

/// Admin API address used when neither the caller nor the environment supplies one.
pub const DEFAULT_ADMIN_URL: &str = "http://localhost:8001";

/// Prefix for environment variables read by [`ClientConfig::from_env`].
pub const ENV_PREFIX: &str = "KONG_ADMIN_";

/// Query parameter identifying the calling cluster.
pub const CLUSTER_ID_PARAM: &str = "cluster.id";

/// Cluster identifier attached to every request unless configured otherwise.
pub const DEFAULT_CLUSTER_ID: &str = "4168295f-015e-4190-837e-0fcc5d72a52f";

/// Header carrying the RBAC token of the calling admin.
pub const ADMIN_TOKEN_HEADER: &str = "kong-admin-token";

/// Default timeout for connecting and for the whole request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default page size used by exhaustive listings.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Client configuration.
///
/// Every field has a default, so a config can be deserialized from a
/// partial source. [`ClientConfig::from_env`] reads `KONG_ADMIN_*`
/// variables (`KONG_ADMIN_URL`, `KONG_ADMIN_TOKEN`, `KONG_ADMIN_WORKSPACE`,
/// `KONG_ADMIN_TIMEOUT`, `KONG_ADMIN_DEBUG`, `KONG_ADMIN_CLUSTER_ID`).
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root URL of the Admin API.
    #[serde(deserialize_with = "text::string")]
    pub url: String,

    /// Workspace selected at construction time. Empty means the default workspace.
    #[serde(deserialize_with = "text::opt_string")]
    pub workspace: Option<String>,

    /// RBAC token sent as `kong-admin-token` on every request.
    #[serde(deserialize_with = "text::opt_secret")]
    pub token: Option<SecretString>,

    /// Connect and request timeout of the default transport.
    #[serde(deserialize_with = "duration::deserialize")]
    pub timeout: Duration,

    /// Emit wire-level dumps of every request and response.
    pub debug: bool,

    /// Value of the `cluster.id` query parameter; `None` disables it.
    #[serde(deserialize_with = "text::opt_string")]
    pub cluster_id: Option<String>,

    /// Extra headers attached to every request by the default transport.
    pub headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ADMIN_URL.to_owned(),
            workspace: None,
            token: None,
            timeout: DEFAULT_TIMEOUT,
            debug: false,
            cluster_id: Some(DEFAULT_CLUSTER_ID.to_owned()),
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from `KONG_ADMIN_*` environment variables on top of the defaults.
    ///
    /// An empty `KONG_ADMIN_CLUSTER_ID` disables the cluster parameter.
    ///
    /// # Errors
    /// Returns [`KongError::Config`] when a variable holds a value of the wrong shape.
    pub fn from_env() -> Result<Self, KongError> {
        Self::from_figment(&Figment::from(Env::prefixed(ENV_PREFIX)))
    }

    /// Load a YAML file, then let `KONG_ADMIN_*` variables override it.
    ///
    /// A missing file is treated as empty.
    ///
    /// # Errors
    /// Returns [`KongError::Config`] for malformed YAML or mistyped values.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, KongError> {
        let figment = Figment::from(Yaml::file(path.as_ref())).merge(Env::prefixed(ENV_PREFIX));
        Self::from_figment(&figment)
    }

    /// Extract configuration from an arbitrary figment.
    ///
    /// # Errors
    /// Returns [`KongError::Config`] when extraction fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, KongError> {
        let config: Self = figment.extract()?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        if self.url.trim().is_empty() {
            DEFAULT_ADMIN_URL.clone_into(&mut self.url);
        }
        if self
            .workspace
            .as_deref()
            .is_some_and(|ws| ws.trim().is_empty())
        {
            self.workspace = None;
        }
        if self
            .cluster_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            self.cluster_id = None;
        }
        self
    }
}

/// Accepts either whole seconds or a humantime string such as `"1m 30s"`.
mod duration {
    use serde::{Deserialize, Deserializer, de};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub(super) fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(d)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(text.trim()).map_err(de::Error::custom),
        }
    }
}

/// String fields that environment providers may have parsed as scalars.
///
/// `KONG_ADMIN_TOKEN=123456` arrives as an integer; it is turned back into text.
mod text {
    use secrecy::SecretString;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    impl Raw {
        fn into_string(self) -> String {
            match self {
                Self::Text(text) => text,
                Self::Unsigned(n) => n.to_string(),
                Self::Signed(n) => n.to_string(),
                Self::Float(n) => n.to_string(),
                Self::Bool(b) => b.to_string(),
            }
        }
    }

    pub(super) fn string<'de, D>(d: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Raw::deserialize(d).map(Raw::into_string)
    }

    pub(super) fn opt_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Raw>::deserialize(d)?.map(Raw::into_string))
    }

    pub(super) fn opt_secret<'de, D>(d: D) -> Result<Option<SecretString>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_string(d)?.map(SecretString::from))
    }
}
