//! Node-level endpoints: status, root document, declarative config,
//! schemas, listeners, tags and the existence probe.

use bytes::Bytes;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncRead;

use crate::client::{Client, join_id};
use crate::entities::Plugin;
use crate::entity::{decode_items, require_id};
use crate::error::KongError;
use crate::pagination::{ListOpt, seq_or_empty_object};
use crate::request::{RequestBody, RequestBuilder};

/// Snapshot returned by `GET /status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub database: DatabaseStatus,
    #[serde(default)]
    pub server: ServerCounters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStatus {
    #[serde(default)]
    pub reachable: bool,
}

/// Connection counters of the node's HTTP server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCounters {
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub connections_active: u64,
    #[serde(default)]
    pub connections_accepted: u64,
    #[serde(default)]
    pub connections_handled: u64,
    #[serde(default)]
    pub connections_reading: u64,
    #[serde(default)]
    pub connections_writing: u64,
    #[serde(default)]
    pub connections_waiting: u64,
}

/// Typed view of the root document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default)]
    pub configuration: Map<String, Value>,
    #[serde(default)]
    pub plugins: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProxyListener {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub http2: bool,
    #[serde(default)]
    pub proxy_protocol: bool,
    #[serde(default)]
    pub deferred: bool,
    #[serde(default)]
    pub reuseport: bool,
    #[serde(default)]
    pub listener: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct StreamListener {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub proxy_protocol: bool,
    #[serde(default)]
    pub reuseport: bool,
    #[serde(default)]
    pub listener: String,
}

/// Listeners declared in the node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listeners {
    #[serde(default, deserialize_with = "seq_or_empty_object")]
    pub proxy_listeners: Vec<ProxyListener>,
    #[serde(default, deserialize_with = "seq_or_empty_object")]
    pub stream_listeners: Vec<StreamListener>,
}

/// One tagged entity as listed by `/tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub tag: String,
}

/// Result of a schema validation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    /// The server rejected the payload with 400; `message` is its explanation.
    Invalid { message: String },
}

impl ValidationOutcome {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Empty for [`ValidationOutcome::Valid`].
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Valid => "",
            Self::Invalid { message } => message,
        }
    }
}

impl Client {
    /// Probe `endpoint`: `true` on success, `false` on 404.
    ///
    /// # Errors
    /// Any error other than 404 is returned unchanged.
    pub async fn exists(&self, endpoint: &str) -> Result<bool, KongError> {
        match self.request(Method::GET, endpoint).send_discard().await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// `GET /status`.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn status(&self) -> Result<Status, KongError> {
        self.get_json("/status").await
    }

    /// `GET` of the root document: `/kong` under a workspace, `/` otherwise.
    fn root_request(&self) -> RequestBuilder {
        let (base, default_workspace) = self.base_url_scoped();
        let path = if default_workspace { "/" } else { "/kong" };
        self.request_with_base(&base, Method::GET, path)
    }

    /// Root document as a free-form map.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn root(&self) -> Result<Map<String, Value>, KongError> {
        self.root_request().send().await
    }

    /// Root document as received.
    ///
    /// # Errors
    /// Returns transport or API errors.
    pub async fn root_bytes(&self) -> Result<Bytes, KongError> {
        let request = self.root_request().build()?;
        let (_, body) = self.execute_bytes(&request).await?;
        Ok(body)
    }

    /// Root document decoded into [`Info`].
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn info(&self) -> Result<Info, KongError> {
        self.root_request().send().await
    }

    /// Proxy and stream listeners from the root document's configuration.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn listeners(&self) -> Result<Listeners, KongError> {
        let info = self.info().await?;
        Ok(serde_json::from_value(Value::Object(info.configuration))?)
    }

    /// Replace the node configuration with the declarative document read from `config`.
    ///
    /// Returns empty bytes on success. When the server rejects the document,
    /// the error is [`KongError::Api`] and its raw body holds the server's
    /// explanation.
    ///
    /// # Errors
    /// Returns I/O errors from `config`, transport or API errors.
    pub async fn reload_declarative_config<R>(&self, config: R, check_hash: bool) -> Result<Bytes, KongError>
    where
        R: AsyncRead + Unpin,
    {
        let body = RequestBody::read_from(config).await?;
        let request = self
            .request(Method::POST, "/config")
            .query_pair("check_hash", if check_hash { "1" } else { "0" })
            .body(body)
            .build()?;
        self.execute_bytes(&request).await?;
        Ok(Bytes::new())
    }

    /// Schema of `entity`, e.g. `"services"`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank entity name.
    pub async fn get_schema(&self, entity: &str) -> Result<Map<String, Value>, KongError> {
        let entity = require_id("schema", "entity name", Some(entity))?;
        self.get_json(&join_id("/schemas", entity)).await
    }

    /// Schema of the plugin `name`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank plugin name.
    pub async fn plugin_schema(&self, name: &str) -> Result<Map<String, Value>, KongError> {
        let name = require_id("plugin schema", "name", Some(name))?;
        self.get_json(&join_id("/schemas/plugins", name)).await
    }

    /// Validate `payload` against the schema of `entity`.
    ///
    /// # Errors
    /// A 400 is [`ValidationOutcome::Invalid`]; every other failure is returned as is.
    pub async fn validate_schema<T>(&self, entity: &str, payload: &T) -> Result<ValidationOutcome, KongError>
    where
        T: Serialize + ?Sized,
    {
        let entity = require_id("schema", "entity name", Some(entity))?;
        let path = format!("{}/validate", join_id("/schemas", entity));
        self.validate(&path, payload).await
    }

    /// Validate a plugin configuration without creating it.
    ///
    /// # Errors
    /// A 400 is [`ValidationOutcome::Invalid`]; every other failure is returned as is.
    pub async fn validate_plugin(&self, plugin: &Plugin) -> Result<ValidationOutcome, KongError> {
        self.validate("/schemas/plugins/validate", plugin).await
    }

    async fn validate<T>(&self, path: &str, payload: &T) -> Result<ValidationOutcome, KongError>
    where
        T: Serialize + ?Sized,
    {
        let sent = self.request(Method::POST, path).json(payload).send_discard().await;
        match sent {
            Ok(_) => Ok(ValidationOutcome::Valid),
            Err(KongError::Api(err)) if err.code() == StatusCode::BAD_REQUEST => Ok(ValidationOutcome::Invalid {
                message: err.message().to_owned(),
            }),
            Err(err) => Err(err),
        }
    }

    /// One page of every tagged entity.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn list_tags(&self, opt: Option<&ListOpt>) -> Result<(Vec<TagEntry>, Option<ListOpt>), KongError> {
        let (items, next) = self.list("/tags", opt).await?;
        Ok((decode_items(items)?, next))
    }

    /// One page of the entities carrying `tag`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank tag.
    pub async fn list_tag(&self, tag: &str, opt: Option<&ListOpt>) -> Result<(Vec<TagEntry>, Option<ListOpt>), KongError> {
        let tag = require_id("tag", "name", Some(tag))?;
        let (items, next) = self.list(&join_id("/tags", tag), opt).await?;
        Ok((decode_items(items)?, next))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_decodes() {
        let status: Status = serde_json::from_value(json!({
            "database": {"reachable": true},
            "server": {"connections_accepted": 10, "total_requests": 42},
            "configuration_hash": "779742c3d7afee2e38f977044d2ed96b",
            "memory": {"lua_shared_dicts": {}}
        }))
        .unwrap();
        assert!(status.database.reachable);
        assert_eq!(status.server.total_requests, 42);
        assert_eq!(status.server.connections_active, 0);
        assert_eq!(
            status.configuration_hash.as_deref(),
            Some("779742c3d7afee2e38f977044d2ed96b")
        );
    }

    #[test]
    fn test_listeners_tolerate_empty_object() {
        let listeners: Listeners = serde_json::from_value(json!({
            "proxy_listeners": [{"ip": "0.0.0.0", "port": 8000, "listener": "0.0.0.0:8000"}],
            "stream_listeners": {}
        }))
        .unwrap();
        assert_eq!(listeners.proxy_listeners.len(), 1);
        assert_eq!(listeners.proxy_listeners[0].port, 8000);
        assert!(listeners.stream_listeners.is_empty());
    }

    #[test]
    fn test_validation_outcome_message() {
        assert!(ValidationOutcome::Valid.is_valid());
        assert_eq!(ValidationOutcome::Valid.message(), "");
        let invalid = ValidationOutcome::Invalid {
            message: "schema violation".to_owned(),
        };
        assert!(!invalid.is_valid());
        assert_eq!(invalid.message(), "schema violation");
    }
}
