use std::collections::HashMap;

use serde_json::{Map, Value};

use super::Ref;
use crate::client::join_id;
use crate::entity::{EntityService, decode_items, require_id};
use crate::error::KongError;
use crate::pagination::ListOpt;

payload! {
    /// Upstream API proxied by the gateway.
    pub struct Service {
        id: String,
        name: String,
        host: String,
        port: u16,
        path: String,
        protocol: String,
        /// Shorthand for protocol, host, port and path. Write-only.
        url: String,
        retries: u32,
        connect_timeout: u64,
        read_timeout: u64,
        write_timeout: u64,
        client_certificate: Ref,
        tls_verify: bool,
        tls_verify_depth: u32,
        ca_certificates: Vec<String>,
        enabled: bool,
        tags: Vec<String>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(Service, "service");
collection!(Service, "/services");

payload! {
    /// Source or destination matcher of a stream route.
    pub struct CidrPort {
        ip: String,
        port: u16,
    }
}

payload! {
    /// Matching rules that send requests to a service.
    pub struct Route {
        id: String,
        name: String,
        protocols: Vec<String>,
        methods: Vec<String>,
        hosts: Vec<String>,
        paths: Vec<String>,
        headers: HashMap<String, Vec<String>>,
        snis: Vec<String>,
        sources: Vec<CidrPort>,
        destinations: Vec<CidrPort>,
        expression: String,
        priority: u64,
        https_redirect_status_code: u16,
        regex_priority: i64,
        strip_path: bool,
        path_handling: String,
        preserve_host: bool,
        request_buffering: bool,
        response_buffering: bool,
        service: Ref,
        tags: Vec<String>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(Route, "route");
collection!(Route, "/routes");
nested!(Route, "/services", "routes");

payload! {
    /// Plugin instance, global or scoped to a service, route, consumer or consumer group.
    pub struct Plugin {
        id: String,
        name: String,
        instance_name: String,
        config: Map<String, Value>,
        enabled: bool,
        protocols: Vec<String>,
        ordering: Value,
        service: Ref,
        route: Ref,
        consumer: Ref,
        consumer_group: Ref,
        tags: Vec<String>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(Plugin, "plugin");
collection!(Plugin, "/plugins");

/// Parent whose plugins are listed or created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginScope<'a> {
    Service(&'a str),
    Route(&'a str),
    Consumer(&'a str),
    ConsumerGroup(&'a str),
}

impl PluginScope<'_> {
    fn collection(self) -> Result<String, KongError> {
        let (parent, id) = match self {
            Self::Service(id) => ("/services", id),
            Self::Route(id) => ("/routes", id),
            Self::Consumer(id) => ("/consumers", id),
            Self::ConsumerGroup(id) => ("/consumer_groups", id),
        };
        let id = require_id("plugin", "parent identifier", Some(id))?;
        Ok(format!("{}/plugins", join_id(parent, id)))
    }
}

impl EntityService<'_, Plugin> {
    /// Create `plugin` attached to `scope`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent identifier.
    pub async fn create_for(&self, scope: PluginScope<'_>, plugin: &Plugin) -> Result<Plugin, KongError> {
        let path = scope.collection()?;
        let body = crate::entity::Resource::to_wire(plugin)?;
        crate::entity::Collection::new(self.client, "plugin", path)
            .create(plugin.id.as_deref(), body)
            .await
    }

    /// One page of the plugins attached to `scope`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent identifier.
    pub async fn list_for(
        &self,
        scope: PluginScope<'_>,
        opt: Option<&ListOpt>,
    ) -> Result<(Vec<Plugin>, Option<ListOpt>), KongError> {
        let (items, next) = self.client.list(&scope.collection()?, opt).await?;
        Ok((decode_items(items)?, next))
    }

    /// Every plugin attached to `scope`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent identifier.
    pub async fn list_all_for(&self, scope: PluginScope<'_>) -> Result<Vec<Plugin>, KongError> {
        decode_items(self.client.list_all(&scope.collection()?).await?)
    }

    /// Names of the plugins enabled on the node.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn enabled(&self) -> Result<Vec<String>, KongError> {
        #[derive(serde::Deserialize)]
        struct Enabled {
            #[serde(default)]
            enabled_plugins: Vec<String>,
        }
        let enabled: Enabled = self.client.get_json("/plugins/enabled").await?;
        Ok(enabled.enabled_plugins)
    }
}

payload! {
    /// Virtual hostname load balancing over targets.
    pub struct Upstream {
        id: String,
        name: String,
        host_header: String,
        client_certificate: Ref,
        algorithm: String,
        slots: u32,
        healthchecks: Value,
        hash_on: String,
        hash_fallback: String,
        hash_on_header: String,
        hash_fallback_header: String,
        hash_on_cookie: String,
        hash_on_cookie_path: String,
        hash_on_query_arg: String,
        hash_fallback_query_arg: String,
        hash_on_uri_capture: String,
        hash_fallback_uri_capture: String,
        use_srv_name: bool,
        tags: Vec<String>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(Upstream, "upstream");
collection!(Upstream, "/upstreams");

payload! {
    /// Backend address of an upstream.
    pub struct Target {
        id: String,
        target: String,
        weight: u32,
        upstream: Ref,
        tags: Vec<String>,
        /// Fractional seconds.
        created_at: f64,
        updated_at: f64,
    }
}
resource!(Target, "target", upsert = false);
nested!(Target, "/upstreams", "targets");

payload! {
    pub struct Certificate {
        id: String,
        cert: String,
        key: String,
        cert_alt: String,
        key_alt: String,
        snis: Vec<String>,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(Certificate, "certificate");
collection!(Certificate, "/certificates");

payload! {
    pub struct Sni {
        id: String,
        name: String,
        certificate: Ref,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(Sni, "sni");
collection!(Sni, "/snis");

payload! {
    pub struct CaCertificate {
        id: String,
        cert: String,
        cert_digest: String,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(CaCertificate, "ca certificate");
collection!(CaCertificate, "/ca_certificates");

payload! {
    /// Secret storage backend referenced as `{vault://<prefix>/...}`.
    pub struct Vault {
        id: String,
        name: String,
        prefix: String,
        description: String,
        config: Map<String, Value>,
        tags: Vec<String>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(Vault, "vault");
collection!(Vault, "/vaults");

payload! {
    pub struct KeySet {
        id: String,
        name: String,
        tags: Vec<String>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(KeySet, "key set");
collection!(KeySet, "/key-sets");

payload! {
    /// JWK or PEM key, optionally grouped in a key set.
    pub struct Key {
        id: String,
        kid: String,
        name: String,
        jwk: String,
        pem: Map<String, Value>,
        set: Ref,
        tags: Vec<String>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(Key, "key");
collection!(Key, "/keys");
nested!(Key, "/key-sets", "keys");

payload! {
    pub struct License {
        id: String,
        payload: String,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(License, "license");
collection!(License, "/licenses");
