use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::Ref;
use crate::client::join_id;
use crate::entity::{EntityService, decode_items, require_id};
use crate::error::KongError;
use crate::pagination::{ListOpt, seq_or_empty_object};

payload! {
    pub struct Consumer {
        id: String,
        username: String,
        custom_id: String,
        tags: Vec<String>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(Consumer, "consumer");
collection!(Consumer, "/consumers");

payload! {
    pub struct KeyAuth {
        id: String,
        key: String,
        ttl: i64,
        consumer: Ref,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(KeyAuth, "key-auth credential");
collection!(KeyAuth, "/key-auths");
nested!(KeyAuth, "/consumers", "key-auth");

payload! {
    pub struct BasicAuth {
        id: String,
        username: String,
        password: String,
        consumer: Ref,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(BasicAuth, "basic-auth credential");
collection!(BasicAuth, "/basic-auths");
nested!(BasicAuth, "/consumers", "basic-auth");

payload! {
    pub struct HmacAuth {
        id: String,
        username: String,
        secret: String,
        consumer: Ref,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(HmacAuth, "hmac-auth credential");
collection!(HmacAuth, "/hmac-auths");
nested!(HmacAuth, "/consumers", "hmac-auth");

payload! {
    pub struct JwtAuth {
        id: String,
        algorithm: String,
        key: String,
        secret: String,
        rsa_public_key: String,
        consumer: Ref,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(JwtAuth, "jwt credential");
collection!(JwtAuth, "/jwts");
nested!(JwtAuth, "/consumers", "jwt");

payload! {
    /// ACL group membership of a consumer.
    pub struct Acl {
        id: String,
        group: String,
        consumer: Ref,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(Acl, "acl");
collection!(Acl, "/acls");
nested!(Acl, "/consumers", "acls");

payload! {
    pub struct Oauth2Credential {
        id: String,
        name: String,
        client_id: String,
        client_secret: String,
        client_type: String,
        hash_secret: bool,
        redirect_uris: Vec<String>,
        consumer: Ref,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(Oauth2Credential, "oauth2 credential");
collection!(Oauth2Credential, "/oauth2");
nested!(Oauth2Credential, "/consumers", "oauth2");

payload! {
    pub struct MtlsAuth {
        id: String,
        subject_name: String,
        ca_certificate: Ref,
        consumer: Ref,
        tags: Vec<String>,
        created_at: i64,
    }
}
resource!(MtlsAuth, "mtls-auth credential");
collection!(MtlsAuth, "/mtls-auths");
nested!(MtlsAuth, "/consumers", "mtls-auth");

payload! {
    pub struct ConsumerGroup {
        id: String,
        name: String,
        tags: Vec<String>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(ConsumerGroup, "consumer group");
collection!(ConsumerGroup, "/consumer_groups");

/// A consumer group with its members and scoped plugins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerGroupDetails {
    #[serde(default)]
    pub consumer_group: Option<ConsumerGroup>,
    #[serde(default, deserialize_with = "seq_or_empty_object")]
    pub consumers: Vec<Consumer>,
    #[serde(default, deserialize_with = "seq_or_empty_object")]
    pub plugins: Vec<Value>,
}

payload! {
    /// Per-group settings overriding the rate-limiting-advanced plugin.
    pub struct RateLimitingOverride {
        consumer_group: String,
        plugin: String,
        config: Map<String, Value>,
    }
}

const RATE_LIMITING_ADVANCED: &str = "rate-limiting-advanced";

impl EntityService<'_, ConsumerGroup> {
    fn group_path(group: &str) -> Result<String, KongError> {
        let group = require_id("consumer group", "identifier", Some(group))?;
        Ok(join_id("/consumer_groups", group))
    }

    /// Group with its consumers and plugins.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank group.
    pub async fn details(&self, group: &str) -> Result<ConsumerGroupDetails, KongError> {
        self.client.get_json(&Self::group_path(group)?).await
    }

    /// Add `consumer` (id or username) to `group`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank group or consumer.
    pub async fn add_consumer(&self, group: &str, consumer: &str) -> Result<ConsumerGroupDetails, KongError> {
        let path = format!("{}/consumers", Self::group_path(group)?);
        let consumer = require_id("consumer", "identifier", Some(consumer))?;
        self.client
            .request(Method::POST, &path)
            .json(&json!({ "consumer": consumer }))
            .send()
            .await
    }

    /// Remove `consumer` from `group`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank group or consumer.
    pub async fn remove_consumer(&self, group: &str, consumer: &str) -> Result<(), KongError> {
        let path = format!("{}/consumers", Self::group_path(group)?);
        let consumer = require_id("consumer", "identifier", Some(consumer))?;
        self.client
            .request(Method::DELETE, &join_id(&path, consumer))
            .send_discard()
            .await
            .map(drop)
    }

    /// Every consumer in `group`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank group.
    pub async fn list_consumers(&self, group: &str) -> Result<Vec<Consumer>, KongError> {
        let path = format!("{}/consumers", Self::group_path(group)?);
        let opt = ListOpt::new().with_size(crate::config::DEFAULT_PAGE_SIZE);
        decode_items(self.client.list_all_with(&path, opt).await?)
    }

    /// Create or replace the rate-limiting-advanced override of `group`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank group.
    pub async fn upsert_rate_limiting_override(
        &self,
        group: &str,
        config: Map<String, Value>,
    ) -> Result<RateLimitingOverride, KongError> {
        let path = format!("{}/overrides/plugins/{RATE_LIMITING_ADVANCED}", Self::group_path(group)?);
        self.client
            .request(Method::PUT, &path)
            .json(&json!({ "config": config }))
            .send()
            .await
    }
}
