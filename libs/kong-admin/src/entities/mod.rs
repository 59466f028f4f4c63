//! Built-in Admin API entities.
//!
//! Every payload field is optional: `None` is omitted on write and a missing
//! field decodes to `None`, so partial payloads work for both create and
//! update.

/// Declare a payload struct whose fields are all `Option<_>` and skipped when `None`.
macro_rules! payload {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }
    };
}

/// Implement [`Resource`](crate::entity::Resource) for a payload with an `id` field.
macro_rules! resource {
    ($name:ident, $kind:literal $(, upsert = $upsert:literal)?) => {
        impl $crate::entity::Resource for $name {
            const KIND: &'static str = $kind;
            $(const UPSERT_ON_CREATE: bool = $upsert;)?

            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }
        }
    };
}

macro_rules! collection {
    ($name:ident, $path:literal) => {
        impl $crate::entity::Entity for $name {
            const COLLECTION: &'static str = $path;
        }
    };
}

macro_rules! nested {
    ($name:ident, $parent:literal, $child:literal) => {
        impl $crate::entity::NestedEntity for $name {
            const PARENT_COLLECTION: &'static str = $parent;
            const CHILD_PATH: &'static str = $child;
        }
    };
}

mod admins;
mod consumers;
mod gateway;
mod rbac;
mod workspaces;

pub use admins::{Admin, AdminRoles};
pub use consumers::{
    Acl, BasicAuth, Consumer, ConsumerGroup, ConsumerGroupDetails, HmacAuth, JwtAuth, KeyAuth,
    MtlsAuth, Oauth2Credential, RateLimitingOverride,
};
pub use gateway::{
    CaCertificate, Certificate, CidrPort, Key, KeySet, License, Plugin, PluginScope, Route, Service, Sni, Target,
    Upstream, Vault,
};
pub use rbac::{
    RbacEndpointPermission, RbacEndpointPermissionService, RbacEntityPermission, RbacEntityPermissionService,
    RbacPermissions, RbacRole, RbacUser, RbacUserRoles,
};
pub use workspaces::Workspace;

use crate::client::Client;
use crate::entity::{EntityService, NestedEntityService};
use crate::error::KongError;

payload! {
    /// Reference to another entity, by id or by name.
    pub struct Ref {
        id: String,
        name: String,
    }
}

impl Ref {
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
        }
    }

    #[must_use]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

/// Join role names the way the Admin API expects them on write.
pub(crate) fn join_names<S: AsRef<str>>(names: &[S]) -> String {
    names.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",")
}

/// `{"roles": "<joined>"}`, rejecting a list with no non-blank role.
pub(crate) fn roles_body<S: AsRef<str>>(roles: &[S]) -> Result<serde_json::Value, KongError> {
    if roles.iter().all(|r| r.as_ref().trim().is_empty()) {
        return Err(KongError::invalid_argument("roles cannot be empty"));
    }
    Ok(serde_json::json!({ "roles": join_names(roles) }))
}

impl Client {
    #[must_use]
    pub fn services(&self) -> EntityService<'_, Service> {
        self.entity()
    }

    #[must_use]
    pub fn routes(&self) -> EntityService<'_, Route> {
        self.entity()
    }

    /// Routes nested under a service (`/services/<service>/routes`).
    #[must_use]
    pub fn service_routes(&self) -> NestedEntityService<'_, Route> {
        self.nested()
    }

    #[must_use]
    pub fn plugins(&self) -> EntityService<'_, Plugin> {
        self.entity()
    }

    #[must_use]
    pub fn upstreams(&self) -> EntityService<'_, Upstream> {
        self.entity()
    }

    /// Targets of an upstream (`/upstreams/<upstream>/targets`).
    #[must_use]
    pub fn targets(&self) -> NestedEntityService<'_, Target> {
        self.nested()
    }

    #[must_use]
    pub fn certificates(&self) -> EntityService<'_, Certificate> {
        self.entity()
    }

    #[must_use]
    pub fn snis(&self) -> EntityService<'_, Sni> {
        self.entity()
    }

    #[must_use]
    pub fn ca_certificates(&self) -> EntityService<'_, CaCertificate> {
        self.entity()
    }

    #[must_use]
    pub fn consumers(&self) -> EntityService<'_, Consumer> {
        self.entity()
    }

    #[must_use]
    pub fn key_auths(&self) -> NestedEntityService<'_, KeyAuth> {
        self.nested()
    }

    #[must_use]
    pub fn basic_auths(&self) -> NestedEntityService<'_, BasicAuth> {
        self.nested()
    }

    #[must_use]
    pub fn hmac_auths(&self) -> NestedEntityService<'_, HmacAuth> {
        self.nested()
    }

    #[must_use]
    pub fn jwt_auths(&self) -> NestedEntityService<'_, JwtAuth> {
        self.nested()
    }

    #[must_use]
    pub fn acls(&self) -> NestedEntityService<'_, Acl> {
        self.nested()
    }

    #[must_use]
    pub fn oauth2_credentials(&self) -> NestedEntityService<'_, Oauth2Credential> {
        self.nested()
    }

    #[must_use]
    pub fn mtls_auths(&self) -> NestedEntityService<'_, MtlsAuth> {
        self.nested()
    }

    #[must_use]
    pub fn consumer_groups(&self) -> EntityService<'_, ConsumerGroup> {
        self.entity()
    }

    #[must_use]
    pub fn vaults(&self) -> EntityService<'_, Vault> {
        self.entity()
    }

    #[must_use]
    pub fn key_sets(&self) -> EntityService<'_, KeySet> {
        self.entity()
    }

    #[must_use]
    pub fn keys(&self) -> EntityService<'_, Key> {
        self.entity()
    }

    /// Keys of a key set (`/key-sets/<set>/keys`).
    #[must_use]
    pub fn key_set_keys(&self) -> NestedEntityService<'_, Key> {
        self.nested()
    }

    #[must_use]
    pub fn licenses(&self) -> EntityService<'_, License> {
        self.entity()
    }

    #[must_use]
    pub fn workspaces(&self) -> EntityService<'_, Workspace> {
        self.entity()
    }

    #[must_use]
    pub fn rbac_roles(&self) -> EntityService<'_, RbacRole> {
        self.entity()
    }

    #[must_use]
    pub fn rbac_users(&self) -> EntityService<'_, RbacUser> {
        self.entity()
    }

    #[must_use]
    pub fn rbac_endpoint_permissions(&self) -> RbacEndpointPermissionService<'_> {
        RbacEndpointPermissionService::new(self)
    }

    #[must_use]
    pub fn rbac_entity_permissions(&self) -> RbacEntityPermissionService<'_> {
        RbacEntityPermissionService::new(self)
    }

    #[must_use]
    pub fn admins(&self) -> EntityService<'_, Admin> {
        self.entity()
    }
}
