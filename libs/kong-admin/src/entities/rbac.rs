//! Role-based access control: roles, users and the permissions attached to roles.
//!
//! Permission `actions` are an array on read and a comma-joined string on
//! write. Callers only ever see the array; [`RbacEndpointPermission::to_wire`]
//! and [`RbacEntityPermission::to_wire`] produce the write shape.

use http::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{join_names, roles_body};
use crate::client::{Client, join_id};
use crate::entity::{EntityService, decode_items, require_id};
use crate::error::KongError;
use crate::pagination::seq_or_empty_object;

const ROLES: &str = "/rbac/roles";

payload! {
    pub struct RbacRole {
        id: String,
        name: String,
        comment: String,
        is_default: bool,
        created_at: i64,
    }
}
resource!(RbacRole, "rbac role");
collection!(RbacRole, "/rbac/roles");

payload! {
    /// Token-bearing RBAC principal.
    pub struct RbacUser {
        id: String,
        name: String,
        user_token: String,
        user_token_ident: String,
        comment: String,
        enabled: bool,
        created_at: i64,
    }
}
resource!(RbacUser, "rbac user", upsert = false);
collection!(RbacUser, "/rbac/users");

/// A user and the roles granted to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RbacUserRoles {
    #[serde(default)]
    pub user: Option<RbacUser>,
    #[serde(default, deserialize_with = "seq_or_empty_object")]
    pub roles: Vec<RbacRole>,
}

/// Effective permissions of a user, as computed by the server.
///
/// `endpoints` is keyed by workspace then by endpoint; `entities` by entity id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RbacPermissions {
    #[serde(default)]
    pub endpoints: Map<String, Value>,
    #[serde(default)]
    pub entities: Map<String, Value>,
}

impl EntityService<'_, RbacUser> {
    fn user_path(user: &str, tail: &str) -> Result<String, KongError> {
        let user = require_id("rbac user", "identifier", Some(user))?;
        Ok(format!("{}/{tail}", join_id("/rbac/users", user)))
    }

    /// Grant `roles` (names) to `user`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank user or no roles.
    pub async fn add_roles<S: AsRef<str>>(&self, user: &str, roles: &[S]) -> Result<RbacUserRoles, KongError> {
        let path = Self::user_path(user, "roles")?;
        self.client
            .request(Method::POST, &path)
            .json(&roles_body(roles)?)
            .send()
            .await
    }

    /// Roles granted to `user`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank user.
    pub async fn list_roles(&self, user: &str) -> Result<RbacUserRoles, KongError> {
        self.client.get_json(&Self::user_path(user, "roles")?).await
    }

    /// Revoke `roles` (names) from `user`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank user or no roles.
    pub async fn delete_roles<S: AsRef<str>>(&self, user: &str, roles: &[S]) -> Result<(), KongError> {
        let path = Self::user_path(user, "roles")?;
        self.client
            .request(Method::DELETE, &path)
            .json(&roles_body(roles)?)
            .send_discard()
            .await
            .map(drop)
    }

    /// Effective permissions of `user`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank user.
    pub async fn list_permissions(&self, user: &str) -> Result<RbacPermissions, KongError> {
        self.client.get_json(&Self::user_path(user, "permissions")?).await
    }
}

/// Accept the array form and, from older nodes, the joined string form.
fn actions_from_wire<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Actions {
        List(Vec<String>),
        Joined(String),
        Null(()),
    }
    Ok(match Actions::deserialize(d)? {
        Actions::List(actions) => actions,
        Actions::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_owned)
            .collect(),
        Actions::Null(()) => Vec::new(),
    })
}

fn role_ref(role: Option<&RbacRole>) -> Result<&str, KongError> {
    let role = role.and_then(|r| r.id.as_deref().or(r.name.as_deref()));
    require_id("rbac permission", "role", role)
}

/// Insert the write-side fields shared by both permission kinds.
fn common_wire(body: &mut Map<String, Value>, actions: &[String], negative: Option<bool>, comment: Option<&str>) {
    body.insert("actions".to_owned(), Value::String(join_names(actions)));
    if let Some(negative) = negative {
        body.insert("negative".to_owned(), Value::Bool(negative));
    }
    if let Some(comment) = comment {
        body.insert("comment".to_owned(), Value::String(comment.to_owned()));
    }
}

/// Fetch the full role and attach it to every permission.
async fn attach_role<P>(client: &Client, role: &str, permissions: &mut [P], slot: fn(&mut P) -> &mut Option<RbacRole>)
where
    P: Send,
{
    if permissions.is_empty() {
        return;
    }
    match client.rbac_roles().get(role).await {
        Ok(full) => {
            for permission in permissions {
                *slot(permission) = Some(full.clone());
            }
        }
        Err(err) => tracing::debug!(role, error = %err, "could not resolve rbac role"),
    }
}

/// Permission on a URL pattern inside a workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RbacEndpointPermission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, deserialize_with = "actions_from_wire")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RbacRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl RbacEndpointPermission {
    /// Write-side body: `actions` joined with commas, role omitted (it is in the path).
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut body = Map::new();
        if let Some(workspace) = &self.workspace {
            body.insert("workspace".to_owned(), Value::String(workspace.clone()));
        }
        if let Some(endpoint) = &self.endpoint {
            body.insert("endpoint".to_owned(), Value::String(endpoint.clone()));
        }
        common_wire(&mut body, &self.actions, self.negative, self.comment.as_deref());
        Value::Object(body)
    }

    fn role_slot(&mut self) -> &mut Option<RbacRole> {
        &mut self.role
    }
}

/// Endpoint permissions of a role, at `/rbac/roles/<role>/endpoints`.
#[derive(Debug, Clone, Copy)]
pub struct RbacEndpointPermissionService<'c> {
    client: &'c Client,
}

impl<'c> RbacEndpointPermissionService<'c> {
    pub(crate) fn new(client: &'c Client) -> Self {
        Self { client }
    }

    fn collection(role: &str) -> Result<String, KongError> {
        let role = require_id("rbac endpoint permission", "role", Some(role))?;
        Ok(format!("{}/endpoints", join_id(ROLES, role)))
    }

    /// `/rbac/roles/<role>/endpoints/<workspace>/<endpoint>`; the endpoint
    /// pattern keeps its slashes and loses its leading one.
    fn member(role: &str, workspace: Option<&str>, endpoint: Option<&str>) -> Result<String, KongError> {
        let workspace = require_id("rbac endpoint permission", "workspace", workspace)?;
        let endpoint = require_id("rbac endpoint permission", "endpoint", endpoint)?;
        let endpoint = endpoint.trim_start_matches('/');
        Ok(format!("{}/{endpoint}", join_id(&Self::collection(role)?, workspace)))
    }

    /// Attach `permission` to its role.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] when the role has neither id nor name.
    pub async fn create(&self, permission: &RbacEndpointPermission) -> Result<RbacEndpointPermission, KongError> {
        let role = role_ref(permission.role.as_ref())?;
        let mut created: RbacEndpointPermission = self
            .client
            .request(Method::POST, &Self::collection(role)?)
            .json(&permission.to_wire())
            .send()
            .await?;
        attach_role(self.client, role, std::slice::from_mut(&mut created), RbacEndpointPermission::role_slot).await;
        Ok(created)
    }

    /// Fetch the permission of `role` on `endpoint` in `workspace`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank role, workspace or endpoint.
    pub async fn get(&self, role: &str, workspace: &str, endpoint: &str) -> Result<RbacEndpointPermission, KongError> {
        let path = Self::member(role, Some(workspace), Some(endpoint))?;
        let mut permission: RbacEndpointPermission = self.client.get_json(&path).await?;
        attach_role(self.client, role, std::slice::from_mut(&mut permission), RbacEndpointPermission::role_slot).await;
        Ok(permission)
    }

    /// Patch actions, negation and comment of `permission`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a missing role, workspace or endpoint.
    pub async fn update(&self, permission: &RbacEndpointPermission) -> Result<RbacEndpointPermission, KongError> {
        let role = role_ref(permission.role.as_ref())?;
        let path = Self::member(role, permission.workspace.as_deref(), permission.endpoint.as_deref())?;
        let mut updated: RbacEndpointPermission = self
            .client
            .request(Method::PATCH, &path)
            .json(&permission.to_wire())
            .send()
            .await?;
        attach_role(self.client, role, std::slice::from_mut(&mut updated), RbacEndpointPermission::role_slot).await;
        Ok(updated)
    }

    /// Detach the permission of `role` on `endpoint` in `workspace`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank role, workspace or endpoint.
    pub async fn delete(&self, role: &str, workspace: &str, endpoint: &str) -> Result<(), KongError> {
        let path = Self::member(role, Some(workspace), Some(endpoint))?;
        self.client
            .request(Method::DELETE, &path)
            .send_discard()
            .await
            .map(drop)
    }

    /// Every endpoint permission of `role`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank role.
    pub async fn list_all(&self, role: &str) -> Result<Vec<RbacEndpointPermission>, KongError> {
        let mut permissions: Vec<RbacEndpointPermission> =
            decode_items(self.client.list_all(&Self::collection(role)?).await?)?;
        attach_role(self.client, role, &mut permissions, RbacEndpointPermission::role_slot).await;
        Ok(permissions)
    }
}

/// Permission on a single entity, by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RbacEntityPermission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, deserialize_with = "actions_from_wire")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RbacRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl RbacEntityPermission {
    /// Write-side body: `actions` joined with commas, role omitted.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut body = Map::new();
        if let Some(entity_id) = &self.entity_id {
            body.insert("entity_id".to_owned(), Value::String(entity_id.clone()));
        }
        if let Some(entity_type) = &self.entity_type {
            body.insert("entity_type".to_owned(), Value::String(entity_type.clone()));
        }
        common_wire(&mut body, &self.actions, self.negative, self.comment.as_deref());
        Value::Object(body)
    }

    fn role_slot(&mut self) -> &mut Option<RbacRole> {
        &mut self.role
    }
}

/// Entity permissions of a role, at `/rbac/roles/<role>/entities`.
#[derive(Debug, Clone, Copy)]
pub struct RbacEntityPermissionService<'c> {
    client: &'c Client,
}

impl<'c> RbacEntityPermissionService<'c> {
    pub(crate) fn new(client: &'c Client) -> Self {
        Self { client }
    }

    fn collection(role: &str) -> Result<String, KongError> {
        let role = require_id("rbac entity permission", "role", Some(role))?;
        Ok(format!("{}/entities", join_id(ROLES, role)))
    }

    fn member(role: &str, entity_id: Option<&str>) -> Result<String, KongError> {
        let entity_id = require_id("rbac entity permission", "entity id", entity_id)?;
        Ok(join_id(&Self::collection(role)?, entity_id))
    }

    /// Attach `permission` to its role.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] when the role has neither id nor name.
    pub async fn create(&self, permission: &RbacEntityPermission) -> Result<RbacEntityPermission, KongError> {
        let role = role_ref(permission.role.as_ref())?;
        let mut created: RbacEntityPermission = self
            .client
            .request(Method::POST, &Self::collection(role)?)
            .json(&permission.to_wire())
            .send()
            .await?;
        attach_role(self.client, role, std::slice::from_mut(&mut created), RbacEntityPermission::role_slot).await;
        Ok(created)
    }

    /// Fetch the permission of `role` on `entity_id`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank role or entity id.
    pub async fn get(&self, role: &str, entity_id: &str) -> Result<RbacEntityPermission, KongError> {
        let path = Self::member(role, Some(entity_id))?;
        let mut permission: RbacEntityPermission = self.client.get_json(&path).await?;
        attach_role(self.client, role, std::slice::from_mut(&mut permission), RbacEntityPermission::role_slot).await;
        Ok(permission)
    }

    /// Patch actions, negation and comment of `permission`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a missing role or entity id.
    pub async fn update(&self, permission: &RbacEntityPermission) -> Result<RbacEntityPermission, KongError> {
        let role = role_ref(permission.role.as_ref())?;
        let path = Self::member(role, permission.entity_id.as_deref())?;
        let mut updated: RbacEntityPermission = self
            .client
            .request(Method::PATCH, &path)
            .json(&permission.to_wire())
            .send()
            .await?;
        attach_role(self.client, role, std::slice::from_mut(&mut updated), RbacEntityPermission::role_slot).await;
        Ok(updated)
    }

    /// Detach the permission of `role` on `entity_id`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank role or entity id.
    pub async fn delete(&self, role: &str, entity_id: &str) -> Result<(), KongError> {
        let path = Self::member(role, Some(entity_id))?;
        self.client
            .request(Method::DELETE, &path)
            .send_discard()
            .await
            .map(drop)
    }

    /// Every entity permission of `role`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank role.
    pub async fn list_all(&self, role: &str) -> Result<Vec<RbacEntityPermission>, KongError> {
        let mut permissions: Vec<RbacEntityPermission> =
            decode_items(self.client.list_all(&Self::collection(role)?).await?)?;
        attach_role(self.client, role, &mut permissions, RbacEntityPermission::role_slot).await;
        Ok(permissions)
    }
}
