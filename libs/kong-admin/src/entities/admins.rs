use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{RbacRole, Workspace, roles_body};
use crate::client::join_id;
use crate::entity::{EntityService, require_id};
use crate::error::KongError;
use crate::pagination::seq_or_empty_object;

payload! {
    /// Administrator of the gateway.
    pub struct Admin {
        id: String,
        email: String,
        username: String,
        custom_id: String,
        rbac_token_enabled: bool,
        status: i32,
        /// Registration token, returned by `generate_register_url` and sent
        /// back by `register_credentials`.
        token: String,
        register_url: String,
        /// Write-only, used by `register_credentials`.
        password: String,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(Admin, "admin", upsert = false);
collection!(Admin, "/admins");

/// Roles granted to an administrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminRoles {
    #[serde(default, deserialize_with = "seq_or_empty_object")]
    pub roles: Vec<RbacRole>,
}

/// The invite and registration endpoints wrap the admin in `{"admin": {...}}`.
fn unwrap_admin(mut value: Value) -> Result<Admin, KongError> {
    let inner = value
        .as_object_mut()
        .and_then(|obj| obj.remove("admin"))
        .filter(Value::is_object);
    Ok(serde_json::from_value(inner.unwrap_or(value))?)
}

impl EntityService<'_, Admin> {
    fn admin_path(admin: &str) -> Result<String, KongError> {
        let admin = require_id("admin", "identifier", Some(admin))?;
        Ok(join_id("/admins", admin))
    }

    /// Create `admin` and email an invitation.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn invite(&self, admin: &Admin) -> Result<Admin, KongError> {
        let value: Value = self
            .client
            .request(Method::POST, "/admins")
            .query_pair("send_email", "true")
            .json(admin)
            .send()
            .await?;
        unwrap_admin(value)
    }

    /// Fetch `admin` together with a fresh registration URL and token.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank identifier.
    pub async fn generate_register_url(&self, admin: &str) -> Result<Admin, KongError> {
        let value: Value = self
            .client
            .request(Method::GET, &Self::admin_path(admin)?)
            .query_pair("generate_register_url", "true")
            .send()
            .await?;
        unwrap_admin(value)
    }

    /// Complete registration with the username, email, token and password of `admin`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] when any of the four is missing.
    pub async fn register_credentials(&self, admin: &Admin) -> Result<(), KongError> {
        let username = require_id("admin", "username", admin.username.as_deref())?;
        let email = require_id("admin", "email", admin.email.as_deref())?;
        let token = require_id("admin", "token", admin.token.as_deref())?;
        let password = require_id("admin", "password", admin.password.as_deref())?;
        self.client
            .request(Method::POST, "/admins/register")
            .json(&json!({
                "username": username,
                "email": email,
                "token": token,
                "password": password,
            }))
            .send_discard()
            .await
            .map(drop)
    }

    /// Workspaces `admin` belongs to.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank identifier.
    pub async fn list_workspaces(&self, admin: &str) -> Result<Vec<Workspace>, KongError> {
        #[derive(Deserialize)]
        #[serde(transparent)]
        struct Workspaces(#[serde(deserialize_with = "seq_or_empty_object")] Vec<Workspace>);

        let path = format!("{}/workspaces", Self::admin_path(admin)?);
        let Workspaces(workspaces) = self.client.get_json(&path).await?;
        Ok(workspaces)
    }

    /// Roles granted to `admin`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank identifier.
    pub async fn list_roles(&self, admin: &str) -> Result<Vec<RbacRole>, KongError> {
        let path = format!("{}/roles", Self::admin_path(admin)?);
        let roles: AdminRoles = self.client.get_json(&path).await?;
        Ok(roles.roles)
    }

    /// Grant `roles` (names) to `admin`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank identifier or no roles.
    pub async fn update_roles<S: AsRef<str>>(&self, admin: &str, roles: &[S]) -> Result<Vec<RbacRole>, KongError> {
        let request = self.roles_request(Method::POST, admin, roles)?;
        let roles: AdminRoles = request.send().await?;
        Ok(roles.roles)
    }

    /// Revoke `roles` (names) from `admin`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank identifier or no roles.
    pub async fn delete_roles<S: AsRef<str>>(&self, admin: &str, roles: &[S]) -> Result<(), KongError> {
        let request = self.roles_request(Method::DELETE, admin, roles)?;
        request.send_discard().await.map(drop)
    }

    fn roles_request<S: AsRef<str>>(
        &self,
        method: Method,
        admin: &str,
        roles: &[S],
    ) -> Result<crate::request::RequestBuilder, KongError> {
        let body = roles_body(roles)?;
        let path = format!("{}/roles", Self::admin_path(admin)?);
        Ok(self.client.request(method, &path).json(&body))
    }
}
