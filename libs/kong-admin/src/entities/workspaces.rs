use serde_json::{Map, Value};

use crate::client::join_id;
use crate::entity::{EntityService, require_id};
use crate::error::KongError;

payload! {
    /// Tenant partition; requests are scoped to one with `Client::set_workspace`.
    pub struct Workspace {
        id: String,
        name: String,
        comment: String,
        config: Map<String, Value>,
        meta: Map<String, Value>,
        created_at: i64,
        updated_at: i64,
    }
}
resource!(Workspace, "workspace");
collection!(Workspace, "/workspaces");

impl EntityService<'_, Workspace> {
    /// Raw entities that belong to `workspace`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank workspace.
    pub async fn list_entities(&self, workspace: &str) -> Result<Vec<Value>, KongError> {
        let workspace = require_id("workspace", "identifier", Some(workspace))?;
        let path = format!("{}/entities", join_id("/workspaces", workspace));
        self.client.list_all(&path).await
    }
}
