//! Entities whose shape is only known at runtime, through a registered
//! [`EntityDescriptor`](crate::registry::EntityDescriptor).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::client::Client;
use crate::entity::{Collection, decode_items};
use crate::error::KongError;
use crate::pagination::ListOpt;
use crate::registry::{EntityDescriptor, FieldEncoding};

/// Instance of a registered kind: the JSON object plus the values of the
/// endpoint placeholders it lives under.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomEntity {
    pub kind: String,
    pub object: Map<String, Value>,
    pub references: HashMap<String, String>,
}

impl CustomEntity {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Fill the `${name}` placeholder of the endpoint template.
    #[must_use]
    pub fn with_reference(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.references.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.object.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.object.get(name)
    }

    /// Value of the primary key field, strings and numbers only.
    fn key(&self, descriptor: &EntityDescriptor) -> Option<String> {
        match self.object.get(descriptor.primary_key_field())? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn with_object(&self, object: Map<String, Value>) -> Self {
        Self {
            kind: self.kind.clone(),
            object,
            references: self.references.clone(),
        }
    }
}

/// Apply the descriptor's field encodings to the write-side payload.
fn encode_fields(descriptor: &EntityDescriptor, object: &Map<String, Value>) -> Value {
    let mut body = object.clone();
    for spec in descriptor.fields() {
        if spec.encoding != FieldEncoding::CommaJoined {
            continue;
        }
        if let Some(Value::Array(items)) = body.get(&spec.name) {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",");
            body.insert(spec.name.clone(), Value::String(joined));
        }
    }
    Value::Object(body)
}

/// CRUD over any registered kind.
#[derive(Debug, Clone, Copy)]
pub struct CustomEntityService<'c> {
    client: &'c Client,
}

impl<'c> CustomEntityService<'c> {
    pub(crate) fn new(client: &'c Client) -> Self {
        Self { client }
    }

    /// Descriptor and rendered collection path of `entity`.
    fn resolve(&self, entity: &CustomEntity) -> Result<(Arc<EntityDescriptor>, String), KongError> {
        let descriptor = self.client.registry().get(&entity.kind)?;
        let path = descriptor.render(&entity.references)?;
        Ok((descriptor, path))
    }

    fn collection<'d>(&self, descriptor: &'d EntityDescriptor, path: String) -> Collection<'d>
    where
        'c: 'd,
    {
        Collection::new(self.client, descriptor.kind(), path)
            .verbs(descriptor.verbs())
            .upsert(descriptor.upserts())
    }

    /// Create `entity`, upserting when it carries a primary key and the kind allows it.
    ///
    /// # Errors
    /// Fails before any request for an unregistered kind or a missing reference.
    pub async fn create(&self, entity: &CustomEntity) -> Result<CustomEntity, KongError> {
        let (descriptor, path) = self.resolve(entity)?;
        let key = entity.key(&descriptor);
        let body = encode_fields(&descriptor, &entity.object);
        let object: Map<String, Value> = self.collection(&descriptor, path).create(key.as_deref(), body).await?;
        Ok(entity.with_object(object))
    }

    /// Fetch the entity named by the primary key of `entity`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] when the primary key is missing.
    pub async fn get(&self, entity: &CustomEntity) -> Result<CustomEntity, KongError> {
        let (descriptor, path) = self.resolve(entity)?;
        let key = entity.key(&descriptor);
        let object: Map<String, Value> = self.collection(&descriptor, path).get(key.as_deref()).await?;
        Ok(entity.with_object(object))
    }

    /// Patch the entity named by the primary key of `entity`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] when the primary key is missing.
    pub async fn update(&self, entity: &CustomEntity) -> Result<CustomEntity, KongError> {
        let (descriptor, path) = self.resolve(entity)?;
        let key = entity.key(&descriptor);
        let body = encode_fields(&descriptor, &entity.object);
        let object: Map<String, Value> = self.collection(&descriptor, path).update(key.as_deref(), body).await?;
        Ok(entity.with_object(object))
    }

    /// Delete the entity named by the primary key of `entity`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] when the primary key is missing.
    pub async fn delete(&self, entity: &CustomEntity) -> Result<(), KongError> {
        let (descriptor, path) = self.resolve(entity)?;
        let key = entity.key(&descriptor);
        self.collection(&descriptor, path).delete(key.as_deref()).await
    }

    /// One page of the collection `template` points at (kind and references only).
    ///
    /// # Errors
    /// Fails before any request for an unregistered kind or a missing reference.
    pub async fn list(
        &self,
        template: &CustomEntity,
        opt: Option<&ListOpt>,
    ) -> Result<(Vec<CustomEntity>, Option<ListOpt>), KongError> {
        let (descriptor, path) = self.resolve(template)?;
        let (items, next) = self.collection(&descriptor, path).list(opt).await?;
        let objects: Vec<Map<String, Value>> = decode_items(items)?;
        Ok((objects.into_iter().map(|o| template.with_object(o)).collect(), next))
    }

    /// Every entity of the collection `template` points at.
    ///
    /// # Errors
    /// Stops at the first failing page.
    pub async fn list_all(&self, template: &CustomEntity) -> Result<Vec<CustomEntity>, KongError> {
        let (descriptor, path) = self.resolve(template)?;
        let opt = ListOpt::new().with_size(crate::config::DEFAULT_PAGE_SIZE);
        let items = self.collection(&descriptor, path).list_all(opt).await?;
        let objects: Vec<Map<String, Value>> = decode_items(items)?;
        Ok(objects.into_iter().map(|o| template.with_object(o)).collect())
    }
}

impl Client {
    /// CRUD over kinds registered in [`Client::registry`].
    #[must_use]
    pub fn custom_entities(&self) -> CustomEntityService<'_> {
        CustomEntityService::new(self)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_comma_joined_fields_on_write() {
        let descriptor = EntityDescriptor::new("grant", "/roles/${role_id}/grants")
            .identifier("role_id")
            .field("actions", FieldEncoding::CommaJoined);
        let entity = CustomEntity::new("grant")
            .with_field("actions", json!(["read", "update"]))
            .with_field("name", "g1");
        assert_eq!(
            encode_fields(&descriptor, &entity.object),
            json!({"actions": "read,update", "name": "g1"})
        );
    }

    #[test]
    fn test_primary_key_accepts_strings_and_numbers() {
        let descriptor = EntityDescriptor::new("thing", "/things").primary_key("number");
        assert_eq!(
            CustomEntity::new("thing").with_field("number", 7).key(&descriptor).as_deref(),
            Some("7")
        );
        assert_eq!(
            CustomEntity::new("thing").with_field("number", "x").key(&descriptor).as_deref(),
            Some("x")
        );
        assert!(CustomEntity::new("thing").with_field("number", true).key(&descriptor).is_none());
    }
}
