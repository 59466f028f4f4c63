//! Generic CRUD over Admin API collections.
//!
//! Every entity service follows the same contract:
//!
//! | Operation       | Path                   | Verb   |
//! |-----------------|------------------------|--------|
//! | create (no id)  | `/collection`          | POST   |
//! | create (id)     | `/collection/<id>`     | PUT    |
//! | get             | `/collection/<id>`     | GET    |
//! | update          | `/collection/<id>`     | PATCH  |
//! | delete          | `/collection/<id>`     | DELETE |
//! | list / list_all | `/collection`          | GET    |
//!
//! Identifier-bearing operations reject a missing or blank identifier with
//! [`KongError::InvalidArgument`] before any request is sent.

mod crud;

use std::marker::PhantomData;

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{Client, join_id};
use crate::error::KongError;
use crate::pagination::ListOpt;

pub(crate) use crud::{Collection, require_id};

/// Payload of an Admin API entity.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name used in error messages, e.g. `"service"`.
    const KIND: &'static str;

    /// Whether create with an identifier becomes a PUT upsert.
    ///
    /// Entities whose POST handler has side effects that PUT skips keep this `false`.
    const UPSERT_ON_CREATE: bool = true;

    /// Server identifier, if known.
    fn id(&self) -> Option<&str>;

    /// JSON sent on create and update.
    ///
    /// # Errors
    /// Returns [`KongError::Serialization`] if the payload cannot be encoded.
    fn to_wire(&self) -> Result<Value, KongError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Entity reachable at a top-level collection.
pub trait Entity: Resource {
    /// Collection path, e.g. `"/services"`.
    const COLLECTION: &'static str;
}

/// Entity scoped under a parent, at `/<parent>/<parent-id>/<child>`.
pub trait NestedEntity: Resource {
    /// Parent collection path, e.g. `"/upstreams"`.
    const PARENT_COLLECTION: &'static str;
    /// Child segment under the parent, e.g. `"targets"`.
    const CHILD_PATH: &'static str;
}

pub(crate) fn decode_items<E: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<E>, KongError> {
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(KongError::from))
        .collect()
}

/// CRUD service for a top-level entity.
pub struct EntityService<'c, E> {
    pub(crate) client: &'c Client,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityService<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EntityService<'_, E> {}

impl<'c, E: Entity> EntityService<'c, E> {
    pub(crate) fn new(client: &'c Client) -> Self {
        Self {
            client,
            _entity: PhantomData,
        }
    }

    fn collection(&self) -> Collection<'c> {
        Collection::new(self.client, E::KIND, E::COLLECTION).upsert(E::UPSERT_ON_CREATE)
    }

    /// Path of one entity, e.g. `/services/s1`.
    #[must_use]
    pub fn member_path(&self, id: &str) -> String {
        join_id(E::COLLECTION, id)
    }

    /// Create `entity`, upserting with PUT when it carries an id.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors. A 409 is not hidden.
    pub async fn create(&self, entity: &E) -> Result<E, KongError> {
        self.collection().create(entity.id(), entity.to_wire()?).await
    }

    /// Fetch by id or by name.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank identifier; a
    /// missing entity is an API error for which `is_not_found()` holds.
    pub async fn get(&self, name_or_id: &str) -> Result<E, KongError> {
        self.collection().get(Some(name_or_id)).await
    }

    /// Patch the entity identified by `entity.id()`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] when the payload has no id.
    pub async fn update(&self, entity: &E) -> Result<E, KongError> {
        self.collection().update(entity.id(), entity.to_wire()?).await
    }

    /// Delete by id or by name.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank identifier.
    pub async fn delete(&self, name_or_id: &str) -> Result<(), KongError> {
        self.collection().delete(Some(name_or_id)).await
    }

    /// One page of the collection.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn list(&self, opt: Option<&ListOpt>) -> Result<(Vec<E>, Option<ListOpt>), KongError> {
        let (items, next) = self.collection().list(opt).await?;
        Ok((decode_items(items)?, next))
    }

    /// Every entity of the collection.
    ///
    /// # Errors
    /// Stops at the first failing page.
    pub async fn list_all(&self) -> Result<Vec<E>, KongError> {
        self.list_all_with(ListOpt::new().with_size(crate::config::DEFAULT_PAGE_SIZE))
            .await
    }

    /// Every entity matching `opt` (tags, page size).
    ///
    /// # Errors
    /// Stops at the first failing page.
    pub async fn list_all_with(&self, opt: ListOpt) -> Result<Vec<E>, KongError> {
        decode_items(self.collection().list_all(opt).await?)
    }

    /// `true` if the entity exists, `false` on 404.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank identifier and any
    /// error other than 404.
    pub async fn exists(&self, name_or_id: &str) -> Result<bool, KongError> {
        let id = require_id(E::KIND, "identifier", Some(name_or_id))?;
        self.client.exists(&self.member_path(id)).await
    }

    /// Lazily walk the collection.
    pub fn stream(&self, opt: ListOpt) -> impl Stream<Item = Result<E, KongError>> + Send + 'static {
        self.client
            .list_stream(E::COLLECTION, opt)
            .map(|item| item.and_then(|value| Ok(serde_json::from_value(value)?)))
    }
}

/// CRUD service for an entity nested under a parent.
///
/// Every operation takes the parent identifier first and rejects a blank
/// one before any request is sent.
pub struct NestedEntityService<'c, E> {
    pub(crate) client: &'c Client,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for NestedEntityService<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for NestedEntityService<'_, E> {}

impl<'c, E: NestedEntity> NestedEntityService<'c, E> {
    pub(crate) fn new(client: &'c Client) -> Self {
        Self {
            client,
            _entity: PhantomData,
        }
    }

    /// Collection path under `parent`, e.g. `/upstreams/u1/targets`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent.
    pub fn collection_path(&self, parent: &str) -> Result<String, KongError> {
        let parent = require_id(E::KIND, "parent identifier", Some(parent))?;
        Ok(format!("{}/{}", join_id(E::PARENT_COLLECTION, parent), E::CHILD_PATH))
    }

    fn collection(&self, parent: &str) -> Result<Collection<'c>, KongError> {
        Ok(Collection::new(self.client, E::KIND, self.collection_path(parent)?).upsert(E::UPSERT_ON_CREATE))
    }

    /// Create `entity` under `parent`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent, or any
    /// transport, API or decoding error.
    pub async fn create(&self, parent: &str, entity: &E) -> Result<E, KongError> {
        let body = entity.to_wire()?;
        self.collection(parent)?.create(entity.id(), body).await
    }

    /// Fetch one entity under `parent`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent or id.
    pub async fn get(&self, parent: &str, id: &str) -> Result<E, KongError> {
        self.collection(parent)?.get(Some(id)).await
    }

    /// Patch `entity` under `parent`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent or missing id.
    pub async fn update(&self, parent: &str, entity: &E) -> Result<E, KongError> {
        let collection = self.collection(parent)?;
        collection.update(entity.id(), entity.to_wire()?).await
    }

    /// Delete one entity under `parent`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent or id.
    pub async fn delete(&self, parent: &str, id: &str) -> Result<(), KongError> {
        self.collection(parent)?.delete(Some(id)).await
    }

    /// One page of the entities under `parent`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent.
    pub async fn list(&self, parent: &str, opt: Option<&ListOpt>) -> Result<(Vec<E>, Option<ListOpt>), KongError> {
        let (items, next) = self.collection(parent)?.list(opt).await?;
        Ok((decode_items(items)?, next))
    }

    /// Every entity under `parent`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a blank parent; stops at the
    /// first failing page.
    pub async fn list_all(&self, parent: &str) -> Result<Vec<E>, KongError> {
        let opt = ListOpt::new().with_size(crate::config::DEFAULT_PAGE_SIZE);
        decode_items(self.collection(parent)?.list_all(opt).await?)
    }
}

impl<E: NestedEntity + Entity> NestedEntityService<'_, E> {
    /// One page of the global listing, across every parent.
    ///
    /// # Errors
    /// Returns transport, API or decoding errors.
    pub async fn list_global(&self, opt: Option<&ListOpt>) -> Result<(Vec<E>, Option<ListOpt>), KongError> {
        EntityService::<E>::new(self.client).list(opt).await
    }

    /// Every entity of the global listing.
    ///
    /// # Errors
    /// Stops at the first failing page.
    pub async fn list_all_global(&self) -> Result<Vec<E>, KongError> {
        EntityService::<E>::new(self.client).list_all().await
    }
}

impl Client {
    /// CRUD service for any top-level entity type.
    #[must_use]
    pub fn entity<E: Entity>(&self) -> EntityService<'_, E> {
        EntityService::new(self)
    }

    /// CRUD service for any nested entity type.
    #[must_use]
    pub fn nested<E: NestedEntity>(&self) -> NestedEntityService<'_, E> {
        NestedEntityService::new(self)
    }
}
