//! Registry of entity kinds served by [`CustomEntityService`](crate::custom::CustomEntityService).
//!
//! A descriptor names an endpoint template such as
//! `/consumers/${consumer_id}/key-auth`; every `${placeholder}` must be one of
//! the descriptor's identifier fields and vice versa. Descriptors are
//! immutable once registered and are never removed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use http::Method;
use parking_lot::RwLock;

use crate::endpoint;
use crate::error::{KongError, RegistryError};

/// Logical CRUD operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Get,
    Update,
    Delete,
    List,
}

/// HTTP verb used for each logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrudVerbs {
    pub create: Method,
    pub get: Method,
    pub update: Method,
    pub delete: Method,
    pub list: Method,
}

impl Default for CrudVerbs {
    fn default() -> Self {
        Self {
            create: Method::POST,
            get: Method::GET,
            update: Method::PATCH,
            delete: Method::DELETE,
            list: Method::GET,
        }
    }
}

impl CrudVerbs {
    #[must_use]
    pub fn verb(&self, op: Operation) -> &Method {
        match op {
            Operation::Create => &self.create,
            Operation::Get => &self.get,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
            Operation::List => &self.list,
        }
    }

    fn set(&mut self, op: Operation, method: Method) {
        match op {
            Operation::Create => self.create = method,
            Operation::Get => self.get = method,
            Operation::Update => self.update = method,
            Operation::Delete => self.delete = method,
            Operation::List => self.list = method,
        }
    }
}

/// JSON encoding rule for one payload field on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldEncoding {
    /// Sent as is.
    #[default]
    Plain,
    /// An array of strings sent as one comma-joined string.
    CommaJoined,
}

/// Payload field with a non-default encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub encoding: FieldEncoding,
}

/// Schema of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    kind: String,
    endpoint: String,
    identifiers: Vec<String>,
    primary_key: String,
    verbs: CrudVerbs,
    upsert: bool,
    fields: Vec<FieldSpec>,
}

impl EntityDescriptor {
    /// Descriptor for `kind` served at `endpoint`, with default verbs,
    /// primary key `id` and PUT upsert on create when the key is present.
    #[must_use]
    pub fn new(kind: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            endpoint: endpoint.into(),
            identifiers: Vec::new(),
            primary_key: "id".to_owned(),
            verbs: CrudVerbs::default(),
            upsert: true,
            fields: Vec::new(),
        }
    }

    /// Declare an identifier field that fills the `${name}` placeholder.
    #[must_use]
    pub fn identifier(mut self, name: impl Into<String>) -> Self {
        self.identifiers.push(name.into());
        self
    }

    #[must_use]
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    #[must_use]
    pub fn verb(mut self, op: Operation, method: Method) -> Self {
        self.verbs.set(op, method);
        self
    }

    /// Disable PUT upsert; create always POSTs to the collection.
    #[must_use]
    pub fn post_only(mut self) -> Self {
        self.upsert = false;
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, encoding: FieldEncoding) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            encoding,
        });
        self
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn endpoint_template(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    #[must_use]
    pub fn primary_key_field(&self) -> &str {
        &self.primary_key
    }

    #[must_use]
    pub fn verbs(&self) -> &CrudVerbs {
        &self.verbs
    }

    #[must_use]
    pub fn upserts(&self) -> bool {
        self.upsert
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Check the tag and that placeholders and identifier fields coincide.
    ///
    /// # Errors
    /// Returns the first rule the descriptor breaks.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.kind.trim().is_empty() {
            return Err(RegistryError::EmptyType);
        }
        let placeholders = placeholders(&self.endpoint)?;
        let fields: BTreeSet<&str> = self.identifiers.iter().map(String::as_str).collect();
        let found: BTreeSet<&str> = placeholders.iter().map(String::as_str).collect();
        if fields != found || fields.len() != self.identifiers.len() {
            return Err(RegistryError::PlaceholderMismatch {
                placeholders,
                fields: self.identifiers.clone(),
            });
        }
        Ok(())
    }

    /// Fill the template from `references`.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] if a reference is missing or blank.
    pub fn render(&self, references: &HashMap<String, String>) -> Result<String, KongError> {
        let mut out = String::with_capacity(self.endpoint.len());
        let mut rest = self.endpoint.as_str();
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                break;
            };
            let name = &after[..end];
            let value = references
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    KongError::invalid_argument(format!(
                        "{} requires reference '{name}'",
                        self.kind
                    ))
                })?;
            out.push_str(&endpoint::segment(value));
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Placeholder names of `template`, in order of appearance.
fn placeholders(template: &str) -> Result<Vec<String>, RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidTemplate {
        template: template.to_owned(),
        reason: reason.to_owned(),
    };

    if !template.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if template.contains('?') {
        return Err(invalid("cannot carry a query string"));
    }

    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| invalid("unterminated placeholder"))?;
        let name = &after[..end];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("placeholder names must be non-empty [A-Za-z0-9_]"));
        }
        if names.iter().any(|n| n == name) {
            return Err(invalid("placeholder used twice"));
        }
        names.push(name.to_owned());
        rest = &after[end + 1..];
    }
    Ok(names)
}

/// Thread-safe map from entity kind to descriptor.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<EntityDescriptor>>>,
}

impl Registry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the consumer credential kinds.
    #[must_use]
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        {
            let mut entries = registry.entries.write();
            for descriptor in builtin_descriptors() {
                entries.insert(descriptor.kind.clone(), Arc::new(descriptor));
            }
        }
        registry
    }

    /// Register a new kind.
    ///
    /// # Errors
    /// Fails if the descriptor is invalid or the kind is already registered.
    pub fn register(&self, descriptor: EntityDescriptor) -> Result<(), RegistryError> {
        descriptor.validate()?;
        let mut entries = self.entries.write();
        if entries.contains_key(&descriptor.kind) {
            return Err(RegistryError::AlreadyRegistered(descriptor.kind));
        }
        tracing::debug!(kind = %descriptor.kind, endpoint = %descriptor.endpoint, "registered entity kind");
        entries.insert(descriptor.kind.clone(), Arc::new(descriptor));
        Ok(())
    }

    #[must_use]
    pub fn lookup(&self, kind: &str) -> Option<Arc<EntityDescriptor>> {
        self.entries.read().get(kind).cloned()
    }

    /// Like [`lookup`](Self::lookup) but reports an unknown kind as an error.
    ///
    /// # Errors
    /// Returns [`RegistryError::NotRegistered`].
    pub fn get(&self, kind: &str) -> Result<Arc<EntityDescriptor>, RegistryError> {
        self.lookup(kind)
            .ok_or_else(|| RegistryError::NotRegistered(kind.to_owned()))
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.entries.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

fn builtin_descriptors() -> Vec<EntityDescriptor> {
    [
        ("key-auth", "key-auth"),
        ("basic-auth", "basic-auth"),
        ("hmac-auth", "hmac-auth"),
        ("jwt", "jwt"),
        ("acl", "acls"),
        ("oauth2", "oauth2"),
        ("mtls-auth", "mtls-auth"),
    ]
    .into_iter()
    .map(|(kind, path)| {
        EntityDescriptor::new(kind, format!("/consumers/${{consumer_id}}/{path}")).identifier("consumer_id")
    })
    .collect()
}
