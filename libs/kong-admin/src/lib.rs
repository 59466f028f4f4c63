#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Async client for the Kong Admin API
//!
//! This crate provides:
//! - URL composition with per-request workspace scoping
//! - A request builder and execute paths that classify HTTP errors
//! - Offset pagination, eager (`list_all`) or lazy (`list_stream`)
//! - Typed CRUD services for the built-in entities
//! - A runtime registry for custom entity kinds
//! - Node endpoints: status, root document, declarative config, schemas
//!
//! # Example
//!
//! ```ignore
//! use kong_admin::{Client, ListOpt, Service};
//!
//! let client = Client::builder()
//!     .base_url("http://localhost:8001")
//!     .workspace("team-a")
//!     .build()?;
//!
//! client
//!     .services()
//!     .create(&Service { name: Some("s1".into()), host: Some("example.com".into()), ..Default::default() })
//!     .await?;
//!
//! let tagged = client
//!     .services()
//!     .list_all_with(ListOpt::new().with_tags(["prod"], true))
//!     .await?;
//! ```
//!
//! # Errors
//!
//! Every fallible call returns [`KongError`]. Responses outside 200 to 399
//! become [`KongError::Api`]; use [`KongError::is_not_found`] to recognize 404.

mod admin_api;
mod client;
mod config;
mod custom;
mod debug;
mod endpoint;
mod entities;
mod entity;
mod error;
mod layers;
mod pagination;
mod registry;
mod request;
mod response;
mod transport;
mod workspace;

pub use admin_api::{
    DatabaseStatus, Info, Listeners, ProxyListener, ServerCounters, Status, StreamListener, TagEntry,
    ValidationOutcome,
};
pub use client::{Client, ClientBuilder};
pub use config::{
    ADMIN_TOKEN_HEADER, CLUSTER_ID_PARAM, ClientConfig, DEFAULT_ADMIN_URL, DEFAULT_CLUSTER_ID, DEFAULT_PAGE_SIZE,
    DEFAULT_TIMEOUT, ENV_PREFIX,
};
pub use custom::{CustomEntity, CustomEntityService};
pub use debug::{CaptureSink, DebugSink, TracingSink, WIRE_TARGET};
pub use endpoint::{RootUrl, compose, segment};
pub use entities::{
    Acl, Admin, AdminRoles, BasicAuth, CaCertificate, Certificate, CidrPort, Consumer, ConsumerGroup,
    ConsumerGroupDetails, HmacAuth, JwtAuth, Key, KeyAuth, KeySet, License, MtlsAuth, Oauth2Credential, Plugin,
    PluginScope, RateLimitingOverride, RbacEndpointPermission, RbacEndpointPermissionService, RbacEntityPermission,
    RbacEntityPermissionService, RbacPermissions, RbacRole, RbacUser, RbacUserRoles, Ref, Route, Service, Sni, Target,
    Upstream, Vault, Workspace,
};
pub use entity::{Entity, EntityService, NestedEntity, NestedEntityService, Resource};
pub use error::{ApiError, KongError, RegistryError, is_not_found};
pub use layers::{FixedHeadersLayer, FixedHeadersService};
pub use pagination::ListOpt;
pub use registry::{CrudVerbs, EntityDescriptor, FieldEncoding, FieldSpec, Operation, Registry};
pub use request::{JSON_CONTENT_TYPE, Request, RequestBody, RequestBuilder};
pub use response::{RawResponse, Response, classify, is_success};
pub use transport::{HttpTransport, HttpTransportBuilder, ResponseBody, Transport, TransportRequest};
