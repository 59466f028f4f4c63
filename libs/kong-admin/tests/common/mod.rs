#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! In-memory Admin API used by the integration tests.
//!
//! Serves `/services` CRUD with offset pagination, `/config`, `/tags`,
//! `/status`, the root document, schema validation and a catch-all that
//! echoes the request body. Every request is recorded.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use kong_admin::{Client, KongError, ResponseBody, Transport, TransportRequest};
use parking_lot::Mutex;
use serde_json::{Value, json};

pub const ROOT: &str = "http://kong.test:8001";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub url: String,
    pub body: Bytes,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Default)]
struct State {
    services: BTreeMap<String, Value>,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeKong {
    state: Mutex<State>,
    requests: Mutex<Vec<Recorded>>,
    workspaces: Mutex<BTreeSet<String>>,
    tags_supported: bool,
}

impl FakeKong {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tags_supported: true,
            ..Self::default()
        })
    }

    /// A node that answers 404 on `/tags`.
    pub fn without_tags() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `/<name>/...` resolve like the root paths.
    pub fn add_workspace(&self, name: &str) {
        self.workspaces.lock().insert(name.to_owned());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn clear(&self) {
        self.requests.lock().clear();
    }

    pub fn seed_services(&self, names: &[&str]) {
        let mut state = self.state.lock();
        for name in names {
            state.next_id += 1;
            let id = format!("svc-{}", state.next_id);
            state
                .services
                .insert((*name).to_owned(), json!({"id": id, "name": name, "host": "example.com"}));
        }
    }

    fn handle(&self, method: &Method, path: &[&str], query: &BTreeMap<String, String>, body: &[u8]) -> (StatusCode, Value) {
        let body: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(body).unwrap_or(Value::Null)
        };
        match (method.as_str(), path) {
            ("GET", [] | ["kong"]) => (
                StatusCode::OK,
                json!({
                    "version": "3.4.0",
                    "hostname": "kong-test",
                    "configuration": {
                        "proxy_listeners": [{"ip": "0.0.0.0", "port": 8000, "listener": "0.0.0.0:8000"}],
                        "stream_listeners": {}
                    },
                    "plugins": {"available_on_server": {}}
                }),
            ),
            ("GET", ["status"]) => (
                StatusCode::OK,
                json!({"database": {"reachable": true}, "server": {"total_requests": 3}}),
            ),
            ("GET", ["tags"]) if self.tags_supported => (StatusCode::OK, json!({"data": [], "next": null})),
            ("POST", ["config"]) => {
                if body.get("_format_version").is_some() {
                    (StatusCode::CREATED, Value::Null)
                } else {
                    (
                        StatusCode::BAD_REQUEST,
                        json!({"message": "declarative config is invalid: {_format_version=\"expected a string\"}"}),
                    )
                }
            }
            ("POST", ["schemas", _, "validate"]) => {
                if body.get("name").is_some() {
                    (StatusCode::OK, json!({"message": "schema validation successful"}))
                } else {
                    (StatusCode::BAD_REQUEST, json!({"message": "schema violation (name: required field missing)"}))
                }
            }
            (_, ["services", rest @ ..]) if rest.len() <= 1 => self.services(method, rest, query, body),
            ("POST", [.., "search"]) => (StatusCode::OK, json!({"data": [{"id": "found-1"}], "next": null})),
            ("GET", ["rbac", "roles", role]) => (StatusCode::OK, json!({"id": "role-1", "name": role})),
            ("POST" | "PUT" | "PATCH", _) => {
                let mut echoed = body.as_object().cloned().unwrap_or_default();
                echoed.entry("id").or_insert_with(|| json!("generated-1"));
                (StatusCode::CREATED, Value::Object(echoed))
            }
            ("DELETE", _) => (StatusCode::NO_CONTENT, Value::Null),
            ("GET", [.., "endpoints" | "entities"]) => (StatusCode::OK, json!({"data": [], "next": null})),
            _ => not_found(),
        }
    }

    fn services(&self, method: &Method, rest: &[&str], query: &BTreeMap<String, String>, body: Value) -> (StatusCode, Value) {
        let mut state = self.state.lock();
        match (method.as_str(), rest) {
            ("GET", []) => {
                let size = query.get("size").and_then(|s| s.parse::<usize>().ok()).unwrap_or(100);
                let start = query.get("offset").and_then(|s| s.parse::<usize>().ok()).unwrap_or(0);
                let all: Vec<Value> = state.services.values().cloned().collect();
                let page: Vec<Value> = all.iter().skip(start).take(size).cloned().collect();
                let end = start + page.len();
                if end < all.len() {
                    (
                        StatusCode::OK,
                        json!({"data": page, "next": format!("/services?offset={end}"), "offset": end.to_string()}),
                    )
                } else {
                    (StatusCode::OK, json!({"data": page, "next": null}))
                }
            }
            ("POST", []) => {
                let Some(name) = body.get("name").and_then(Value::as_str).map(str::to_owned) else {
                    return (StatusCode::BAD_REQUEST, json!({"message": "schema violation (name: required)"}));
                };
                if state.services.contains_key(&name) {
                    return (StatusCode::CONFLICT, json!({"message": "UNIQUE violation detected on '{name=\"s1\"}'"}));
                }
                state.next_id += 1;
                let mut created = body;
                created["id"] = json!(format!("svc-{}", state.next_id));
                state.services.insert(name, created.clone());
                (StatusCode::CREATED, created)
            }
            ("GET", [key]) => match find(&state.services, key) {
                Some(name) => (StatusCode::OK, state.services[&name].clone()),
                None => not_found(),
            },
            ("PATCH", [key]) => match find(&state.services, key) {
                Some(name) => {
                    let current = state.services.get_mut(&name).unwrap();
                    for (k, v) in body.as_object().cloned().unwrap_or_default() {
                        current[k] = v;
                    }
                    (StatusCode::OK, current.clone())
                }
                None => not_found(),
            },
            ("PUT", [key]) => {
                let mut upserted = body;
                upserted["id"] = json!(key);
                let name = upserted
                    .get("name")
                    .and_then(Value::as_str)
                    .map_or_else(|| (*key).to_owned(), str::to_owned);
                state.services.insert(name, upserted.clone());
                (StatusCode::OK, upserted)
            }
            ("DELETE", [key]) => {
                if let Some(name) = find(&state.services, key) {
                    state.services.remove(&name);
                }
                (StatusCode::NO_CONTENT, Value::Null)
            }
            _ => not_found(),
        }
    }
}

fn find(services: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    services
        .iter()
        .find(|(name, svc)| name.as_str() == key || svc.get("id").and_then(Value::as_str) == Some(key))
        .map(|(name, _)| name.clone())
}

fn not_found() -> (StatusCode, Value) {
    (StatusCode::NOT_FOUND, json!({"message": "Not found"}))
}

fn boxed(body: Bytes) -> ResponseBody {
    Full::new(body)
        .map_err(|never: Infallible| -> Box<dyn std::error::Error + Send + Sync> { match never {} })
        .boxed()
}

#[async_trait]
impl Transport for FakeKong {
    async fn send(&self, request: TransportRequest) -> Result<Response<ResponseBody>, KongError> {
        let (parts, body) = request.into_parts();
        let body = body.collect().await.unwrap().to_bytes();
        let url = url::Url::parse(&parts.uri.to_string()).unwrap();

        self.requests.lock().push(Recorded {
            method: parts.method.clone(),
            url: url.to_string(),
            body: body.clone(),
        });

        let mut segments: Vec<String> = url
            .path_segments()
            .map(|s| s.map(|seg| urlencoding::decode(seg).unwrap().into_owned()).collect())
            .unwrap_or_default();
        if segments.last().is_some_and(String::is_empty) {
            segments.pop();
        }
        if segments.first().is_some_and(|first| self.workspaces.lock().contains(first)) {
            segments.remove(0);
        }
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let query: BTreeMap<String, String> = url.query_pairs().into_owned().collect();

        let (status, value) = self.handle(&parts.method, &segments, &query, &body);
        let bytes = if value.is_null() {
            Bytes::new()
        } else {
            Bytes::from(serde_json::to_vec(&value).unwrap())
        };
        Ok(Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(boxed(bytes))
            .unwrap())
    }
}

/// Client over `fake`, rooted at [`ROOT`].
pub fn client(fake: &Arc<FakeKong>) -> Client {
    Client::builder()
        .base_url(ROOT)
        .transport(fake.clone())
        .build()
        .unwrap()
}
