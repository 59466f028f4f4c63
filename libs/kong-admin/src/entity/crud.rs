use std::borrow::Cow;

use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{Client, join_id};
use crate::error::KongError;
use crate::pagination::ListOpt;
use crate::registry::CrudVerbs;

/// Reject a missing or whitespace-only identifier.
pub(crate) fn require_id<'i>(kind: &str, what: &str, id: Option<&'i str>) -> Result<&'i str, KongError> {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(KongError::invalid_argument(format!("{kind} {what} cannot be empty"))),
    }
}

/// One concrete collection path and the verbs used against it.
///
/// Shared by typed entity services and by custom entities.
pub(crate) struct Collection<'a> {
    client: &'a Client,
    kind: Cow<'a, str>,
    path: String,
    verbs: Cow<'a, CrudVerbs>,
    upsert: bool,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(client: &'a Client, kind: impl Into<Cow<'a, str>>, path: impl Into<String>) -> Self {
        Self {
            client,
            kind: kind.into(),
            path: path.into(),
            verbs: Cow::Owned(CrudVerbs::default()),
            upsert: true,
        }
    }

    pub(crate) fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub(crate) fn verbs(mut self, verbs: &'a CrudVerbs) -> Self {
        self.verbs = Cow::Borrowed(verbs);
        self
    }

    fn member(&self, what: &str, id: Option<&str>) -> Result<String, KongError> {
        let id = require_id(&self.kind, what, id)?;
        Ok(join_id(&self.path, id))
    }

    pub(crate) async fn create<T: DeserializeOwned>(&self, id: Option<&str>, body: Value) -> Result<T, KongError> {
        let id = id.map(str::trim).filter(|id| !id.is_empty());
        let (method, endpoint) = match id {
            Some(id) if self.upsert => (Method::PUT, join_id(&self.path, id)),
            _ => (self.verbs.create.clone(), self.path.clone()),
        };
        self.client.request(method, &endpoint).body(body).send().await
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, id: Option<&str>) -> Result<T, KongError> {
        let endpoint = self.member("identifier", id)?;
        self.client.request(self.verbs.get.clone(), &endpoint).send().await
    }

    pub(crate) async fn update<T: DeserializeOwned>(&self, id: Option<&str>, body: Value) -> Result<T, KongError> {
        let endpoint = self.member("id", id)?;
        self.client
            .request(self.verbs.update.clone(), &endpoint)
            .body(body)
            .send()
            .await
    }

    pub(crate) async fn delete(&self, id: Option<&str>) -> Result<(), KongError> {
        let endpoint = self.member("identifier", id)?;
        self.client
            .request(self.verbs.delete.clone(), &endpoint)
            .send_discard()
            .await
            .map(drop)
    }

    pub(crate) async fn list(&self, opt: Option<&ListOpt>) -> Result<(Vec<Value>, Option<ListOpt>), KongError> {
        self.client.list_with_method(self.verbs.list.clone(), &self.path, opt).await
    }

    pub(crate) async fn list_all(&self, opt: ListOpt) -> Result<Vec<Value>, KongError> {
        self.client
            .list_all_with_method(self.verbs.list.clone(), &self.path, opt)
            .await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_require_id() {
        assert_eq!(require_id("service", "identifier", Some(" s1 ")).unwrap(), "s1");
        for id in [None, Some(""), Some("   "), Some("\t\n")] {
            let err = require_id("service", "identifier", id).unwrap_err();
            assert!(matches!(err, KongError::InvalidArgument(ref m) if m == "service identifier cannot be empty"));
        }
    }
}
