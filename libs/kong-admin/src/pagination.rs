//! Cursor pagination over Admin API list endpoints.
//!
//! List endpoints answer with `{ "data": [...], "next": "<url>", "offset": "<token>" }`.
//! [`Client::list`] fetches one page and turns the continuation into a new
//! [`ListOpt`]; a `None` cursor means the listing is exhausted.
//! [`Client::list_all`] and [`Client::list_stream`] walk the cursor
//! sequentially.

use futures::stream::{self, Stream, TryStreamExt};
use http::Method;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::client::Client;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::endpoint;
use crate::error::KongError;

/// Paging and filtering controls for a list call.
///
/// A cursor returned by a list call carries the same size and tag filter as
/// the request that produced it, plus the continuation `offset`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOpt {
    /// Requested page size; the server default applies when `None`.
    pub size: Option<u32>,
    /// Tag filter.
    pub tags: Vec<String>,
    /// `true` selects entities carrying every tag, `false` any of them.
    pub match_all_tags: bool,
    /// Opaque continuation token.
    pub offset: Option<String>,
}

impl ListOpt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I, match_all: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.match_all_tags = match_all;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    fn validate(&self) -> Result<(), KongError> {
        if self.size == Some(0) {
            return Err(KongError::invalid_argument("page size must be positive"));
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(KongError::invalid_argument("tags cannot be empty"));
        }
        Ok(())
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(size) = self.size {
            pairs.push(("size".to_owned(), size.to_string()));
        }
        if !self.tags.is_empty() {
            let sep = if self.match_all_tags { "," } else { "/" };
            pairs.push(("tags".to_owned(), self.tags.join(sep)));
        }
        if let Some(offset) = self.offset.as_deref().filter(|o| !o.is_empty()) {
            pairs.push(("offset".to_owned(), offset.to_owned()));
        }
        pairs
    }

    fn next_page(&self, offset: String) -> Self {
        Self {
            offset: Some(offset),
            ..self.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, deserialize_with = "seq_or_empty_object")]
    data: Vec<Value>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    offset: Option<String>,
}

impl Envelope {
    fn continuation(&self) -> Option<String> {
        if let Some(offset) = self.offset.as_deref().filter(|o| !o.is_empty()) {
            return Some(offset.to_owned());
        }
        let next = self.next.as_deref()?;
        let (_, qs) = next.split_once('?')?;
        endpoint::parse_query(qs)
            .into_iter()
            .find(|(name, _)| name == "offset")
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
    }
}

/// Accept either a JSON array or an object standing in for an empty array.
///
/// The Admin API encodes some empty lists as `{}`.
pub(crate) fn seq_or_empty_object<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    match Value::deserialize(d)? {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        other => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}

impl Client {
    /// Fetch one page from `endpoint`.
    ///
    /// Returns the raw items and the cursor for the next page, or `None`
    /// once the listing is exhausted.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidArgument`] for a zero page size or blank
    /// tag, or any transport, API or decoding error.
    pub async fn list(
        &self,
        endpoint: &str,
        opt: Option<&ListOpt>,
    ) -> Result<(Vec<Value>, Option<ListOpt>), KongError> {
        self.list_with_method(Method::GET, endpoint, opt).await
    }

    /// Like [`list`](Self::list), sending the page request with `method`.
    ///
    /// # Errors
    /// Same as [`list`](Self::list).
    pub async fn list_with_method(
        &self,
        method: Method,
        endpoint: &str,
        opt: Option<&ListOpt>,
    ) -> Result<(Vec<Value>, Option<ListOpt>), KongError> {
        let opt = opt.cloned().unwrap_or_default();
        opt.validate()?;

        let envelope: Envelope = self
            .request(method, endpoint)
            .query(&opt.query_pairs())
            .send()
            .await?;

        let next = envelope.continuation().map(|offset| opt.next_page(offset));
        Ok((envelope.data, next))
    }

    /// Collect every item of `endpoint`, starting with the default page size.
    ///
    /// # Errors
    /// Stops at and returns the first failing page.
    pub async fn list_all(&self, endpoint: &str) -> Result<Vec<Value>, KongError> {
        self.list_all_with(endpoint, ListOpt::new().with_size(DEFAULT_PAGE_SIZE))
            .await
    }

    /// Collect every item of `endpoint` using `opt` for the first page.
    ///
    /// # Errors
    /// Stops at and returns the first failing page.
    pub async fn list_all_with(&self, endpoint: &str, opt: ListOpt) -> Result<Vec<Value>, KongError> {
        self.list_all_with_method(Method::GET, endpoint, opt).await
    }

    pub(crate) async fn list_all_with_method(
        &self,
        method: Method,
        endpoint: &str,
        opt: ListOpt,
    ) -> Result<Vec<Value>, KongError> {
        let mut items = Vec::new();
        let mut cursor = Some(opt);
        while let Some(opt) = cursor.take() {
            let (page, next) = self.list_with_method(method.clone(), endpoint, Some(&opt)).await?;
            items.extend(page);
            cursor = next.filter(|next| {
                let repeated = next.offset == opt.offset;
                if repeated {
                    tracing::warn!(endpoint, offset = ?next.offset, "server repeated a page cursor; stopping");
                }
                !repeated
            });
        }
        Ok(items)
    }

    /// Lazily walk `endpoint`, yielding items one at a time.
    ///
    /// Pages are fetched on demand; the stream ends after the first error.
    pub fn list_stream(
        &self,
        endpoint: &str,
        opt: ListOpt,
    ) -> impl Stream<Item = Result<Value, KongError>> + Send + 'static {
        let client = self.clone();
        let endpoint = endpoint.to_owned();
        stream::try_unfold(Some(opt), move |cursor| {
            let client = client.clone();
            let endpoint = endpoint.clone();
            async move {
                let Some(opt) = cursor else {
                    return Ok::<_, KongError>(None);
                };
                let (page, next) = client.list(&endpoint, Some(&opt)).await?;
                let next = next.filter(|next| next.offset != opt.offset);
                Ok(Some((page, next)))
            }
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
        .try_flatten()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_omit_empty_fields() {
        assert!(ListOpt::new().query_pairs().is_empty());

        let opt = ListOpt::new().with_size(10).with_offset("abc");
        assert_eq!(
            opt.query_pairs(),
            vec![
                ("size".to_owned(), "10".to_owned()),
                ("offset".to_owned(), "abc".to_owned())
            ]
        );
    }

    #[test]
    fn test_tags_join_depends_on_match_mode() {
        let all = ListOpt::new().with_tags(["a", "b"], true);
        let any = ListOpt::new().with_tags(["a", "b"], false);
        assert_eq!(all.query_pairs(), vec![("tags".to_owned(), "a,b".to_owned())]);
        assert_eq!(any.query_pairs(), vec![("tags".to_owned(), "a/b".to_owned())]);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let err = ListOpt::new().with_size(0).validate().unwrap_err();
        assert!(matches!(err, KongError::InvalidArgument(_)));
    }

    #[test]
    fn test_continuation_prefers_offset_field() {
        let env: Envelope = serde_json::from_str(
            r#"{"data":[],"next":"/services?offset=from-next","offset":"from-field"}"#,
        )
        .unwrap();
        assert_eq!(env.continuation().as_deref(), Some("from-field"));
    }

    #[test]
    fn test_continuation_parsed_from_next_url() {
        let env: Envelope =
            serde_json::from_str(r#"{"data":[],"next":"/services?size=1&offset=WyJhYmMiXQ%3D%3D"}"#)
                .unwrap();
        assert_eq!(env.continuation().as_deref(), Some("WyJhYmMiXQ=="));
    }

    #[test]
    fn test_no_continuation_when_exhausted() {
        let env: Envelope = serde_json::from_str(r#"{"data":[{"id":"1"}],"next":null}"#).unwrap();
        assert_eq!(env.data.len(), 1);
        assert!(env.continuation().is_none());
    }

    #[test]
    fn test_empty_object_data_is_empty_list() {
        let env: Envelope = serde_json::from_str(r#"{"data":{},"next":null}"#).unwrap();
        assert!(env.data.is_empty());
    }

    #[test]
    fn test_next_page_keeps_size_and_tags() {
        let opt = ListOpt::new().with_size(2).with_tags(["edge"], false);
        let next = opt.next_page("tok".to_owned());
        assert_eq!(next.size, Some(2));
        assert_eq!(next.tags, vec!["edge".to_owned()]);
        assert_eq!(next.offset.as_deref(), Some("tok"));
    }
}
