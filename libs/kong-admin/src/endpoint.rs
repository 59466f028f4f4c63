//! URL composition.
//!
//! Every request URL has the shape
//! `root [ "/" workspace ] endpoint [ "?" query ]`, where the query is the
//! caller's form-urlencoded pairs followed by the configured `cluster.id`.

use std::borrow::Cow;

use url::Url;
use url::form_urlencoded;

use crate::config::CLUSTER_ID_PARAM;
use crate::error::KongError;

/// Validated Admin API root with no trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootUrl(String);

impl RootUrl {
    /// Parse and normalize a root URL.
    ///
    /// # Errors
    /// Returns [`KongError::InvalidUrl`] unless `raw` is an absolute
    /// `http`/`https` URL without query or fragment.
    pub fn parse(raw: &str) -> Result<Self, KongError> {
        let invalid = |reason: &str| KongError::InvalidUrl {
            url: raw.to_owned(),
            reason: reason.to_owned(),
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("root URL cannot carry a query or fragment"));
        }

        Ok(Self(url.as_str().trim_end_matches('/').to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base URL for `workspace`; the empty workspace yields the root itself.
    #[must_use]
    pub fn with_workspace(&self, workspace: &str) -> String {
        if workspace.is_empty() {
            self.0.clone()
        } else {
            format!("{}/{}", self.0, segment(workspace))
        }
    }
}

impl std::fmt::Display for RootUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Percent-encode one path segment (an identifier or a workspace name).
#[must_use]
pub fn segment(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw)
}

/// Join `base` and `endpoint` and append the encoded query.
///
/// A query already present on `endpoint` is kept and merged with `query`.
/// Any caller-supplied `cluster.id` is dropped; when `cluster_id` is set it
/// is appended exactly once as the last pair.
///
/// # Errors
/// Returns [`KongError::InvalidArgument`] if `endpoint` does not start with `/`.
pub fn compose(
    base: &str,
    endpoint: &str,
    query: &[(String, String)],
    cluster_id: Option<&str>,
) -> Result<String, KongError> {
    if !endpoint.starts_with('/') {
        return Err(KongError::invalid_argument(format!(
            "endpoint '{endpoint}' must start with '/'"
        )));
    }

    let (path, inline_query) = match endpoint.split_once('?') {
        Some((path, qs)) => (path, Some(qs)),
        None => (endpoint, None),
    };

    let mut qs = form_urlencoded::Serializer::new(String::new());
    let mut pairs = 0usize;
    let inline = inline_query
        .map(|qs| form_urlencoded::parse(qs.as_bytes()).into_owned().collect::<Vec<_>>())
        .unwrap_or_default();
    for (name, value) in inline.iter().chain(query) {
        if name == CLUSTER_ID_PARAM {
            continue;
        }
        qs.append_pair(name, value);
        pairs += 1;
    }
    if let Some(id) = cluster_id {
        qs.append_pair(CLUSTER_ID_PARAM, id);
        pairs += 1;
    }

    let mut url = String::with_capacity(base.len() + endpoint.len() + 64);
    url.push_str(base);
    url.push_str(path);
    if pairs > 0 {
        url.push('?');
        url.push_str(&qs.finish());
    }
    Ok(url)
}

/// Decode a form-urlencoded query string into owned pairs.
pub(crate) fn parse_query(qs: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(qs.as_bytes()).into_owned().collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CLUSTER_ID;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_root_is_normalized_without_trailing_slash() {
        assert_eq!(
            RootUrl::parse("http://localhost:8001/").unwrap().as_str(),
            "http://localhost:8001"
        );
        assert_eq!(
            RootUrl::parse("https://gw.example.com/admin-api/").unwrap().as_str(),
            "https://gw.example.com/admin-api"
        );
    }

    #[test]
    fn test_root_rejects_relative_and_odd_urls() {
        for raw in ["localhost:8001/x", "/admin", "ftp://kong:21", "http://kong:8001/?a=b", ""] {
            let err = RootUrl::parse(raw).unwrap_err();
            assert!(matches!(err, KongError::InvalidUrl { .. }), "{raw}: {err:?}");
        }
    }

    #[test]
    fn test_workspace_joins_with_single_slash() {
        let root = RootUrl::parse("http://localhost:8001").unwrap();
        assert_eq!(root.with_workspace(""), "http://localhost:8001");
        assert_eq!(root.with_workspace("ws1"), "http://localhost:8001/ws1");
    }

    #[test]
    fn test_compose_appends_cluster_id_after_caller_query() {
        let url = compose(
            "http://localhost:8001",
            "/services",
            &pairs(&[("size", "10"), ("tags", "a,b")]),
            Some(DEFAULT_CLUSTER_ID),
        )
        .unwrap();
        assert_eq!(
            url,
            format!("http://localhost:8001/services?size=10&tags=a%2Cb&cluster.id={DEFAULT_CLUSTER_ID}")
        );
    }

    #[test]
    fn test_compose_caller_cannot_override_cluster_id() {
        let url = compose(
            "http://localhost:8001",
            "/status?cluster.id=mine",
            &pairs(&[("cluster.id", "other")]),
            Some(DEFAULT_CLUSTER_ID),
        )
        .unwrap();
        assert_eq!(url.matches("cluster.id=").count(), 1);
        assert!(url.ends_with(&format!("cluster.id={DEFAULT_CLUSTER_ID}")));
    }

    #[test]
    fn test_compose_without_query_or_cluster_id() {
        let url = compose("http://kong:8001/ws1", "/routes", &[], None).unwrap();
        assert_eq!(url, "http://kong:8001/ws1/routes");
    }

    #[test]
    fn test_compose_keeps_inline_query() {
        let url = compose("http://kong:8001", "/config?check_hash=1", &[], None).unwrap();
        assert_eq!(url, "http://kong:8001/config?check_hash=1");
    }

    #[test]
    fn test_compose_requires_leading_slash() {
        let err = compose("http://kong:8001", "services", &[], None).unwrap_err();
        assert!(matches!(err, KongError::InvalidArgument(_)));
    }

    #[test]
    fn test_segment_escapes_reserved_characters() {
        assert_eq!(segment("s1"), "s1");
        assert_eq!(segment("a b/c"), "a%20b%2Fc");
    }
}
