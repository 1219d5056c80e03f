//! Per-call request options.

use http::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use crate::FailureCause;

/// Query parameters and pass-through headers for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl RequestOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add multiple query parameters.
    pub fn queries<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a header passed through to the dependency.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Override the per-attempt timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Query parameters in insertion order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Per-attempt timeout override.
    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// Append validated headers to `map`, after the defaults already in it.
    pub(crate) fn apply_headers(&self, map: &mut HeaderMap) -> Result<(), FailureCause> {
        for (name, value) in &self.headers {
            let (name, value) = parse_header(name, value)?;
            map.insert(name, value);
        }
        Ok(())
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), FailureCause> {
    let header_name = HeaderName::try_from(name)
        .map_err(|e| FailureCause::InvalidRequest(format!("header name {:?}: {}", name, e)))?;
    let header_value = HeaderValue::try_from(value)
        .map_err(|e| FailureCause::InvalidRequest(format!("header {}: {}", name, e)))?;
    Ok((header_name, header_value))
}
