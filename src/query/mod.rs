//! Request construction for the K-samsok search API.
//!
//! A [`Query`] (filter expression plus pagination) is resolved by a
//! [`QueryBuilder`] into a transport-ready [`RequestDescriptor`]. Building is
//! pure: no I/O, no validation of the filter grammar, which is owned by the
//! remote service.
//!
//! # Example
//!
//! ```
//! use soch_core::query::{ApiKey, Query, QueryBuilder};
//!
//! let builder = QueryBuilder::with_default_endpoint(ApiKey::new("test").unwrap());
//! let descriptor = builder.build(&Query::new("*", 500, 1000));
//! assert_eq!(descriptor.destination(), "1000.xml");
//! ```

mod action;
mod api_key;

use std::fmt;

use url::Url;

pub use action::Action;
pub use api_key::{ApiKey, AuthError, DEFAULT_API_KEY};

/// Search endpoint of the K-samsok API.
pub const DEFAULT_ENDPOINT: &str = "http://www.kulturarvsdata.se/ksamsok/api";

/// Records requested per page. 500 is the largest page the service serves.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Upper bound accepted for a configured page size.
pub const MAX_PAGE_SIZE: u32 = 500;

/// File extension of stored pages; the service answers in XML.
pub const PAGE_EXTENSION: &str = "xml";

/// One logical search request: filter plus pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Opaque filter expression in the service's query grammar.
    pub filter: String,
    /// Records per page (`hitsPerPage`).
    pub page_size: u32,
    /// Zero-based offset of the first record (`startRecord`).
    pub start_record: u64,
}

impl Query {
    /// Creates a query for one page of results.
    pub fn new(filter: impl Into<String>, page_size: u32, start_record: u64) -> Self {
        Self {
            filter: filter.into(),
            page_size,
            start_record,
        }
    }
}

/// Fully resolved request for a single page.
///
/// Immutable once built; the download task that consumes it takes ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    url: Url,
    start_record: u64,
}

impl RequestDescriptor {
    /// Request URL including the API key and all query parameters.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Offset of the first record this request returns.
    #[must_use]
    pub fn start_record(&self) -> u64 {
        self.start_record
    }

    /// File name this page is stored under.
    #[must_use]
    pub fn destination(&self) -> String {
        destination_for(self.start_record)
    }

    /// URL with the API key masked, for logs and error messages.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        redact_api_key(&self.url)
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted_url())
    }
}

/// Returns the destination file name for a page starting at `start_record`.
///
/// The name depends on nothing but the offset, so identical runs produce
/// identical file sets and distinct offsets never collide.
#[must_use]
pub fn destination_for(start_record: u64) -> String {
    format!("{start_record}.{PAGE_EXTENSION}")
}

/// Builds [`RequestDescriptor`]s against a fixed endpoint with a fixed key.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    endpoint: Url,
    api_key: ApiKey,
}

impl QueryBuilder {
    /// Creates a builder for `endpoint`, embedding `api_key` in every request.
    #[must_use]
    pub fn new(endpoint: Url, api_key: ApiKey) -> Self {
        Self { endpoint, api_key }
    }

    /// Creates a builder for the public K-samsok endpoint.
    ///
    /// # Panics
    ///
    /// Never in practice: [`DEFAULT_ENDPOINT`] is a valid static URL.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_default_endpoint(api_key: ApiKey) -> Self {
        let endpoint = Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL");
        Self::new(endpoint, api_key)
    }

    /// Endpoint requests are built against.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Resolves `query` into a request descriptor.
    ///
    /// Any existing query string on the endpoint is replaced.
    #[must_use]
    pub fn build(&self, query: &Query) -> RequestDescriptor {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("x-api", self.api_key.as_str())
            .append_pair("method", "search")
            .append_pair("query", &query.filter)
            .append_pair("hitsPerPage", &query.page_size.to_string())
            .append_pair("startRecord", &query.start_record.to_string());

        RequestDescriptor {
            url,
            start_record: query.start_record,
        }
    }
}

fn redact_api_key(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "x-api" {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
