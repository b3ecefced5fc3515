//! Total hit count lookup for a filter expression.
//!
//! The prober issues one minimal request (`hitsPerPage=1`, `startRecord=0`)
//! and reads the `<totalHits>` element from the response. The count is a
//! snapshot: the index behind the service may change before the pages are
//! fetched, and nothing here re-probes to correct for that.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::download::{HttpClient, is_service_success, required_pages};
use crate::query::{Query, QueryBuilder};

#[allow(clippy::expect_used)]
static TOTAL_HITS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<totalHits>\s*(\d+)\s*</totalHits>").expect("totalHits regex is valid") // Static pattern, safe to panic
});

/// Errors that abort a run before any page is requested.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Network-level error reaching the service.
    #[error("network error probing {url}: {source}")]
    Network {
        /// The redacted probe URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Probe request timed out.
    #[error("timeout probing {url}")]
    Timeout {
        /// The redacted probe URL.
        url: String,
    },

    /// Status outside the service's 200-399 success range.
    #[error("SOCH returned an error (HTTP {status})\n{url}")]
    Status {
        /// The redacted probe URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response carried no parsable `<totalHits>` element.
    #[error("SOCH response has no readable total hit count\n{url}")]
    MissingCount {
        /// The redacted probe URL.
        url: String,
    },

    /// The filter matched nothing.
    #[error("SOCH returned zero records\n{url}")]
    NoRecords {
        /// The redacted probe URL.
        url: String,
    },
}

impl ProbeError {
    fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }
}

/// Total hit count reported by the service at probe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    /// Number of matching records. Always greater than zero.
    pub total_hits: u64,
}

impl ProbeResult {
    /// Pages needed to cover all hits at `page_size` records per page.
    #[must_use]
    pub fn required_pages(&self, page_size: u32) -> u64 {
        required_pages(self.total_hits, page_size)
    }
}

/// Looks up the total hit count for a filter.
#[derive(Debug, Clone)]
pub struct CountProber {
    client: HttpClient,
    builder: QueryBuilder,
}

impl CountProber {
    /// Creates a prober sharing `client` and `builder` with the page downloads.
    #[must_use]
    pub fn new(client: HttpClient, builder: QueryBuilder) -> Self {
        Self { client, builder }
    }

    /// Issues one probe request for `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] on transport failure, a status outside 200-399,
    /// a missing or unparsable `<totalHits>`, or a count of zero.
    #[instrument(skip(self))]
    pub async fn probe(&self, filter: &str) -> Result<ProbeResult, ProbeError> {
        let descriptor = self.builder.build(&Query::new(filter, 1, 0));
        let url = descriptor.redacted_url();
        debug!(url = %url, "probing total hit count");

        let response = self
            .client
            .get(descriptor.url())
            .await
            .map_err(|e| ProbeError::network(url.as_str(), e))?;

        let status = response.status().as_u16();
        if !is_service_success(status) {
            return Err(ProbeError::Status { url, status });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::network(url.as_str(), e))?;

        let total_hits =
            parse_total_hits(&body).ok_or_else(|| ProbeError::MissingCount { url: url.clone() })?;
        if total_hits == 0 {
            return Err(ProbeError::NoRecords { url });
        }

        info!(total_hits, "probe complete");
        Ok(ProbeResult { total_hits })
    }
}

/// Extracts the first `<totalHits>` value from a response body.
#[must_use]
pub fn parse_total_hits(body: &str) -> Option<u64> {
    TOTAL_HITS_PATTERN
        .captures(body)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
