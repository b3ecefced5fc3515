//! HTTP client wrapper for probe requests and page downloads.
//!
//! This module provides the `HttpClient` struct, shared by the count prober
//! and every page download. Page bodies are streamed straight to disk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::TaskError;
use crate::query::RequestDescriptor;
use crate::user_agent;

/// Returns true for statuses the search API uses to signal success.
///
/// The service treats the whole 200-399 range as success, not just 2xx.
#[must_use]
pub fn is_service_success(status: u16) -> bool {
    (200..=399).contains(&status)
}

/// HTTP client for the search API.
///
/// Created once and cloned into every page task, sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// Outcome of one successful page download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDownload {
    /// Offset of the first record on the page.
    pub start_record: u64,
    /// Final output path.
    pub path: PathBuf,
    /// Bytes written to disk.
    pub bytes: u64,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes between chunks
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = build_client(connect_timeout_secs, read_timeout_secs)
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends a GET request and returns the response without checking status.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the request cannot be completed.
    pub(crate) async fn get(&self, url: &Url) -> Result<reqwest::Response, reqwest::Error> {
        self.client.get(url.clone()).send().await
    }

    /// Downloads one page and writes its body verbatim to
    /// `<output_dir>/<start_record>.xml`.
    ///
    /// The body is streamed chunk by chunk, never held in memory as a whole.
    /// No file is created when the request fails or the status is outside
    /// 200-399. When the stream breaks partway the partial file stays on disk.
    /// When `interrupted` is raised mid-stream the incomplete file is removed
    /// and [`TaskError::Cancelled`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] on transport failure, bad status, disk errors, or
    /// interruption.
    #[instrument(skip(self, descriptor, output_dir, interrupted), fields(start_record = descriptor.start_record()))]
    pub async fn fetch_page(
        &self,
        descriptor: RequestDescriptor,
        output_dir: &Path,
        interrupted: &AtomicBool,
    ) -> Result<PageDownload, TaskError> {
        let shown_url = descriptor.redacted_url();
        if interrupted.load(Ordering::SeqCst) {
            return Err(TaskError::cancelled(shown_url));
        }

        debug!(url = %shown_url, "requesting page");
        let response = self
            .get(descriptor.url())
            .await
            .map_err(|e| TaskError::network(shown_url.as_str(), e))?;

        let status = response.status().as_u16();
        if !is_service_success(status) {
            return Err(TaskError::http_status(shown_url, status));
        }

        let file_path = output_dir.join(descriptor.destination());
        let mut file = File::create(&file_path)
            .await
            .map_err(|e| TaskError::io(file_path.clone(), e))?;

        let stream_result =
            stream_to_file(&mut file, response, &shown_url, &file_path, interrupted).await;
        drop(file);

        match stream_result {
            Ok(bytes) => Ok(PageDownload {
                start_record: descriptor.start_record(),
                path: file_path,
                bytes,
            }),
            Err(e) if e.is_cancelled() => {
                debug!(path = %file_path.display(), "removing incomplete page after interrupt");
                let _ = tokio::fs::remove_file(&file_path).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Streams response body to file, returning bytes written.
///
/// Buffered bytes are flushed on every exit path so a broken stream leaves
/// everything that was received on disk.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    interrupted: &AtomicBool,
) -> Result<u64, TaskError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    let copied = async {
        while let Some(chunk_result) = stream.next().await {
            if interrupted.load(Ordering::SeqCst) {
                return Err(TaskError::cancelled(url));
            }
            let chunk = chunk_result.map_err(|e| TaskError::network(url, e))?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| TaskError::io(file_path.to_path_buf(), e))?;

            bytes_written += chunk.len() as u64;
        }
        Ok::<(), TaskError>(())
    }
    .await;

    let flushed = writer
        .flush()
        .await
        .map_err(|e| TaskError::io(file_path.to_path_buf(), e));

    copied?;
    flushed?;
    Ok(bytes_written)
}

fn build_client(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .read_timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
        .build()
}
