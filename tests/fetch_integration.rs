//! Integration tests for probing, confirmation and page downloads.
//!
//! These tests drive the public library API against a mock search API and
//! check what lands in the output directory.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use soch_core::query::{ApiKey, QueryBuilder};
use soch_core::{
    ConfirmationGate, CountProber, GateError, GateOutcome, GateState, HttpClient, PageEngine,
    ProbeError, ProbeResult, Prompt, RunSummary,
};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

type TestResult = Result<(), Box<dyn std::error::Error>>;

struct Answer(Option<char>);

impl Prompt for Answer {
    fn report(&mut self, _total_hits: u64, _required_pages: u64) -> std::io::Result<()> {
        Ok(())
    }

    fn read_choice(&mut self) -> std::io::Result<Option<char>> {
        Ok(self.0)
    }
}

fn builder_for(server: &MockServer) -> Result<QueryBuilder, Box<dyn std::error::Error>> {
    let endpoint = Url::parse(&format!("{}/ksamsok/api", server.uri()))?;
    Ok(QueryBuilder::new(endpoint, ApiKey::new("test")?))
}

fn page_body(start_record: u64) -> String {
    format!("<result><totalHits>1200</totalHits><records><page start=\"{start_record}\"/></records></result>")
}

async fn mount_probe(server: &MockServer, total: u64) {
    Mock::given(method("GET"))
        .and(path("/ksamsok/api"))
        .and(query_param("hitsPerPage", "1"))
        .and(query_param("startRecord", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<result><totalHits>{total}</totalHits></result>")),
        )
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, start_record: u64, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/ksamsok/api"))
        .and(query_param("hitsPerPage", "500"))
        .and(query_param("startRecord", start_record.to_string()))
        .respond_with(template)
        .expect(1)
        .mount(server)
        .await;
}

fn gate_for(
    server: &MockServer,
    dir: &TempDir,
    concurrency: usize,
) -> Result<ConfirmationGate, Box<dyn std::error::Error>> {
    let builder = builder_for(server)?;
    let client = HttpClient::new();
    let engine = PageEngine::new(client.clone(), builder.clone(), dir.path(), concurrency)?;
    Ok(ConfirmationGate::new(
        CountProber::new(client, builder),
        engine,
        Arc::new(AtomicBool::new(false)),
    ))
}

#[tokio::test]
async fn test_1200_hits_produce_three_offset_named_pages() -> TestResult {
    let mock_server = require_mock_server!();
    mount_probe(&mock_server, 1200).await;
    for start in [0, 500, 1000] {
        mount_page(
            &mock_server,
            start,
            ResponseTemplate::new(200).set_body_string(page_body(start)),
        )
        .await;
    }

    let dir = TempDir::new()?;
    let mut gate = gate_for(&mock_server, &dir, 4)?;
    let outcome = gate.confirm_and_run("*", &mut Answer(Some('y'))).await?;

    let GateOutcome::Completed {
        required_pages,
        stats,
        ..
    } = outcome
    else {
        panic!("expected a completed run");
    };
    assert_eq!(required_pages, 3);
    assert_eq!(stats.completed(), 3);
    assert_eq!(stats.failed(), 0);
    assert!(!stats.was_interrupted());

    let mut names: Vec<String> = std::fs::read_dir(dir.path())?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    names.sort();
    assert_eq!(names, vec!["0.xml", "1000.xml", "500.xml"]);

    for start in [0, 500, 1000] {
        let written = std::fs::read_to_string(dir.path().join(format!("{start}.xml")))?;
        assert_eq!(written, page_body(start), "page {start} must be stored verbatim");
    }
    Ok(())
}

#[tokio::test]
async fn test_failed_page_is_recorded_and_siblings_complete() -> TestResult {
    let mock_server = require_mock_server!();
    mount_probe(&mock_server, 1500).await;
    mount_page(&mock_server, 0, ResponseTemplate::new(200).set_body_string(page_body(0))).await;
    mount_page(&mock_server, 500, ResponseTemplate::new(500)).await;
    mount_page(&mock_server, 1000, ResponseTemplate::new(200).set_body_string(page_body(1000)))
        .await;

    let dir = TempDir::new()?;
    let mut gate = gate_for(&mock_server, &dir, 2)?;
    let outcome = gate.confirm_and_run("*", &mut Answer(Some('y'))).await?;

    let GateOutcome::Completed { stats, .. } = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(stats.completed_offsets(), vec![0, 1000]);
    assert_eq!(stats.failed_offsets(), vec![500]);
    assert!(dir.path().join("0.xml").exists());
    assert!(dir.path().join("1000.xml").exists());
    assert!(
        !dir.path().join("500.xml").exists(),
        "a rejected page must not leave a file"
    );
    assert_eq!(gate.state(), GateState::Done);
    Ok(())
}

#[tokio::test]
async fn test_decline_leaves_directory_empty() -> TestResult {
    let mock_server = require_mock_server!();
    mount_probe(&mock_server, 1200).await;
    Mock::given(method("GET"))
        .and(query_param("hitsPerPage", "500"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new()?;
    let mut gate = gate_for(&mock_server, &dir, 4)?;
    let outcome = gate.confirm_and_run("*", &mut Answer(Some('n'))).await?;

    assert!(matches!(outcome, GateOutcome::Declined { .. }));
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_zero_hits_aborts_without_files() -> TestResult {
    let mock_server = require_mock_server!();
    mount_probe(&mock_server, 0).await;

    let dir = TempDir::new()?;
    let mut gate = gate_for(&mock_server, &dir, 4)?;
    let result = gate.confirm_and_run("*", &mut Answer(Some('y'))).await;

    assert!(matches!(
        result,
        Err(GateError::Probe(ProbeError::NoRecords { .. }))
    ));
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_engine_uses_configured_page_size_for_offsets() -> TestResult {
    let mock_server = require_mock_server!();
    for start in [0u64, 100, 200] {
        Mock::given(method("GET"))
            .and(query_param("hitsPerPage", "100"))
            .and(query_param("startRecord", start.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_body(start)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new()?;
    let engine = PageEngine::new(HttpClient::new(), builder_for(&mock_server)?, dir.path(), 3)?
        .with_page_size(100)?;
    let stats = engine
        .run("geoDataExists=j", 3, Arc::new(AtomicBool::new(false)))
        .await?;

    assert_eq!(stats.completed_offsets(), vec![0, 100, 200]);
    assert!(dir.path().join("200.xml").exists());
    Ok(())
}

#[tokio::test]
async fn test_interrupt_stops_dispatch_and_removes_incomplete_pages() -> TestResult {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(query_param("hitsPerPage", "500"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<result/>")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new()?;
    let engine = PageEngine::new(HttpClient::new(), builder_for(&mock_server)?, dir.path(), 1)?;
    let interrupted = Arc::new(AtomicBool::new(false));

    let trigger = Arc::clone(&interrupted);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(450)).await;
        trigger.store(true, Ordering::SeqCst);
    });

    let stats = engine.run("*", 10, interrupted).await?;

    assert!(stats.was_interrupted());
    assert!(stats.completed() < 10, "dispatch must stop after the interrupt");
    assert_eq!(stats.failed(), 0);

    let completed = stats.completed_offsets();
    for entry in std::fs::read_dir(dir.path())? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        let offset: u64 = name.trim_end_matches(".xml").parse()?;
        assert!(
            completed.contains(&offset),
            "{name} is on disk but was not completed"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_interrupt_after_full_dispatch_aborts_after_grace() -> TestResult {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(query_param("hitsPerPage", "500"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<result/>")
                .set_delay(Duration::from_secs(12)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new()?;
    let engine = PageEngine::new(HttpClient::new(), builder_for(&mock_server)?, dir.path(), 4)?;
    let interrupted = Arc::new(AtomicBool::new(false));

    let trigger = Arc::clone(&interrupted);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.store(true, Ordering::SeqCst);
    });

    let started = Instant::now();
    let stats = engine.run("*", 2, interrupted).await?;
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_secs(10),
        "stalled pages must be aborted after the grace period, took {elapsed:?}"
    );
    assert!(stats.was_interrupted());
    assert_eq!(stats.dispatched_pages(), 2);
    assert_eq!(stats.completed(), 0);
    assert_eq!(stats.failed(), 0);
    assert_eq!(stats.cancelled_offsets(), vec![0, 500]);
    assert_eq!(
        std::fs::read_dir(dir.path())?.count(),
        0,
        "aborted pages must not leave files"
    );
    Ok(())
}

#[tokio::test]
async fn test_interrupt_summary_accounts_for_every_page() -> TestResult {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(query_param("hitsPerPage", "500"))
        .and(query_param("startRecord", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body(0)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("hitsPerPage", "500"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<result/>")
                .set_delay(Duration::from_secs(12)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new()?;
    let engine = PageEngine::new(HttpClient::new(), builder_for(&mock_server)?, dir.path(), 2)?;
    let interrupted = Arc::new(AtomicBool::new(false));

    let trigger = Arc::clone(&interrupted);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.store(true, Ordering::SeqCst);
    });

    let stats = engine.run("*", 6, interrupted).await?;
    let summary = RunSummary::new(
        "*",
        ProbeResult { total_hits: 3000 },
        6,
        500,
        dir.path(),
        &stats,
    );

    assert!(summary.interrupted);
    assert_eq!(summary.completed_offsets, vec![0]);
    assert!(summary.failed_offsets.is_empty());
    // Page 0 frees its slot at once, so pages 500 and 1000 are in flight
    // when the interrupt lands and 1500 onwards is never requested.
    assert_eq!(summary.cancelled_offsets, vec![500, 1000]);
    assert_eq!(summary.undispatched_from, Some(1500));
    assert!(dir.path().join("0.xml").exists());
    assert!(!dir.path().join("500.xml").exists());
    assert!(!dir.path().join("1000.xml").exists());
    Ok(())
}
