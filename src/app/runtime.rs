use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use soch_core::{
    Action, ApiKey, AutoConfirm, ConfirmationGate, CountProber, FetchStats, GateOutcome,
    HttpClient, PageEngine, Prompt, QueryBuilder, RunSummary, TerminalPrompt, output_dir,
};
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{config_manager, exit_handler, progress_manager, report, terminal};
use crate::cli::Args;

pub(crate) async fn run_soch_download() -> Result<ProcessExit> {
    let args = Args::parse();

    let no_color = terminal::is_no_color_requested(&args);
    terminal::init_tracing(args.default_log_level(), no_color);
    debug!(action = %args.action, yes = args.yes, "CLI arguments parsed");

    let settings = config_manager::resolve_settings(&args)?;

    info!("Validating arguments...");
    let api_key = ApiKey::new(settings.api_key.clone()).context("Bad API key")?;
    let action: Action = args.action.parse()?;
    let filter = action.filter_expression(args.institution.as_deref(), args.query.as_deref())?;
    output_dir::prepare(&settings.output_dir)?;

    let client =
        HttpClient::new_with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs);
    let builder = QueryBuilder::new(settings.endpoint.clone(), api_key);
    let prober = CountProber::new(client.clone(), builder.clone());
    let engine = PageEngine::new(
        client,
        builder,
        settings.output_dir.clone(),
        settings.concurrency,
    )?
    .with_page_size(settings.page_size)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let mut gate = ConfirmationGate::new(prober, engine, Arc::clone(&interrupted));
    spawn_interrupt_listener(Arc::clone(&interrupted), gate.stats());

    let show_progress = terminal::should_show_progress(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) =
        progress_manager::spawn_progress_ui(show_progress, gate.stats());

    info!(action = %action, filter = %filter, "Fetching query data and calculating requirements...");
    let mut prompt: Box<dyn Prompt> = if args.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(TerminalPrompt::stdio())
    };
    let result = gate.confirm_and_run(&filter, prompt.as_mut()).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    match result? {
        GateOutcome::Declined { .. } => {
            info!("Download declined, nothing fetched");
            Ok(ProcessExit::Success)
        }
        GateOutcome::Completed {
            probe,
            required_pages,
            stats,
        } => {
            report::print_completion_summary(&stats, required_pages)?;

            if let Some(path) = args.summary.as_deref() {
                RunSummary::new(
                    &filter,
                    probe,
                    required_pages,
                    settings.page_size,
                    &settings.output_dir,
                    &stats,
                )
                .write_to(path)?;
            }

            let interrupted = stats.was_interrupted() || interrupted.load(Ordering::SeqCst);
            if interrupted {
                warn!(
                    completed = stats.completed(),
                    required_pages, "Interrupted before all pages were downloaded"
                );
            }
            Ok(exit_handler::determine_exit_outcome(
                stats.completed(),
                stats.failed(),
                interrupted,
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Nothing has been requested yet, or this is the second Ctrl+C.
    ExitNow,
    /// Stop dispatching and let in-flight pages settle.
    StopDispatch,
}

fn interrupt_action(downloads_started: bool, already_interrupted: bool) -> InterruptAction {
    if downloads_started && !already_interrupted {
        InterruptAction::StopDispatch
    } else {
        InterruptAction::ExitNow
    }
}

/// Ctrl+C during the probe or the prompt exits at once. Once pages are
/// running the first Ctrl+C stops dispatch and a second one exits.
fn spawn_interrupt_listener(interrupted: Arc<AtomicBool>, stats: Arc<FetchStats>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            let downloads_started = stats.planned_pages() > 0;
            let already_interrupted = interrupted.swap(true, Ordering::SeqCst);
            match interrupt_action(downloads_started, already_interrupted) {
                InterruptAction::ExitNow => {
                    if !downloads_started {
                        warn!("Interrupted before any page was requested");
                    }
                    std::process::exit(ProcessExit::Failure.code().into());
                }
                InterruptAction::StopDispatch => warn!(
                    "Interrupt received, finishing in-flight pages (Ctrl+C again to exit now)"
                ),
            }
        }
    });
}
