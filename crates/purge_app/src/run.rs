use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use engine_logging::{engine_info, engine_warn};
use purge_engine::{
    CursorStore, EngineEvent, EngineHandle, EngineParts, FileCursorStore, Governor,
    GovernedTransport, HttpContentSource, HttpDeletionActions, ReqwestTransport, RunEnd,
    StopHandle, Transport,
};

use crate::config::AppConfig;
use crate::report::Reporter;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Wires the HTTP implementations into an engine, runs it on its own thread
/// and prints events until the run ends.
pub fn run(config: &AppConfig) -> Result<RunEnd> {
    let plan = config.plan().context("invalid partition list")?;
    let engine_config = config.engine_config();
    let governor = Governor::new(engine_config.rate_limit);

    let transport = ReqwestTransport::new(config.transport_settings())
        .context("could not set up the HTTP transport")?;
    let transport: Arc<dyn Transport> = Arc::new(GovernedTransport::new(transport, governor.clone()));

    let mut source = HttpContentSource::new(transport.clone(), config.listing_path.clone());
    if let Some(page_size) = config.page_size {
        source = source.with_page_size(page_size);
    }
    let actions = HttpDeletionActions::new(transport).with_items_path(config.items_path.clone());
    let store = FileCursorStore::new(config.cursor_path.clone(), plan.clone());

    match store.load() {
        Ok(Some(state)) if state.running => {
            if state.preserve_window != config.preserve_window() {
                engine_warn!(
                    "resuming with the persisted preserve window of {:?}; the configured one applies to the next fresh run",
                    state.preserve_window
                );
            }
            println!("resuming the interrupted run");
        }
        Ok(_) => println!("starting a fresh run"),
        Err(err) => engine_warn!("cursor at {:?} is unreadable, starting fresh: {err}", store.path()),
    }

    let engine = EngineHandle::new(EngineParts {
        plan,
        source: Box::new(source),
        actions: Arc::new(actions),
        store: Box::new(store),
        governor,
        config: engine_config,
    });
    spawn_interrupt_listener(engine.stop_handle())?;

    engine.start(config.preserve_window());
    let mut reporter = Reporter::default();
    loop {
        let Some(event) = engine.recv_timeout(POLL_INTERVAL) else {
            continue;
        };
        if let Some(line) = reporter.line_for(&event) {
            println!("{line}");
        }
        if let EngineEvent::Finished(end) = event {
            return Ok(end);
        }
    }
}

/// First Ctrl-C stops the run gracefully; a second one exits immediately.
fn spawn_interrupt_listener(stopper: StopHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start the signal listener")?;
    thread::spawn(move || {
        runtime.block_on(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                engine_warn!("could not listen for Ctrl-C; stop is unavailable");
                return;
            }
            engine_info!("interrupt received, stopping");
            println!("stopping after the current step (Ctrl-C again to abort)");
            stopper.stop();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        });
    });
    Ok(())
}
