use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_error, engine_info};
use tokio_util::sync::CancellationToken;

use crate::{ChannelProgressSink, Controller, EngineEvent, EngineParts};

enum EngineCommand {
    Start {
        preserve_window: Duration,
        cancel: CancellationToken,
    },
}

/// Stops the run in progress. Cheap to clone and safe to call from any
/// thread, including a signal handler task.
#[derive(Clone, Default)]
pub struct StopHandle {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl StopHandle {
    /// Requests a stop. Calling it with no run in progress does nothing.
    pub fn stop(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = current.as_ref() {
            if !token.is_cancelled() {
                engine_info!("stop requested by operator");
                token.cancel();
            }
        }
    }

    /// Token for the next start. A token that has not been cancelled is
    /// reused, so a start issued while a run is active stays stoppable by the
    /// same `stop`.
    fn arm(&self) -> CancellationToken {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(token) if !token.is_cancelled() => token.clone(),
            _ => {
                let token = CancellationToken::new();
                *current = Some(token.clone());
                token
            }
        }
    }
}

/// Runs the controller on a dedicated thread with its own tokio runtime and
/// reports back through a channel, so a synchronous front end can poll it.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    stopper: StopHandle,
}

impl EngineHandle {
    pub fn new(parts: EngineParts) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let sink = Arc::new(ChannelProgressSink::new(event_tx));

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    engine_error!("could not start engine runtime: {err}");
                    return;
                }
            };
            let governor = parts.governor.clone().with_sink(sink.clone());
            let mut controller = Controller::new(EngineParts { governor, ..parts }, sink);
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Start {
                        preserve_window,
                        cancel,
                    } => {
                        runtime.block_on(controller.run(preserve_window, &cancel));
                    }
                }
            }
        });

        Self {
            cmd_tx,
            event_rx,
            stopper: StopHandle::default(),
        }
    }

    /// Starts a run, or resumes the persisted one if its cursor says it was
    /// still running.
    pub fn start(&self, preserve_window: Duration) {
        let cancel = self.stopper.arm();
        let _ = self.cmd_tx.send(EngineCommand::Start {
            preserve_window,
            cancel,
        });
    }

    pub fn stop(&self) {
        self.stopper.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stopper.clone()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}
