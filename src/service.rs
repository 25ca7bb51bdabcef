//! Lifecycle orchestration: one streaming session feeding the broadcaster.

use crate::broadcast::Broadcaster;
use crate::config::{ProcessFilter, ServiceConfig};
use crate::error::{Error, Result};
use crate::source::{LiveSource, LogSource};
use crate::stream::Subscription;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

static GLOBAL: OnceLock<LogService> = OnceLock::new();

/// Whether a streaming session is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Streaming,
}

/// Session-level notifications, emitted once per transition.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The stream process was spawned.
    Started { pid: Option<u32> },
    /// The session was stopped by [`LogService::stop`].
    Stopped,
    /// The session ended on its own: [`Error::StreamEnded`] when the process
    /// closed its output, any other error when reading failed.
    Ended(Arc<Error>),
}

struct Session {
    /// Set once by whichever side ends the session first: `stop` or the
    /// session task on end of stream. The winner emits the terminal event.
    done: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    pid: Option<u32>,
}

/// Spawns the log command, pumps its lines into a [`Broadcaster`] and exposes
/// snapshot, clear and subscription operations.
pub struct LogService {
    source: LogSource,
    broadcaster: Broadcaster,
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl LogService {
    pub fn new(config: ServiceConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            source: LogSource::new(config.command, config.terminate_timeout),
            broadcaster: Broadcaster::new(config.subscriber_capacity),
            session: Mutex::new(None),
            events,
        }
    }

    /// Creates the process-wide instance. The first call wins; later calls
    /// return the existing instance and ignore `config`.
    ///
    /// Call [`LogService::stop`] before exiting so the child process is
    /// released promptly.
    pub fn install(config: ServiceConfig) -> &'static LogService {
        GLOBAL.get_or_init(|| LogService::new(config))
    }

    /// The process-wide instance, if [`LogService::install`] has run.
    pub fn global() -> Option<&'static LogService> {
        GLOBAL.get()
    }

    /// Spawn the stream process and start broadcasting its lines.
    ///
    /// Fails with [`Error::AlreadyRunning`] while a session is active; the
    /// running session is left untouched. A spawn failure leaves the service
    /// idle.
    pub async fn start(&self, filter: Option<ProcessFilter>) -> Result<()> {
        self.start_with(|| self.source.start_streaming(filter)).await
    }

    async fn start_with<F>(&self, spawn: F) -> Result<()>
    where
        F: FnOnce() -> Result<LiveSource>,
    {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            if !session.done.load(Ordering::Acquire) {
                warn!("Log stream already running (pid {:?})", session.pid);
                return Err(Error::AlreadyRunning);
            }
        }
        if let Some(finished) = slot.take() {
            debug!("Reaping finished session (pid {:?})", finished.pid);
            let _ = finished.task.await;
        }

        let live = spawn()?;
        let pid = live.pid();
        let done = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let _ = self.events.send(SessionEvent::Started { pid });

        let task = tokio::spawn(run_session(
            live,
            self.broadcaster.clone(),
            done.clone(),
            cancel.clone(),
            self.events.clone(),
        ));
        *slot = Some(Session {
            done,
            cancel,
            task,
            pid,
        });
        Ok(())
    }

    /// Cancel the session and terminate its process. A no-op when idle.
    ///
    /// Subscribers stay registered for the next session.
    pub async fn stop(&self) -> Result<()> {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.take() else {
            debug!("Stop requested while idle");
            return Ok(());
        };

        let was_running = !session.done.swap(true, Ordering::AcqRel);
        session.cancel.cancel();
        if let Err(e) = session.task.await {
            error!("Log session task failed: {}", e);
        }

        if was_running {
            info!("Log stream stopped (pid {:?})", session.pid);
            let _ = self.events.send(SessionEvent::Stopped);
        }
        Ok(())
    }

    /// One-shot dump; does not touch the streaming session.
    pub async fn snapshot(&self, filter: Option<ProcessFilter>) -> Result<Vec<String>> {
        self.source.snapshot(filter).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.source.clear().await
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.broadcaster.unsubscribe(subscription)
    }

    /// Receiver for session events emitted from now on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> ServiceState {
        match self.session.lock().await.as_ref() {
            Some(session) if !session.done.load(Ordering::Acquire) => ServiceState::Streaming,
            _ => ServiceState::Idle,
        }
    }

    pub async fn is_streaming(&self) -> bool {
        self.state().await == ServiceState::Streaming
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }
}

impl Drop for LogService {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut() {
            session.cancel.cancel();
        }
    }
}

/// Background task for one session: pump lines, then tear the process down.
///
/// `Ended` is only emitted if the task claims `done` before `stop` does.
async fn run_session(
    mut live: LiveSource,
    broadcaster: Broadcaster,
    done: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: broadcast::Sender<SessionEvent>,
) {
    let ended = pump_lines(&mut live, &broadcaster, &cancel).await;
    // A concurrent `stop` that claimed the session first reports `Stopped`.
    let error = match ended {
        Some(error) if !done.swap(true, Ordering::AcqRel) => error,
        _ => {
            debug!("Log session cancelled (pid {:?})", live.pid());
            if let Err(e) = live.terminate().await {
                warn!("Failed to terminate log process: {}", e);
            }
            return;
        }
    };

    let error = match error {
        Error::StreamEnded { .. } => {
            let code = live.wait_exit().await.unwrap_or_else(|e| {
                warn!("Failed to reap log process: {}", e);
                None
            });
            info!("Log stream ended (pid {:?}, exit code {:?})", live.pid(), code);
            Error::StreamEnded { code }
        }
        error => {
            error!("Log stream failed (pid {:?}): {}", live.pid(), error);
            if let Err(e) = live.terminate().await {
                warn!("Failed to terminate log process: {}", e);
            }
            error
        }
    };

    cancel.cancel();
    let _ = events.send(SessionEvent::Ended(Arc::new(error)));
}

/// Read and publish until cancelled (`None`) or the stream stops (`Some`).
async fn pump_lines(
    live: &mut LiveSource,
    broadcaster: &Broadcaster,
    cancel: &CancellationToken,
) -> Option<Error> {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            next = live.next_line() => next,
        };

        match next {
            Ok(Some(line)) => {
                trace!("log line: {}", line);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return None,
                    _ = broadcaster.publish(line) => {}
                }
            }
            Ok(None) => return Some(Error::StreamEnded { code: None }),
            Err(e) => return Some(e),
        }
    }
}
