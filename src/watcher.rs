use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use crate::config::WatchConfig;
use crate::diff::DiffEngine;
use crate::error::{Result, WatchError};
use crate::events::{ChangeEvent, ChangeKind};
use crate::filter::PathFilter;
use crate::fs::{Filesystem, LocalFilesystem};

/// Receives one batch of events per tick that found changes.
///
/// Ticks with nothing to report are not delivered, so a handler is not called
/// once per interval. The polling loop waits for `handle_events` to return
/// before it starts the next interval. Returning an error stops the loop; the error is reported by
/// [`PollingWatcher::stop`].
pub trait EventHandler: Send + 'static {
    fn handle_events(&mut self, batch: &[ChangeEvent]) -> anyhow::Result<()>;
}

impl<F> EventHandler for F
where
    F: FnMut(&[ChangeEvent]) -> anyhow::Result<()> + Send + 'static,
{
    fn handle_events(&mut self, batch: &[ChangeEvent]) -> anyhow::Result<()> {
        (self)(batch)
    }
}

/// Forwards batches to a channel, for consumers that process them elsewhere.
impl EventHandler for Sender<Vec<ChangeEvent>> {
    fn handle_events(&mut self, batch: &[ChangeEvent]) -> anyhow::Result<()> {
        self.send(batch.to_vec())
            .map_err(|_| anyhow::anyhow!("Event receiver disconnected"))
    }
}

struct Worker<H> {
    cancel: Sender<()>,
    handle: JoinHandle<(H, Result<()>)>,
}

enum State<H> {
    Idle(H),
    Running(Worker<H>),
    /// The handler went down with a panicking worker.
    Poisoned,
}

/// Polls a directory on a background thread and reports changes.
///
/// Each `start` builds a fresh baseline; nothing carries over from a previous
/// run. Dropping the watcher stops it.
pub struct PollingWatcher<H: EventHandler, F: Filesystem + Clone = LocalFilesystem> {
    config: WatchConfig,
    filter: PathFilter,
    fs: F,
    state: State<H>,
}

impl<H: EventHandler> PollingWatcher<H, LocalFilesystem> {
    pub fn new(config: WatchConfig, handler: H) -> Result<Self> {
        let fs = LocalFilesystem::new().respecting_ignore_files(config.respect_ignore_files);
        Self::with_filesystem(config, fs, handler)
    }
}

impl<H: EventHandler, F: Filesystem + Clone> PollingWatcher<H, F> {
    /// Validate `config` against `fs`. Invalid roots, intervals and filter
    /// patterns are rejected here.
    pub fn with_filesystem(config: WatchConfig, fs: F, handler: H) -> Result<Self> {
        let filter = config.checked_filter(&fs)?;
        Ok(Self {
            config,
            filter,
            fs,
            state: State::Idle(handler),
        })
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        matches!(&self.state, State::Running(worker) if !worker.handle.is_finished())
    }

    /// Start polling. Does nothing if already running.
    ///
    /// The baseline is built before this returns, so any file written
    /// afterwards is reported as created.
    ///
    /// If the previous run ended because the handler failed, that error is
    /// returned and the watcher stays idle.
    pub fn start(&mut self) -> Result<()> {
        self.reap_finished()?;
        match self.state {
            State::Running(_) => return Ok(()),
            State::Poisoned => return Err(WatchError::HandlerUnavailable),
            State::Idle(_) => {}
        }

        if !self.fs.is_dir(&self.config.root) {
            return Err(WatchError::InvalidRoot(self.config.root.clone()));
        }

        let State::Idle(handler) = std::mem::replace(&mut self.state, State::Poisoned) else {
            return Err(WatchError::HandlerUnavailable);
        };

        let engine = DiffEngine::with_filter(self.fs.clone(), &self.config, self.filter.clone());
        let (cancel, cancel_rx) = mpsc::channel();
        let config = self.config.clone();

        let handle = thread::Builder::new()
            .name(String::from("pollwatch"))
            .spawn(move || run(engine, config, handler, cancel_rx))
            .map_err(WatchError::Spawn)?;

        tracing::info!(
            "Polling {} every {:?} (recursive: {})",
            self.config.root.display(),
            self.config.interval(),
            self.config.recursive
        );
        self.state = State::Running(Worker { cancel, handle });
        Ok(())
    }

    /// Stop polling and wait for the loop to exit.
    ///
    /// A tick in progress finishes, including its handler call; no handler
    /// call happens after this returns. Does nothing if not running.
    pub fn stop(&mut self) -> Result<()> {
        let worker = match std::mem::replace(&mut self.state, State::Poisoned) {
            State::Running(worker) => worker,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        // Fails only if the loop already exited on its own
        let _ = worker.cancel.send(());

        match worker.handle.join() {
            Ok((handler, outcome)) => {
                self.state = State::Idle(handler);
                tracing::info!("Stopped polling {}", self.config.root.display());
                outcome
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    fn reap_finished(&mut self) -> Result<()> {
        let finished = matches!(&self.state, State::Running(worker) if worker.handle.is_finished());
        if finished {
            self.stop()
        } else {
            Ok(())
        }
    }
}

impl<H: EventHandler, F: Filesystem + Clone> Drop for PollingWatcher<H, F> {
    fn drop(&mut self) {
        if let State::Running(worker) = std::mem::replace(&mut self.state, State::Poisoned) {
            let _ = worker.cancel.send(());
            match worker.handle.join() {
                Ok((_, Err(err))) => tracing::warn!("Polling loop ended with error: {}", err),
                Ok(_) => {}
                Err(_) => tracing::error!("Polling thread panicked"),
            }
        }
    }
}

fn run<H: EventHandler, F: Filesystem>(
    engine: DiffEngine<F>,
    config: WatchConfig,
    mut handler: H,
    cancel: Receiver<()>,
) -> (H, Result<()>) {
    let outcome = poll(engine, &config, &mut handler, &cancel);
    if let Err(err) = &outcome {
        tracing::error!("Polling {} stopped: {}", config.root.display(), err);
    }
    (handler, outcome)
}

fn poll<H: EventHandler, F: Filesystem>(
    mut engine: DiffEngine<F>,
    config: &WatchConfig,
    handler: &mut H,
    cancel: &Receiver<()>,
) -> Result<()> {
    if config.emit_initial {
        let initial = engine.baseline_events();
        if !initial.is_empty() {
            handler.handle_events(&initial).map_err(WatchError::Handler)?;
        }
    }

    loop {
        match cancel.recv_timeout(config.interval()) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }

        let batch = engine.tick();
        if batch.is_empty() {
            tracing::trace!("No changes under {}", config.root.display());
            continue;
        }

        tracing::debug!(
            "Tick: {} created, {} deleted, {} modified ({} files known)",
            count(&batch, ChangeKind::Created),
            count(&batch, ChangeKind::Deleted),
            batch.iter().filter(|e| e.kind.is_modification()).count(),
            engine.known_files()
        );

        handler.handle_events(&batch).map_err(WatchError::Handler)?;
    }
}

fn count(batch: &[ChangeEvent], kind: ChangeKind) -> usize {
    batch.iter().filter(|e| e.kind == kind).count()
}
