use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::config::AutosaveConfig;
use super::debouncer::{Completion, Debouncer};
use super::status::SaveStatus;
use super::target::SaveTarget;
use crate::error::SaveError;
use crate::msg::Msg;

/// How long `Saved` stays visible before the status drops back to `Idle`.
pub const DEFAULT_FEEDBACK_WINDOW: Duration = Duration::from_millis(1500);

/// The component the autosave interface mounts into a host.
///
/// Joins a [`Debouncer`] to the host event loop: timers are checked on
/// `tick`, saves run on a worker thread, and their results come back through
/// the host's channel as [`Msg::SaveFinished`].
pub struct AutosaveComponent<S, T> {
    debouncer: Debouncer<S>,
    target: Arc<T>,
    events: mpsc::Sender<Msg>,
    feedback_window: Duration,
    /// Worker of the save in flight; cleared once its result is applied.
    worker: Option<JoinHandle<Result<(), SaveError>>>,
}

impl<S, T> AutosaveComponent<S, T>
where
    S: Send + 'static,
    T: SaveTarget<S>,
{
    pub fn mount(config: AutosaveConfig, target: T, events: mpsc::Sender<Msg>) -> Self {
        tracing::info!(frequency_ms = config.frequency_ms() as u64, "autosave mounted");
        Self {
            debouncer: Debouncer::new(config),
            target: Arc::new(target),
            events,
            feedback_window: DEFAULT_FEEDBACK_WINDOW,
            worker: None,
        }
    }

    pub fn with_feedback_window(mut self, window: Duration) -> Self {
        self.feedback_window = window;
        self
    }

    pub fn set_feedback_window(&mut self, window: Duration) {
        self.feedback_window = window;
    }

    pub fn feedback_window(&self) -> Duration {
        self.feedback_window
    }

    pub fn status(&self) -> &SaveStatus {
        self.debouncer.status()
    }

    pub fn frequency(&self) -> Duration {
        self.debouncer.frequency()
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn is_saving(&self) -> bool {
        *self.debouncer.status() == SaveStatus::Saving
    }

    pub fn on_edit(&mut self, state: S, now: Instant) {
        self.debouncer.record_edit(state, now);
    }

    pub fn tick(&mut self, now: Instant) {
        self.debouncer.settle_feedback(now, self.feedback_window);
        if let Some(state) = self.debouncer.poll(now) {
            self.spawn_save(state);
        }
    }

    /// Save `state` without waiting for the debounce window. While a save is
    /// in flight this only queues a follow-up.
    pub fn save_now(&mut self, state: S, now: Instant) {
        self.debouncer.record_edit(state, now);
        if let Some(state) = self.debouncer.flush(now) {
            self.spawn_save(state);
        }
    }

    pub fn reconfigure(&mut self, config: AutosaveConfig) {
        self.debouncer.reconfigure(config);
    }

    /// Apply a save result. Returns a message for the host's notification
    /// area when there is something to report.
    pub fn on_save_finished(
        &mut self,
        result: Result<(), SaveError>,
        now: Instant,
    ) -> Option<String> {
        // The worker has already sent its result, so it is done.
        self.worker = None;
        let failure = result.as_ref().err().map(ToString::to_string);

        match self.debouncer.complete(result, now) {
            Completion::Discarded => None,
            Completion::Rearmed => failure.map(|err| format!("autosave: {err} (retrying with newer edits)")),
            Completion::Settled => failure.map(|err| format!("autosave: {err}")),
        }
    }

    /// Final synchronous save, then unmount. A save still in flight is
    /// waited for first, with no deadline, so it never overlaps the final
    /// write. `current` is saved when edits are still unsaved or the last
    /// save failed.
    pub fn flush_blocking(&mut self, current: S) -> Option<Result<(), SaveError>> {
        if self.debouncer.is_torn_down() {
            return None;
        }

        if let Some(worker) = self.worker.take() {
            tracing::info!("waiting for in-flight save before final save");
            let result = worker
                .join()
                .unwrap_or_else(|_| Err(SaveError::new("save worker panicked")));
            self.debouncer.complete(result, Instant::now());
        }

        let needs_save = self.debouncer.has_unsaved_edits() || self.status().is_failed();
        self.unmount();
        if !needs_save {
            return None;
        }

        let result = self.target.save(&current);
        match &result {
            Ok(()) => tracing::info!("final save complete"),
            Err(err) => tracing::error!("final {err}"),
        }
        Some(result)
    }

    pub fn unmount(&mut self) {
        if !self.debouncer.is_torn_down() {
            tracing::info!("autosave unmounted");
        }
        self.debouncer.teardown();
    }

    /// Short text for the host's status area.
    pub fn status_label(&self) -> String {
        match self.status() {
            SaveStatus::Idle => String::new(),
            SaveStatus::Pending => "unsaved".to_string(),
            SaveStatus::Saving => "saving…".to_string(),
            SaveStatus::Saved => "saved".to_string(),
            SaveStatus::Failed(err) => format!("error: {}", err.cause()),
        }
    }

    fn spawn_save(&mut self, state: S) {
        let target = Arc::clone(&self.target);
        let events = self.events.clone();
        tracing::debug!("autosave firing");

        self.worker = Some(thread::spawn(move || {
            let result = target.save(&state);
            match &result {
                Ok(()) => tracing::info!("autosave complete"),
                Err(err) => tracing::error!("autosave {err}"),
            }
            // The host may already be gone; nothing left to update then.
            let _ = events.send(Msg::SaveFinished(result.clone()));
            result
        }));
    }
}
