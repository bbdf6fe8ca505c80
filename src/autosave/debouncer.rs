//! Debounce state machine behind the autosave interface.
//!
//! The machine never looks at a clock: every transition takes the current
//! [`Instant`] from the caller, and firing a timer hands the item state back to
//! the caller instead of saving it. The host event loop owns both concerns.
//!
//! Invariants:
//! - at most one deadline is armed at a time;
//! - while [`SaveStatus::Saving`] no deadline is armed, so saves never overlap.
//!   Edits that arrive during a save set the rearm flag and are picked up by a
//!   fresh cycle once the save completes.

use std::mem;
use std::time::{Duration, Instant};

use super::config::AutosaveConfig;
use super::status::SaveStatus;
use crate::error::SaveError;

/// What [`Debouncer::complete`] did with a save result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Status moved to `Saved` or `Failed`; nothing else is scheduled.
    Settled,
    /// Edits arrived during the save; a new debounce cycle is armed. Status is
    /// `Pending` after a success and `Failed` after a failure.
    Rearmed,
    /// The result was ignored (torn down, or no save was in flight).
    Discarded,
}

#[derive(Debug)]
pub struct Debouncer<S> {
    config: AutosaveConfig,
    status: SaveStatus,
    deadline: Option<Instant>,
    latest: Option<S>,
    rearm: bool,
    saved_at: Option<Instant>,
    torn_down: bool,
}

impl<S> Debouncer<S> {
    pub fn new(config: AutosaveConfig) -> Self {
        Self {
            config,
            status: SaveStatus::Idle,
            deadline: None,
            latest: None,
            rearm: false,
            saved_at: None,
            torn_down: false,
        }
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn frequency(&self) -> Duration {
        self.config.frequency()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// True when an edit has not yet been handed to a save.
    pub fn has_unsaved_edits(&self) -> bool {
        self.deadline.is_some() || self.rearm
    }

    /// Apply a new interval. An already armed deadline keeps its original
    /// expiry; the new interval is used from the next edit on.
    pub fn reconfigure(&mut self, config: AutosaveConfig) {
        if config != self.config {
            tracing::debug!(
                from_ms = self.config.frequency_ms() as u64,
                to_ms = config.frequency_ms() as u64,
                "autosave frequency changed"
            );
        }
        self.config = config;
    }

    /// Record a changed item state.
    pub fn record_edit(&mut self, state: S, now: Instant) {
        if self.torn_down {
            tracing::trace!("edit after teardown ignored");
            return;
        }

        self.latest = Some(state);

        if self.status == SaveStatus::Saving {
            self.rearm = true;
            tracing::trace!("edit during save, rearm flagged");
            return;
        }

        self.arm(now);
    }

    /// Fire the deadline if it has expired. Returns the state the caller must
    /// hand to the save target; status is then `Saving` until
    /// [`complete`](Self::complete) is called.
    pub fn poll(&mut self, now: Instant) -> Option<S> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.fire()
    }

    /// Fire an armed deadline right away. Does nothing while a save is in
    /// flight or when no edit is waiting.
    pub fn flush(&mut self, now: Instant) -> Option<S> {
        if self.torn_down || self.deadline.is_none() {
            return None;
        }
        tracing::trace!(?now, "flushing armed deadline");
        self.fire()
    }

    /// Feed back the outcome of the save returned by the last `poll`/`flush`.
    pub fn complete(&mut self, result: Result<(), SaveError>, now: Instant) -> Completion {
        if self.torn_down {
            tracing::debug!("save completed after teardown, result discarded");
            return Completion::Discarded;
        }

        if self.status != SaveStatus::Saving {
            tracing::warn!(status = self.status.label(), "save completion without a save in flight");
            return Completion::Discarded;
        }

        if mem::take(&mut self.rearm) {
            self.arm(now);
            // The follow-up cycle stays armed, but a failure is still shown
            // until the next edit or save replaces it.
            if let Err(err) = result {
                tracing::warn!("{err}; newer edits already queued");
                self.status = SaveStatus::Failed(err);
            }
            return Completion::Rearmed;
        }

        match result {
            Ok(()) => {
                self.status = SaveStatus::Saved;
                self.saved_at = Some(now);
            }
            Err(err) => self.status = SaveStatus::Failed(err),
        }
        Completion::Settled
    }

    /// Drop back from `Saved` to `Idle` once the feedback window has passed.
    pub fn settle_feedback(&mut self, now: Instant, window: Duration) {
        if self.status != SaveStatus::Saved {
            return;
        }
        if self
            .saved_at
            .is_some_and(|saved_at| now.saturating_duration_since(saved_at) >= window)
        {
            self.status = SaveStatus::Idle;
            self.saved_at = None;
        }
    }

    /// Cancel the armed deadline and stop reacting. A save still in flight may
    /// finish, but its completion no longer changes anything.
    pub fn teardown(&mut self) {
        self.deadline = None;
        self.latest = None;
        self.rearm = false;
        self.torn_down = true;
    }

    fn arm(&mut self, now: Instant) {
        let deadline = now + self.config.frequency();
        self.deadline = Some(deadline);
        self.status = SaveStatus::Pending;
        self.saved_at = None;
        tracing::trace!(?deadline, "autosave timer armed");
    }

    fn fire(&mut self) -> Option<S> {
        self.deadline = None;
        match self.latest.take() {
            Some(state) => {
                self.status = SaveStatus::Saving;
                Some(state)
            }
            None => {
                self.status = SaveStatus::Idle;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn debouncer(frequency_ms: i64) -> Debouncer<&'static str> {
        Debouncer::new(AutosaveConfig::from_millis(frequency_ms).unwrap())
    }

    /// Poll every 10ms over `[from, to]`, collecting fired states with their offset.
    fn run(
        d: &mut Debouncer<&'static str>,
        t0: Instant,
        from: u64,
        to: u64,
    ) -> Vec<(u64, &'static str)> {
        let mut fired = Vec::new();
        let mut t = from;
        while t <= to {
            if let Some(state) = d.poll(t0 + ms(t)) {
                fired.push((t, state));
                d.complete(Ok(()), t0 + ms(t));
            }
            t += 10;
        }
        fired
    }

    #[test]
    fn burst_collapses_into_single_save_with_last_state() {
        let t0 = Instant::now();
        let mut d = debouncer(500);

        d.record_edit("A", t0);
        assert_eq!(run(&mut d, t0, 0, 90), vec![]);
        d.record_edit("B", t0 + ms(100));
        assert_eq!(run(&mut d, t0, 100, 190), vec![]);
        d.record_edit("C", t0 + ms(200));
        assert_eq!(*d.status(), SaveStatus::Pending);

        let fired = run(&mut d, t0, 200, 990);
        assert_eq!(fired, vec![(700, "C")]);
        assert_eq!(*d.status(), SaveStatus::Saved);

        d.record_edit("D", t0 + ms(1000));
        let fired = run(&mut d, t0, 1000, 2500);
        assert_eq!(fired, vec![(1500, "D")]);
    }

    #[test]
    fn separated_bursts_save_twice() {
        let t0 = Instant::now();
        let mut d = debouncer(100);

        d.record_edit("first", t0);
        d.record_edit("first-b", t0 + ms(50));
        let mut fired = run(&mut d, t0, 50, 400);
        d.record_edit("second", t0 + ms(400));
        fired.extend(run(&mut d, t0, 410, 800));

        assert_eq!(fired, vec![(150, "first-b"), (500, "second")]);
    }

    #[test]
    fn edit_during_save_chains_exactly_one_follow_up() {
        let t0 = Instant::now();
        let mut d = debouncer(100);

        d.record_edit("v1", t0);
        assert_eq!(d.poll(t0 + ms(100)), Some("v1"));
        assert_eq!(*d.status(), SaveStatus::Saving);

        d.record_edit("v2", t0 + ms(120));
        d.record_edit("v3", t0 + ms(130));
        assert_eq!(d.deadline(), None, "no timer while saving");
        assert_eq!(d.poll(t0 + ms(500)), None, "no overlapping save");
        assert!(d.has_unsaved_edits());

        assert_eq!(d.complete(Ok(()), t0 + ms(600)), Completion::Rearmed);
        assert_eq!(*d.status(), SaveStatus::Pending);
        assert_eq!(d.deadline(), Some(t0 + ms(700)));

        assert_eq!(d.poll(t0 + ms(699)), None);
        assert_eq!(d.poll(t0 + ms(700)), Some("v3"));
        assert_eq!(d.complete(Ok(()), t0 + ms(710)), Completion::Settled);
        assert_eq!(d.poll(t0 + ms(2000)), None);
        assert!(!d.has_unsaved_edits());
    }

    #[test]
    fn frequency_change_applies_to_next_timer_only() {
        let t0 = Instant::now();
        let mut d = debouncer(500);

        d.record_edit("a", t0);
        d.reconfigure(AutosaveConfig::from_millis(100).unwrap());
        assert_eq!(d.deadline(), Some(t0 + ms(500)));
        assert_eq!(d.poll(t0 + ms(200)), None);
        assert_eq!(d.poll(t0 + ms(500)), Some("a"));
        d.complete(Ok(()), t0 + ms(510));

        d.record_edit("b", t0 + ms(1000));
        assert_eq!(d.deadline(), Some(t0 + ms(1100)));
        assert_eq!(d.frequency(), ms(100));
    }

    #[test]
    fn failure_is_reported_and_not_retried() {
        let t0 = Instant::now();
        let mut d = debouncer(100);

        d.record_edit("x", t0);
        assert_eq!(d.poll(t0 + ms(100)), Some("x"));
        let completion = d.complete(Err(SaveError::new("offline")), t0 + ms(150));

        assert_eq!(completion, Completion::Settled);
        assert_eq!(*d.status(), SaveStatus::Failed(SaveError::new("offline")));
        assert_eq!(d.deadline(), None);
        assert_eq!(d.poll(t0 + ms(10_000)), None);

        d.record_edit("y", t0 + ms(10_000));
        assert_eq!(*d.status(), SaveStatus::Pending);
        assert_eq!(d.poll(t0 + ms(10_100)), Some("y"));
    }

    #[test]
    fn failure_with_queued_edits_rearms() {
        let t0 = Instant::now();
        let mut d = debouncer(100);

        d.record_edit("x", t0);
        d.poll(t0 + ms(100));
        d.record_edit("y", t0 + ms(120));

        let completion = d.complete(Err(SaveError::new("timeout")), t0 + ms(200));
        assert_eq!(completion, Completion::Rearmed);
        assert_eq!(*d.status(), SaveStatus::Failed(SaveError::new("timeout")));
        assert_eq!(d.deadline(), Some(t0 + ms(300)));
        assert!(d.has_unsaved_edits());

        assert_eq!(d.poll(t0 + ms(299)), None);
        assert_eq!(*d.status(), SaveStatus::Failed(SaveError::new("timeout")));
        assert_eq!(d.poll(t0 + ms(300)), Some("y"));
        assert_eq!(*d.status(), SaveStatus::Saving);
        assert_eq!(d.complete(Ok(()), t0 + ms(310)), Completion::Settled);
        assert_eq!(*d.status(), SaveStatus::Saved);
    }

    #[test]
    fn saved_returns_to_idle_after_feedback_window() {
        let t0 = Instant::now();
        let mut d = debouncer(100);

        d.record_edit("x", t0);
        d.poll(t0 + ms(100));
        d.complete(Ok(()), t0 + ms(120));

        d.settle_feedback(t0 + ms(500), ms(1000));
        assert_eq!(*d.status(), SaveStatus::Saved);
        d.settle_feedback(t0 + ms(1120), ms(1000));
        assert_eq!(*d.status(), SaveStatus::Idle);
    }

    #[test]
    fn flush_fires_armed_timer_immediately() {
        let t0 = Instant::now();
        let mut d = debouncer(5_000);

        assert_eq!(d.flush(t0), None);
        d.record_edit("draft", t0);
        assert_eq!(d.flush(t0 + ms(1)), Some("draft"));
        assert_eq!(*d.status(), SaveStatus::Saving);
        assert_eq!(d.flush(t0 + ms(2)), None);
    }

    #[test]
    fn teardown_cancels_timer_and_discards_late_results() {
        let t0 = Instant::now();
        let mut d = debouncer(100);

        d.record_edit("a", t0);
        assert_eq!(d.poll(t0 + ms(100)), Some("a"));
        d.record_edit("b", t0 + ms(110));

        d.teardown();
        assert!(d.is_torn_down());
        assert_eq!(d.complete(Ok(()), t0 + ms(200)), Completion::Discarded);
        assert_eq!(*d.status(), SaveStatus::Saving, "state untouched after teardown");
        assert_eq!(d.deadline(), None);

        d.record_edit("c", t0 + ms(300));
        assert_eq!(d.poll(t0 + ms(10_000)), None);
    }

    #[test]
    fn stray_completion_is_discarded() {
        let t0 = Instant::now();
        let mut d = debouncer(100);
        assert_eq!(d.complete(Ok(()), t0), Completion::Discarded);
        assert_eq!(*d.status(), SaveStatus::Idle);
    }
}
