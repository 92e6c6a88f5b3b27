//! Poll loop driving the tip tracker on a fixed cadence
//!
//! The loop owns the cursor. It is only replaced after an `advance` call has
//! completed and its blocks have been handed to the presenter, and ticks never
//! overlap: a cadence firing that lands while a tick is in flight is skipped.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use tipwatch_core::{Cursor, Height, NodeApi, Transaction};

use crate::tip_tracker::{Advance, EmittedBlock, TipTracker, TrackerError};

/// Receives every emitted transaction, in order
pub trait Presenter: Send {
    fn present(&mut self, height: Height, transaction: &Transaction);

    fn present_block(&mut self, block: &EmittedBlock) {
        for transaction in block.transactions() {
            self.present(block.height, transaction);
        }
    }
}

/// What to do when a tick fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the loop on the first error
    #[default]
    Fatal,
    /// Keep polling through retryable errors until this many ticks in a row have failed
    Tolerant { max_consecutive_failures: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            failure_policy: FailurePolicy::Fatal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

pub struct PollLoop<N, P> {
    tracker: TipTracker<N>,
    presenter: P,
    config: PollConfig,
    cursor: Cursor,
    state: LoopState,
    consecutive_failures: u32,
}

impl<N: NodeApi, P: Presenter> PollLoop<N, P> {
    pub fn new(tracker: TipTracker<N>, presenter: P, config: PollConfig) -> Self {
        Self {
            tracker,
            presenter,
            config,
            cursor: Cursor::UNSEEN,
            state: LoopState::Running,
            consecutive_failures: 0,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Poll until a shutdown signal arrives or a tick fails fatally.
    ///
    /// Returns the final cursor on shutdown. An `advance` still in flight when
    /// the signal arrives is dropped and its result is never applied. A closed
    /// shutdown channel counts as a signal.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<Cursor, TrackerError> {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            mode = ?self.tracker.mode(),
            policy = ?self.config.failure_policy,
            "Starting poll loop"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.state == LoopState::Running {
            let fired = tokio::select! {
                biased;
                _ = shutdown.recv() => false,
                _ = interval.tick() => true,
            };
            if !fired {
                self.stop();
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown.recv() => None,
                outcome = self.tracker.advance(self.cursor) => Some(outcome),
            };
            let Some(outcome) = outcome else {
                info!(cursor = %self.cursor, "Shutdown during tick, abandoning it");
                self.stop();
                break;
            };

            if let Err(e) = self.apply(outcome) {
                self.stop();
                return Err(e);
            }
        }

        info!(cursor = %self.cursor, "Poll loop stopped");
        Ok(self.cursor)
    }

    /// Run a single tick to completion
    pub async fn tick(&mut self) -> Result<(), TrackerError> {
        if self.state == LoopState::Stopped {
            return Ok(());
        }
        let outcome = self.tracker.advance(self.cursor).await;
        self.apply(outcome)
    }

    pub fn stop(&mut self) {
        self.state = LoopState::Stopped;
    }

    fn apply(&mut self, outcome: Result<Advance, TrackerError>) -> Result<(), TrackerError> {
        match outcome {
            Ok(advance) => {
                self.consecutive_failures = 0;
                if advance.is_noop() {
                    return Ok(());
                }
                for block in &advance.blocks {
                    self.presenter.present_block(block);
                }
                debug!(from = %self.cursor, to = %advance.cursor, "Cursor advanced");
                self.cursor = self.cursor.max(advance.cursor);
                Ok(())
            }
            Err(e) => self.on_failure(e),
        }
    }

    fn on_failure(&mut self, error: TrackerError) -> Result<(), TrackerError> {
        match self.config.failure_policy {
            FailurePolicy::Fatal => {
                error!(cursor = %self.cursor, error = %error, "Tick failed");
                Err(error)
            }
            FailurePolicy::Tolerant {
                max_consecutive_failures,
            } => {
                if !error.is_retryable() {
                    error!(cursor = %self.cursor, error = %error, "Tick failed with non-retryable error");
                    return Err(error);
                }

                self.consecutive_failures += 1;
                if self.consecutive_failures >= max_consecutive_failures.max(1) {
                    error!(
                        cursor = %self.cursor,
                        failures = self.consecutive_failures,
                        error = %error,
                        "Too many consecutive failed ticks"
                    );
                    return Err(error);
                }

                warn!(
                    cursor = %self.cursor,
                    failures = self.consecutive_failures,
                    error = %error,
                    "Tick failed, retrying on next tick"
                );
                Ok(())
            }
        }
    }
}
