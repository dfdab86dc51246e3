use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Armed,
    Firing,
    Terminated,
}

/// Single reusable one-shot timer.
///
/// Arming always cancels the pending fire first, so at most one timer is
/// live. Every arm gets a new generation; a fire whose generation is no
/// longer current must be ignored by the callback.
#[derive(Debug, Default)]
pub struct RetryTimer {
    token: Option<CancellationToken>,
    generation: u64,
    state: SchedulerState,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Cancels the pending fire, if any. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            debug!(generation = self.generation, "Cancelling retry timer");
            token.cancel();
        }
        if self.state == SchedulerState::Armed {
            self.state = SchedulerState::Idle;
        }
    }

    /// Schedules `on_fire(generation)` after `delay`, replacing any pending
    /// fire. Must be called from within a tokio runtime. Does nothing once
    /// terminated.
    pub fn arm<F, Fut>(&mut self, delay: Duration, on_fire: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.state == SchedulerState::Terminated {
            debug!("Scheduler terminated, not arming");
            return;
        }
        self.cancel();

        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => on_fire(generation).await,
            }
        });

        debug!(generation, delay_ms = delay.as_millis() as u64, "Retry timer armed");
        self.token = Some(token);
        self.state = SchedulerState::Armed;
    }

    /// Claims the fire of `generation`. Returns `false` when that timer was
    /// cancelled or replaced after it woke up.
    pub fn begin_fire(&mut self, generation: u64) -> bool {
        let current = self.state == SchedulerState::Armed
            && self.generation == generation
            && self.token.as_ref().is_some_and(|t| !t.is_cancelled());
        if current {
            self.token = None;
            self.state = SchedulerState::Firing;
        }
        current
    }

    /// Leaves the firing state without re-arming
    pub fn settle(&mut self) {
        if self.state == SchedulerState::Firing {
            self.state = SchedulerState::Idle;
        }
    }

    /// Cancels the pending fire and refuses to arm again
    pub fn terminate(&mut self) {
        self.cancel();
        self.state = SchedulerState::Terminated;
    }

    pub fn is_armed(&self) -> bool {
        self.state == SchedulerState::Armed
    }
}
