//! A running exploration session.
//!
//! Snapshots arrive either from the platform (organic UI changes) or from the
//! retry timer when the UI stays quiet. Both paths run under one lock, so a
//! pass never overlaps another and the timer is always cancelled before it is
//! re-armed.

use crate::config::Configuration;
use crate::errors::MonkeyError;
use crate::log::{EventSink, EventSource};
use crate::node::UiNode;
use crate::orchestrator::{Orchestrator, PassOutcome};
use crate::platforms::{GlobalAction, SessionHost, SessionStatus, TreeProvider};
use crate::scheduler::{RetryTimer, SchedulerState};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Delay before the single retry when the foreground tree is unavailable
pub const TREE_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCounters {
    pub current_rep: u32,
    pub current_set: u32,
}

/// Result of one bookkeeping step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bookkeeping {
    /// The set that just reached its last rep
    pub completed_set: Option<u32>,
    /// The session reached its set limit and must end
    pub session_complete: bool,
}

impl SessionCounters {
    /// Counts one handled snapshot. The set limit is only enforced while the
    /// session is running.
    pub fn advance(&mut self, max_reps: u32, max_sets: u32, running: bool) -> Bookkeeping {
        self.current_rep += 1;

        let mut completed_set = None;
        if self.current_rep >= max_reps {
            completed_set = Some(self.current_set);
            self.current_set += 1;
            self.current_rep = 0;
        }

        let session_complete = running && self.current_set >= max_sets;
        if session_complete {
            *self = SessionCounters::default();
        }

        Bookkeeping {
            completed_set,
            session_complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct SessionState {
    orchestrator: Orchestrator,
    counters: SessionCounters,
    running: bool,
    terminated: bool,
    shut_down: bool,
    /// Root of the last snapshot read or delivered
    previous: Option<UiNode>,
    timer: RetryTimer,
}

struct Shared {
    config: Configuration,
    provider: Arc<dyn TreeProvider>,
    host: Arc<dyn SessionHost>,
    state: Mutex<SessionState>,
    terminated: CancellationToken,
}

/// Handle to an exploration session. Clones share the session.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    pub fn new(
        config: Configuration,
        provider: Arc<dyn TreeProvider>,
        host: Arc<dyn SessionHost>,
        sink: Box<dyn EventSink>,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, MonkeyError> {
        Self::with_orchestrator(config, provider, host, Orchestrator::new(sink, rng))
    }

    /// Like [`Session::new`] with a custom policy or rule set
    pub fn with_orchestrator(
        config: Configuration,
        provider: Arc<dyn TreeProvider>,
        host: Arc<dyn SessionHost>,
        orchestrator: Orchestrator,
    ) -> Result<Self, MonkeyError> {
        config.validate()?;
        info!(
            package = %config.package_name,
            max_reps = config.max_reps,
            max_sets = config.max_sets,
            timeout_ms = config.timeout_ms,
            "Configuring session"
        );
        let state = SessionState {
            orchestrator,
            counters: SessionCounters::default(),
            running: false,
            terminated: false,
            shut_down: false,
            previous: None,
            timer: RetryTimer::new(),
        };
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                provider,
                host,
                state: Mutex::new(state),
                terminated: CancellationToken::new(),
            }),
        })
    }

    /// Creates a session whose randomness comes from `config.seed`, or from
    /// entropy when no seed is set.
    pub fn configure(
        config: Configuration,
        provider: Arc<dyn TreeProvider>,
        host: Arc<dyn SessionHost>,
        sink: Box<dyn EventSink>,
    ) -> Result<Self, MonkeyError> {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self::new(config, provider, host, sink, Box::new(rng))
    }

    pub fn config(&self) -> &Configuration {
        &self.shared.config
    }

    /// Marks the session running, enables input delivery and launches the
    /// app under test.
    #[instrument(skip(self), fields(package = %self.shared.config.package_name))]
    pub async fn start(&self) -> Result<(), MonkeyError> {
        let mut state = self.shared.state.lock().await;
        if state.terminated {
            return Err(MonkeyError::Terminated);
        }
        state.running = true;

        if let Err(e) = self.shared.host.set_input_delivery(true) {
            warn!(error = %e, "Failed to enable input delivery");
        }
        match self.shared.provider.launch_app(&self.shared.config.package_name) {
            Ok(()) => {
                info!("Session started");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.shared.fail(&mut state, &reason);
                Err(MonkeyError::LaunchFailed(reason))
            }
        }
    }

    /// Organic entry point: the platform reports a changed UI.
    #[instrument(level = "debug", skip(self, root))]
    pub async fn on_snapshot_delivered(&self, root: UiNode) -> Result<(), MonkeyError> {
        let mut state = self.shared.state.lock().await;
        if state.terminated {
            debug!("Session terminated, ignoring snapshot");
            return Ok(());
        }
        state.timer.cancel();
        if self.shared.bookkeeping(&mut state) == Flow::Stop {
            return Ok(());
        }
        state.previous = Some(root.clone());
        self.shared
            .trigger(&mut state, root, EventSource::External)
            .map(|_| ())
    }

    /// Cancels the pending retry. Safe to call any number of times.
    pub async fn cancel_all_timers(&self) {
        self.shared.state.lock().await.timer.cancel();
    }

    /// Stops the session: no further passes, the log file is closed.
    /// Calling it again has no effect.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let mut state = self.shared.state.lock().await;
        if state.shut_down {
            debug!("Session already shut down");
            return;
        }
        state.shut_down = true;
        state.timer.terminate();
        state.orchestrator.close_file();
        state.running = false;
        state.terminated = true;
        self.shared.terminated.cancel();
        info!("Session shut down");
    }

    pub async fn scheduler_state(&self) -> SchedulerState {
        self.shared.state.lock().await.timer.state()
    }

    pub async fn counters(&self) -> SessionCounters {
        self.shared.state.lock().await.counters
    }

    pub async fn is_running(&self) -> bool {
        self.shared.state.lock().await.running
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.is_cancelled()
    }

    /// Resolves once the session has ended, by completion, failure or
    /// shutdown.
    pub async fn terminated(&self) {
        self.shared.terminated.cancelled().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("package", &self.shared.config.package_name)
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn package(&self) -> &str {
        &self.config.package_name
    }

    /// Counts the snapshot and performs set and session transitions.
    fn bookkeeping(&self, state: &mut SessionState) -> Flow {
        let step = state.counters.advance(
            self.config.max_reps,
            self.config.max_sets,
            state.running,
        );
        debug!(
            rep = state.counters.current_rep,
            set = state.counters.current_set,
            "Counted snapshot"
        );

        if let Some(set) = step.completed_set {
            warn!(set, "Maximum reps reached, finishing set");
            state.timer.cancel();
            if self.config.root_access {
                if let Err(e) = self.host.clear_app_data(self.package()) {
                    warn!(error = %e, "Failed to clear app data");
                }
            } else {
                warn!("No root access, app data is kept between sets");
            }
            state.orchestrator.close_file();
            if let Err(e) = self.host.capture_logs(self.package(), set) {
                warn!(set, error = %e, "Failed to capture logs");
            }
        }

        if step.session_complete {
            self.complete(state);
            return Flow::Stop;
        }
        Flow::Continue
    }

    /// Runs a pass over `root` and re-arms the retry timer.
    fn trigger(
        self: &Arc<Self>,
        state: &mut SessionState,
        root: UiNode,
        source: EventSource,
    ) -> Result<PassOutcome, MonkeyError> {
        state.timer.cancel();
        let result = state.orchestrator.handle(
            &self.config,
            self.provider.as_ref(),
            &root,
            source,
        );

        match result {
            Ok(outcome) => {
                self.arm(state);
                Ok(outcome)
            }
            Err(MonkeyError::LaunchFailed(reason)) => {
                self.fail(state, &reason);
                Err(MonkeyError::LaunchFailed(reason))
            }
            Err(e) => {
                error!(error = %e, "Pass failed");
                self.arm(state);
                Err(e)
            }
        }
    }

    fn arm(self: &Arc<Self>, state: &mut SessionState) {
        let shared: Weak<Self> = Arc::downgrade(self);
        state.timer.arm(self.config.timeout(), move |generation| async move {
            if let Some(shared) = shared.upgrade() {
                shared.fire(generation).await;
            }
        });
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        let mut state = self.state.lock().await;
        if state.terminated || !state.timer.begin_fire(generation) {
            debug!(generation, "Stale timer fire ignored");
            return;
        }
        debug!(generation, "Retry timer fired");

        // Only a fresh read replaces the last-seen snapshot
        let root = match self.foreground_tree().await {
            Some(root) => {
                state.previous = Some(root.clone());
                root
            }
            None => match state.previous.clone() {
                Some(previous) => {
                    warn!("Foreground tree unavailable, reusing previous snapshot");
                    previous
                }
                None => {
                    warn!("Foreground tree unavailable, opening recents");
                    if let Err(e) = self.provider.global_action(GlobalAction::Recents) {
                        warn!(error = %e, "Recents failed");
                    }
                    state.timer.settle();
                    return;
                }
            },
        };

        if self.bookkeeping(&mut state) == Flow::Stop {
            return;
        }
        if let Err(e) = self.trigger(&mut state, root, EventSource::Timer) {
            error!(error = %e, "Timer pass failed");
        }
    }

    /// Reads the foreground tree, retrying once after a short delay
    async fn foreground_tree(&self) -> Option<UiNode> {
        if let Some(root) = self.provider.foreground_tree() {
            return Some(root);
        }
        debug!("No foreground tree, retrying");
        tokio::time::sleep(TREE_RETRY_DELAY).await;
        self.provider.foreground_tree()
    }

    /// Normal end of the session after its last set
    fn complete(&self, state: &mut SessionState) {
        info!(package = %self.package(), "All sets finished, ending session");
        state.running = false;
        state.terminated = true;
        state.timer.terminate();
        if let Err(e) = self.host.set_input_delivery(false) {
            warn!(error = %e, "Failed to disable input delivery");
        }
        if let Err(e) = self.host.write_status(self.package(), SessionStatus::Done) {
            error!(error = %e, "Failed to write status");
        }
        self.terminated.cancel();
        self.host.terminate();
    }

    /// The app under test could not be launched
    fn fail(&self, state: &mut SessionState, reason: &str) {
        error!(package = %self.package(), reason, "Cannot launch app under test");
        state.running = false;
        state.terminated = true;
        state.timer.terminate();
        if let Err(e) = self.host.set_input_delivery(false) {
            warn!(error = %e, "Failed to disable input delivery");
        }
        if let Err(e) = self.host.write_status(self.package(), SessionStatus::Failed) {
            error!(error = %e, "Failed to write status");
        }
        self.terminated.cancel();
    }
}
