use crate::config::Configuration;
use crate::errors::MonkeyError;
use crate::log::{ActionKind, EventSink, EventSource};
use crate::node::UiNode;
use crate::pass::PassContext;
use crate::platforms::TreeProvider;
use crate::policy::DecisionPolicy;
use crate::rules::{RuleOutcome, SpecialCaseRules};
use rand::RngCore;
use tracing::{info, instrument, warn};

/// What one pass over a snapshot did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Name of the special-case rule that handled the snapshot, if any
    pub special_case: Option<String>,
    /// Every recorded action, in order
    pub actions: Vec<ActionKind>,
}

impl PassOutcome {
    /// The single primary action of the pass, if one was taken
    pub fn primary(&self) -> Option<ActionKind> {
        self.actions.iter().copied().find(|kind| kind.is_primary())
    }
}

/// Handles one snapshot: special cases first, then the decision policy.
/// Owns the log sink and the source of randomness.
pub struct Orchestrator {
    policy: DecisionPolicy,
    rules: SpecialCaseRules,
    sink: Box<dyn EventSink>,
    rng: Box<dyn RngCore + Send>,
}

impl Orchestrator {
    pub fn new(sink: Box<dyn EventSink>, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            policy: DecisionPolicy::default(),
            rules: SpecialCaseRules::default(),
            sink,
            rng,
        }
    }

    pub fn with_policy(mut self, policy: DecisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_rules(mut self, rules: SpecialCaseRules) -> Self {
        self.rules = rules;
        self
    }

    /// Runs one pass over `root`, recording it as one log event.
    ///
    /// The event is closed on every path. Only a failed relaunch of the app
    /// under test is returned as an error.
    #[instrument(level = "info", skip(self, config, provider, root))]
    pub fn handle(
        &mut self,
        config: &Configuration,
        provider: &dyn TreeProvider,
        root: &UiNode,
        source: EventSource,
    ) -> Result<PassOutcome, MonkeyError> {
        if let Err(e) = self.sink.open_event(source, root) {
            warn!(error = %e, "Failed to open log event");
        }

        let mut ctx = PassContext::new(config, provider, self.sink.as_mut(), self.rng.as_mut());
        let result = run_pass(&self.policy, &self.rules, &mut ctx, root);
        let actions = ctx.into_recorded();

        if let Err(e) = self.sink.close_event() {
            warn!(error = %e, "Failed to close log event");
        }

        let special_case = result?;
        info!(?actions, ?special_case, "Pass finished");
        Ok(PassOutcome {
            special_case,
            actions,
        })
    }

    /// Ends the current log file. Failures are logged only.
    pub fn close_file(&mut self) {
        if let Err(e) = self.sink.close_file() {
            warn!(error = %e, "Failed to close log file");
        }
    }
}

fn run_pass(
    policy: &DecisionPolicy,
    rules: &SpecialCaseRules,
    ctx: &mut PassContext<'_>,
    root: &UiNode,
) -> Result<Option<String>, MonkeyError> {
    if let RuleOutcome::Handled { rule } = rules.apply(ctx, root)? {
        return Ok(Some(rule));
    }

    policy.fill_editfields(ctx, root);
    // Scrolling and clicking are exclusive; scrolling goes first
    if !policy.input_gestures(ctx, root) {
        policy.find_and_click_clickables(ctx, root);
    }
    Ok(None)
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("policy", &self.policy)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}
