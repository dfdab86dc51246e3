//! Randomized UI exploration driven by a live accessibility tree
//!
//! A [`Session`] receives snapshots of the foreground UI, either when the
//! platform reports a change or when its retry timer fires, and answers each
//! one with a single pass: system dialogs and foreign apps are handled by
//! [`SpecialCaseRules`], everything else by the [`DecisionPolicy`] (fill
//! inputs, then scroll or click). Every pass is recorded as one [`LogEvent`].

pub mod config;
pub mod dump;
pub mod errors;
pub mod log;
pub mod node;
pub mod orchestrator;
pub mod pass;
pub mod platforms;
pub mod policy;
pub mod query;
pub mod rules;
pub mod scheduler;
pub mod search;
pub mod session;
#[cfg(test)]
mod tests;

pub use config::Configuration;
pub use dump::NodeDump;
pub use errors::MonkeyError;
pub use log::{Action, ActionKind, EventJournal, EventSink, EventSource, LogEvent, MemorySink};
pub use node::{Bounds, NodeAction, UiNode, UiNodeAttributes, UiNodeImpl};
pub use orchestrator::{Orchestrator, PassOutcome};
pub use platforms::{GlobalAction, SessionHost, SessionStatus, TreeProvider};
pub use policy::DecisionPolicy;
pub use query::AttributeQuery;
pub use rules::{OnMismatch, RuleOutcome, SpecialCaseRule, SpecialCaseRules};
pub use scheduler::SchedulerState;
pub use search::search;
pub use session::{Session, SessionCounters};
