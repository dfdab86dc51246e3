use crate::config::Configuration;
use crate::log::{ActionKind, EventSink};
use crate::platforms::TreeProvider;
use rand::{Rng, RngCore};
use tracing::warn;

/// Collaborators borrowed for the duration of one pass over a snapshot
pub struct PassContext<'a> {
    pub config: &'a Configuration,
    pub provider: &'a dyn TreeProvider,
    sink: &'a mut dyn EventSink,
    rng: &'a mut dyn RngCore,
    recorded: Vec<ActionKind>,
}

impl<'a> PassContext<'a> {
    pub fn new(
        config: &'a Configuration,
        provider: &'a dyn TreeProvider,
        sink: &'a mut dyn EventSink,
        rng: &'a mut dyn RngCore,
    ) -> Self {
        Self {
            config,
            provider,
            sink,
            rng,
            recorded: Vec::new(),
        }
    }

    /// `true` with probability `p`
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }

    /// Uniformly random element of `items`
    pub fn pick<'n, T>(&mut self, items: &'n [T]) -> Option<&'n T> {
        if items.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..items.len());
        items.get(index)
    }

    pub fn rng(&mut self) -> &mut dyn RngCore {
        &mut *self.rng
    }

    /// Appends an action to the open event. Sink failures are logged only.
    pub fn record(&mut self, kind: ActionKind, resource_id: &str, value: &str) {
        if let Err(e) = self.sink.append_action(kind, resource_id, value) {
            warn!(%kind, resource_id, error = %e, "Failed to record action");
        }
        self.recorded.push(kind);
    }

    /// Kinds of the actions recorded so far, in order
    pub fn recorded(&self) -> &[ActionKind] {
        &self.recorded
    }

    pub fn into_recorded(self) -> Vec<ActionKind> {
        self.recorded
    }
}
