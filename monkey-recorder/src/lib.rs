//! Exploration log recorder
//!
//! This crate persists the events produced by a `monkey` session: every
//! closed event is kept in the set being recorded and each set is written to
//! its own JSON file when the session closes it. Closed events are also
//! broadcast so live subscribers can follow a run.

pub mod error;
pub mod events;
pub mod recorder;

pub use error::*;
pub use events::RecordedSet;
pub use recorder::*;
