//! Stage 3: heuristic spam classification.

pub mod classifier;
pub mod signals;

pub use classifier::{Disposition, SignalHit, SpamClassifier, SpamEntry, Verdict};
pub use signals::{Field, SignalRule, SpamSignalSet, Strength};
