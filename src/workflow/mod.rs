pub mod aggregate;
pub mod completion;
pub mod tracker;

pub use aggregate::{AggregateEntry, AggregateView};
pub use completion::CompletionDecision;
pub use tracker::{MergeOutcome, MergeResult, SessionPhase, SessionTracker, SlotState};
