//! Suite lifecycle and created-resource tracking

mod engine;
mod error;
pub mod loader;
mod tracker;

pub use engine::{ApplyOutcome, DeleteFailure, Existence, SuiteEngine, TeardownReport};
pub use error::SuiteError;
#[cfg(test)]
pub use tracker::MockTrackerStore;
pub use tracker::{CreatedResources, MemoryTracker, TrackerError, TrackerStore};
