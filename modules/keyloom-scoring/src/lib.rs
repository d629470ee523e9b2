//! Pure scoring functions: difficulty components, click-through based
//! traffic potential, and batch-normalized opportunity. No I/O.
//!
//! Opportunity scores are min-max normalized per batch, so they are only
//! comparable within a single run's keyword set.

pub mod batch;
pub mod ctr;
pub mod difficulty;
pub mod opportunity;

pub use batch::score_batch;
pub use ctr::traffic_potential;
pub use difficulty::difficulty;
pub use opportunity::{normalize_batch, raw_opportunity};
