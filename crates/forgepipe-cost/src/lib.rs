//! Cost Tracker and Cost Controller: rolling aggregation of call spend and
//! the admission policy layered on top of it, per §4.E/§4.F of the design.

pub mod controller;
pub mod error;
pub mod tracker;

pub use controller::{Admission, BuildCostContext, CallCostContext, CostAlert, CostController};
pub use error::CostError;
pub use tracker::{CostFilter, CostSummary, CostTracker};
