//! Per-build progress event topics, per §4.J of the design.

pub mod bus;
pub mod error;

pub use bus::{ProgressBus, Subscription};
pub use error::BusError;
