//! Per-provider admission control: concurrency caps, minimum call spacing,
//! and circuit breaking, per §4.B of the design.

pub mod circuit;
pub mod error;
pub mod limiter;

pub use circuit::{CircuitBreaker, CircuitState};
pub use error::RateLimitError;
pub use limiter::{RateLimiter, Ticket};
