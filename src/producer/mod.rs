//! Multi-Producer Fallback Gate.
//!
//! External work-producers are interchangeable CLI backends. The gate is
//! their sole caller: it probes availability, invokes with a timeout, and
//! degrades gracefully through the configured preference order.

pub mod gate;
pub mod types;

pub use gate::{FallbackGate, FallbackOutcome, InvocationAttempt};
pub use types::{matches_error_pattern, ProducerSpec, TaskSpec, ERROR_PATTERNS};
