use serde::{Deserialize, Serialize};

/// Typed outcome of a failed producer invocation.
///
/// Drives the fallback gate's decision to try the next producer or surface
/// a hard error once the preference list is exhausted:
/// - `ProducerNotFound` and `Timeout` are environmental (missing binary,
///   hung or silent process)
/// - `ProducerError` means the producer answered with a known error shape
///   (rate limit, quota, auth)
/// - `OutputInvalid` means the producer ran but its result is unusable
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackSignal {
    /// Producer binary is not installed or not on PATH.
    ProducerNotFound,

    /// Producer exceeded its invocation timeout, or returned nothing.
    Timeout,

    /// Producer output matched a known error pattern (rate limit, quota,
    /// authentication failure).
    ProducerError,

    /// Producer exited abnormally without a recognized error pattern.
    OutputInvalid,
}

impl std::fmt::Display for FallbackSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackSignal::ProducerNotFound => write!(f, "producer_not_found"),
            FallbackSignal::Timeout => write!(f, "timeout"),
            FallbackSignal::ProducerError => write!(f, "producer_error"),
            FallbackSignal::OutputInvalid => write!(f, "output_invalid"),
        }
    }
}
