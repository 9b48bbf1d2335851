use serde::{Deserialize, Serialize};

/// Semantic category of one probe outcome, as observed from the client side.
///
/// The table is fixed and independent of the request mode: the same status
/// means the same thing whether or not a failure was being injected at the
/// time. `Invalid` is recorded (and logged at the call site) but never fails
/// a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ResponseCategory {
    /// The real operation completed (200 or 201).
    Success,
    /// Deliberately degraded but successful response (202) returned while the
    /// target's protective mechanism is engaged.
    Fallback,
    /// Fast-fail rejection (503): the breaker refused to attempt the real
    /// operation.
    CircuitOpen,
    /// Server-side failure (500 or any other 5xx), timeout, or transport
    /// error.
    Failure,
    /// A status outside the contract. Counted, never fatal.
    Invalid,
}

impl ResponseCategory {
    pub const ALL: [ResponseCategory; 5] = [
        ResponseCategory::Success,
        ResponseCategory::Fallback,
        ResponseCategory::CircuitOpen,
        ResponseCategory::Failure,
        ResponseCategory::Invalid,
    ];

    /// The user got a usable answer: `Success` or `Fallback`.
    pub fn available(self) -> bool {
        matches!(self, ResponseCategory::Success | ResponseCategory::Fallback)
    }

    /// Only the real operation counts.
    pub fn is_success(self) -> bool {
        matches!(self, ResponseCategory::Success)
    }

    /// Outcomes that open (or keep open) the client-side view of the circuit.
    pub fn degraded(self) -> bool {
        matches!(self, ResponseCategory::Failure | ResponseCategory::CircuitOpen)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseCategory::Success => "success",
            ResponseCategory::Fallback => "fallback",
            ResponseCategory::CircuitOpen => "circuit_open",
            ResponseCategory::Failure => "failure",
            ResponseCategory::Invalid => "invalid",
        }
    }
}

/// Classify an HTTP status code.
///
/// `200 | 201` → `Success`, `202` → `Fallback`, `503` → `CircuitOpen`, any
/// other `5xx` → `Failure`, everything else → `Invalid`.
pub fn classify(status: u16) -> ResponseCategory {
    match status {
        200 | 201 => ResponseCategory::Success,
        202 => ResponseCategory::Fallback,
        503 => ResponseCategory::CircuitOpen,
        s if s >= 500 => ResponseCategory::Failure,
        _ => ResponseCategory::Invalid,
    }
}
