pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Boxed error type used at capability boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Motion-controller capability: 8 integer position slots and execution of
/// pre-loaded, named motion programs.
///
/// Calls are best-effort from the engine's point of view; implementations
/// should block until the command has been accepted (on target hardware the
/// program execution itself is blocking).
pub trait MotionController {
    /// Write `value` into the device position slot `slot`.
    fn set_position(&mut self, slot: u16, value: i32) -> Result<(), BoxError>;

    /// Execute the pre-loaded motion program named `program`.
    fn execute(&mut self, program: &str) -> Result<(), BoxError>;
}

/// Synchronous request/reply channel for control commands.
///
/// `recv` blocks with no timeout; every received request must be answered
/// with exactly one `send` before the next `recv`.
pub trait ControlChannel {
    fn recv(&mut self) -> Result<Vec<u8>, BoxError>;
    fn send(&mut self, reply: &str) -> Result<(), BoxError>;
}

/// Multi-endpoint subscribe channel for data messages.
///
/// The transport keeps only the newest pending message per endpoint; older
/// messages are dropped before they are ever seen by the consumer.
pub trait DataChannel {
    /// Number of connected endpoints.
    fn endpoints(&self) -> usize;

    /// Wait up to `timeout` for messages, returning the indices of endpoints
    /// with a message ready.
    fn poll(&mut self, timeout: Duration) -> Result<Vec<usize>, BoxError>;

    /// Receive the newest pending message from endpoint `index`, if any.
    fn recv(&mut self, index: usize) -> Result<Option<Vec<u8>>, BoxError>;
}

/// Fire-and-forget publish channel for telemetry events.
pub trait EventSink {
    fn publish(&mut self, payload: &[u8]) -> Result<(), BoxError>;
}
