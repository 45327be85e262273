//! Outbound telemetry events, one per accepted data message.

use serde::{Deserialize, Serialize};

/// Published after every schema-valid data message. `adjustment` and
/// `attenuation` are read on arrival, before the frame's own evaluation, so
/// they describe the level in effect while the frame was being exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEvent {
    pub frame_number: i64,
    pub adjustment: i32,
    pub attenuation: i32,
}
