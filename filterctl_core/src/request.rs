//! Typed control requests, responses and the status snapshot.
//!
//! Incoming payloads are parsed strictly: an unknown command, a missing
//! `params` object or a type error anywhere in a configure payload is a
//! command failure, never a crash.

use serde::{Deserialize, Serialize};

use crate::attenuation::FILTER_COUNT;
use crate::histogram::ThresholdSet;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Shutdown,
    Reset,
    ClearError,
    Singleshot,
    Status,
    Configure { params: ConfigDelta },
}

/// Optional keys of a `configure` request, applied in declaration order.
/// The overall success of the request is the result of the last key applied.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDelta {
    pub mode: Option<i64>,
    pub in_positions: Option<PositionDelta>,
    pub out_positions: Option<PositionDelta>,
    pub pixel_count_thresholds: Option<ThresholdDelta>,
    pub attenuation: Option<i64>,
    pub timeout: Option<f64>,
}

/// Sparse per-filter position update.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionDelta {
    pub filter1: Option<i32>,
    pub filter2: Option<i32>,
    pub filter3: Option<i32>,
    pub filter4: Option<i32>,
}

impl PositionDelta {
    /// Apply the present keys; returns true if at least one was applied.
    pub fn apply(&self, positions: &mut [i32; FILTER_COUNT]) -> bool {
        let mut applied = false;
        for (slot, value) in positions.iter_mut().zip([
            self.filter1,
            self.filter2,
            self.filter3,
            self.filter4,
        ]) {
            if let Some(value) = value {
                *slot = value;
                applied = true;
            }
        }
        applied
    }
}

/// Sparse per-bin threshold update.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdDelta {
    pub low1: Option<u64>,
    pub low2: Option<u64>,
    pub high1: Option<u64>,
    pub high2: Option<u64>,
    pub high3: Option<u64>,
}

impl ThresholdDelta {
    /// Apply the present keys; returns true if at least one was applied.
    pub fn apply(&self, thresholds: &mut ThresholdSet) -> bool {
        let mut applied = false;
        let updates = [
            (&mut thresholds.low1, self.low1),
            (&mut thresholds.low2, self.low2),
            (&mut thresholds.high1, self.high1),
            (&mut thresholds.high2, self.high2),
            (&mut thresholds.high3, self.high3),
        ];
        for (slot, value) in updates {
            if let Some(value) = value {
                *slot = value;
                applied = true;
            }
        }
        applied
    }
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusSnapshot>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            status: None,
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            status: None,
        }
    }

    pub fn with_status(status: StatusSnapshot) -> Self {
        Self {
            success: true,
            status: Some(status),
        }
    }
}

/// Point-in-time view of the engine, attached to `status` responses.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub version: String,
    /// Smoothed per-frame processing time, microseconds.
    pub process_duration: u64,
    /// Gap between the last two successful processes, microseconds.
    pub process_period: u64,
    pub last_received_frame: i64,
    pub last_processed_frame: i64,
    /// Seconds since the last data message, 0 when none was ever received.
    pub time_since_last_message: f64,
    pub current_attenuation: i32,
    pub timeout: f64,
    pub state: i8,
    pub mode: u8,
    pub in_positions: [i32; FILTER_COUNT],
    pub out_positions: [i32; FILTER_COUNT],
    pub pixel_count_thresholds: ThresholdSet,
}
