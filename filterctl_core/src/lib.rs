#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core control engine for the beam-attenuation filter set (transport- and
//! hardware-agnostic).
//!
//! All hardware interaction goes through `filterctl_traits::MotionController`
//! and all I/O through the transport traits, so the whole engine can be
//! exercised in-process with the mocks in [`mocks`].
//!
//! ## Architecture
//!
//! - **Attenuation**: level encoding and the staged two-step move
//!   (`attenuation` module)
//! - **Histograms**: pixel-count bins and the threshold evaluator
//!   (`histogram` module)
//! - **State machine**: mode/state transitions as a pure function (`state`)
//! - **Requests**: typed control commands and the status snapshot (`request`)
//! - **Engine**: the shared controller, request dispatch and the per-message
//!   pipeline (`engine`)
//! - **Runner**: the control and data loops (`runner`)

pub mod attenuation;
pub mod engine;
pub mod error;
pub mod events;
pub mod histogram;
pub mod mocks;
pub mod request;
pub mod runner;
pub mod state;

pub use attenuation::{Demand, FILTER_COUNT, MAX_ATTENUATION, MIN_ATTENUATION};
pub use engine::{EngineConfig, FilterController, FilterControllerBuilder, NO_FRAMES_PROCESSED};
pub use events::FrameEvent;
pub use histogram::{Bin, DataMessage, Histogram, ThresholdSet};
pub use request::{ConfigDelta, Request, Response, StatusSnapshot};
pub use state::{ControlMode, ControlState};
