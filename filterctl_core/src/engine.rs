//! The control engine: shared controller state, request dispatch, the
//! per-message pipeline and the state-machine pass.
//!
//! A [`FilterController`] is shared between exactly two threads: the control
//! thread (request/reply) and the data thread (state machine + message
//! pipeline). The boolean flags are atomics consumed by the data thread; the
//! rest of the state sits behind a single mutex. Motion is commanded only
//! from the data thread, except for the MANUAL-only `attenuation` configure
//! path, which is mutually exclusive with automatic adjustment by mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use filterctl_traits::{Clock, EventSink, MonotonicClock, MotionController};

use crate::attenuation::{
    clamp_level, Demand, FILTER_COUNT, FINAL_SLOTS, MAX_ATTENUATION, POST_IN_SLOTS,
};
use crate::error::BuildError;
use crate::events::FrameEvent;
use crate::histogram::{self, DataMessage, ThresholdSet};
use crate::request::{ConfigDelta, Request, Response, StatusSnapshot};
use crate::state::{self, entry_demands_max, ControlMode, ControlState, Inputs};

/// Sentinel for the frame cursors; any frame number >= 0 passes gating.
pub const NO_FRAMES_PROCESSED: i64 = -2;

/// Engine configuration applied at construction time. Everything here can
/// also be changed at runtime through `configure` requests, except the
/// program names.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: ControlMode,
    /// Data-starvation timeout, seconds.
    pub timeout: f64,
    pub in_positions: [i32; FILTER_COUNT],
    pub out_positions: [i32; FILTER_COUNT],
    pub thresholds: ThresholdSet,
    /// Name of the pre-loaded two-step move program.
    pub move_program: String,
    /// Name of the pre-loaded shutter-close program.
    pub shutter_program: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ControlMode::Manual,
            timeout: 3.0,
            in_positions: [0; FILTER_COUNT],
            out_positions: [0; FILTER_COUNT],
            thresholds: ThresholdSet::default(),
            move_program: "filter_move".to_string(),
            shutter_program: "close_shutter".to_string(),
        }
    }
}

/// Shared controller object. Construct with [`FilterController::builder`].
pub struct FilterController<M: MotionController> {
    inner: Mutex<Engine<M>>,
    shutdown: AtomicBool,
    clear_error: AtomicBool,
    singleshot_start: AtomicBool,
}

struct Engine<M> {
    motion: M,
    clock: Arc<dyn Clock + Send + Sync>,

    mode: ControlMode,
    state: ControlState,
    timeout: f64,
    in_positions: [i32; FILTER_COUNT],
    out_positions: [i32; FILTER_COUNT],
    thresholds: ThresholdSet,
    move_program: String,
    shutter_program: String,

    current_attenuation: i32,
    current_demand: Demand,
    last_received_frame: i64,
    last_processed_frame: i64,
    last_adjustment: i32,

    process_duration_us: u64,
    process_period_us: u64,
    last_message_at: Option<Instant>,
    last_process_at: Option<Instant>,
}

pub struct FilterControllerBuilder<M> {
    motion: Option<M>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    config: EngineConfig,
}

impl<M: MotionController> Default for FilterControllerBuilder<M> {
    fn default() -> Self {
        Self {
            motion: None,
            clock: None,
            config: EngineConfig::default(),
        }
    }
}

impl<M: MotionController> FilterControllerBuilder<M> {
    pub fn with_motion(mut self, motion: M) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mode(mut self, mode: ControlMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.config.timeout = seconds;
        self
    }

    pub fn with_in_positions(mut self, positions: [i32; FILTER_COUNT]) -> Self {
        self.config.in_positions = positions;
        self
    }

    pub fn with_out_positions(mut self, positions: [i32; FILTER_COUNT]) -> Self {
        self.config.out_positions = positions;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdSet) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn build(self) -> Result<FilterController<M>, BuildError> {
        let motion = self.motion.ok_or(BuildError::MissingMotion)?;
        if !self.config.timeout.is_finite() || self.config.timeout < 0.0 {
            return Err(BuildError::InvalidConfig("timeout must be >= 0"));
        }
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        Ok(FilterController {
            inner: Mutex::new(Engine {
                motion,
                clock,
                mode: self.config.mode,
                state: ControlState::Idle,
                timeout: self.config.timeout,
                in_positions: self.config.in_positions,
                out_positions: self.config.out_positions,
                thresholds: self.config.thresholds,
                move_program: self.config.move_program,
                shutter_program: self.config.shutter_program,
                current_attenuation: 0,
                current_demand: Demand::default(),
                last_received_frame: NO_FRAMES_PROCESSED,
                last_processed_frame: NO_FRAMES_PROCESSED,
                last_adjustment: 0,
                process_duration_us: 0,
                process_period_us: 0,
                last_message_at: None,
                last_process_at: None,
            }),
            shutdown: AtomicBool::new(false),
            clear_error: AtomicBool::new(false),
            singleshot_start: AtomicBool::new(false),
        })
    }
}

impl<M: MotionController> FilterController<M> {
    pub fn builder() -> FilterControllerBuilder<M> {
        FilterControllerBuilder::default()
    }

    /// Recover the engine even if a panicked holder poisoned the mutex.
    fn engine(&self) -> MutexGuard<'_, Engine<M>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Parse and dispatch one control request, producing the reply.
    pub fn handle_request(&self, raw: &[u8]) -> Response {
        let request: Request = match serde_json::from_slice(raw) {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(%error, "rejecting malformed control request");
                return Response::failure();
            }
        };

        match request {
            Request::Shutdown => {
                tracing::info!("shutdown requested");
                self.request_shutdown();
                Response::ok()
            }
            Request::Reset => {
                let mut engine = self.engine();
                engine.last_received_frame = NO_FRAMES_PROCESSED;
                engine.last_processed_frame = NO_FRAMES_PROCESSED;
                tracing::info!("frame cursors reset");
                Response::ok()
            }
            Request::ClearError => {
                let engine = self.engine();
                if engine.state.is_error() {
                    self.clear_error.store(true, Ordering::SeqCst);
                    Response::ok()
                } else {
                    tracing::warn!(state = engine.state.code(), "no error to clear");
                    Response::failure()
                }
            }
            Request::Singleshot => {
                self.singleshot_start.store(true, Ordering::SeqCst);
                Response::ok()
            }
            Request::Status => Response::with_status(self.engine().snapshot()),
            Request::Configure { params } => {
                let success = self.engine().apply_config(&params);
                Response {
                    success,
                    status: None,
                }
            }
        }
    }

    /// One state-machine pass; called by the data loop every iteration.
    pub fn tick(&self) {
        let mut engine = self.engine();
        let inputs = Inputs {
            timed_out: engine.timed_out(),
            clear_error: self.clear_error.load(Ordering::SeqCst),
            singleshot_start: self.singleshot_start.load(Ordering::SeqCst),
            singleshot_stable: engine.singleshot_stable(),
        };
        let transition = state::step(engine.state, engine.mode, inputs);
        if transition.consumed_clear_error {
            self.clear_error.store(false, Ordering::SeqCst);
        }
        if transition.consumed_singleshot_start {
            self.singleshot_start.store(false, Ordering::SeqCst);
        }
        if transition.next != engine.state {
            tracing::info!(
                from = engine.state.code(),
                to = transition.next.code(),
                "state transition"
            );
            engine.state = transition.next;
        }
        if transition.demand_max {
            engine.move_to(MAX_ATTENUATION);
        }
    }

    /// Run one data message through the pipeline. Outside the monitoring
    /// states the message has already served its purpose (draining the
    /// socket) and is dropped.
    pub fn process_message<E: EventSink>(&self, payload: &[u8], events: &mut E) {
        let mut engine = self.engine();
        if !matches!(engine.state, ControlState::Waiting | ControlState::Active) {
            tracing::trace!(state = engine.state.code(), "discarding data message");
            return;
        }
        let process_start = engine.clock.now();
        let message: DataMessage = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "dropping malformed data message");
                return;
            }
        };
        engine.handle_frame(message, process_start, events);
    }

    pub fn status(&self) -> StatusSnapshot {
        self.engine().snapshot()
    }

    pub fn state(&self) -> ControlState {
        self.engine().state
    }

    pub fn mode(&self) -> ControlMode {
        self.engine().mode
    }

    pub fn attenuation(&self) -> i32 {
        self.engine().current_attenuation
    }

    pub fn last_received_frame(&self) -> i64 {
        self.engine().last_received_frame
    }

    pub fn last_processed_frame(&self) -> i64 {
        self.engine().last_processed_frame
    }
}

impl<M: MotionController> Engine<M> {
    /// Apply a configure delta, key by key, in fixed order. The overall
    /// result is the result of the last evaluated key; a configure with no
    /// recognized keys fails.
    fn apply_config(&mut self, delta: &ConfigDelta) -> bool {
        let mut success = false;

        if let Some(code) = delta.mode {
            success = match ControlMode::from_code(code) {
                Some(mode) => {
                    tracing::info!(mode = mode.code(), "mode changed");
                    self.mode = mode;
                    true
                }
                None => {
                    tracing::warn!(code, "rejecting out-of-range mode");
                    false
                }
            };
        }
        if let Some(positions) = &delta.in_positions {
            success = positions.apply(&mut self.in_positions);
        }
        if let Some(positions) = &delta.out_positions {
            success = positions.apply(&mut self.out_positions);
        }
        if let Some(thresholds) = &delta.pixel_count_thresholds {
            success = thresholds.apply(&mut self.thresholds);
        }
        if let Some(level) = delta.attenuation {
            success = if self.mode == ControlMode::Manual {
                self.move_to(clamp_level(level.clamp(0, i64::from(i32::MAX)) as i32));
                true
            } else {
                tracing::warn!("attenuation can only be set in manual mode");
                false
            };
        }
        if let Some(timeout) = delta.timeout {
            success = if timeout.is_finite() && timeout >= 0.0 {
                self.timeout = timeout;
                true
            } else {
                tracing::warn!(timeout, "rejecting invalid timeout");
                false
            };
        }

        success
    }

    /// Starvation check: whole elapsed seconds at or past the timeout. The
    /// elapsed value is floored, so a fractional timeout only trips once the
    /// next full second has passed.
    fn timed_out(&self) -> bool {
        match self.last_message_at {
            Some(at) => {
                let elapsed = self.clock.now().saturating_duration_since(at);
                elapsed.as_secs_f64().floor() >= self.timeout
            }
            None => false,
        }
    }

    /// Two frames arrived without a new adjustment, or attenuation is fully
    /// out: nothing left for a singleshot run to do.
    fn singleshot_stable(&self) -> bool {
        self.last_received_frame >= self.last_processed_frame + 2
            || self.current_attenuation == 0
    }

    /// State change from within the message pipeline, with the same
    /// fail-to-attenuated entry effect as the state-machine pass.
    fn transition_to(&mut self, next: ControlState) {
        if next == self.state {
            return;
        }
        tracing::info!(from = self.state.code(), to = next.code(), "state transition");
        let demand_max = entry_demands_max(self.state, next);
        self.state = next;
        if demand_max {
            self.move_to(MAX_ATTENUATION);
        }
    }

    fn handle_frame<E: EventSink>(
        &mut self,
        message: DataMessage,
        process_start: Instant,
        events: &mut E,
    ) {
        let frame = message.frame_number;
        self.last_received_frame = frame;
        self.last_message_at = Some(self.clock.now());

        self.publish_event(
            events,
            FrameEvent {
                frame_number: frame,
                adjustment: self.last_adjustment,
                attenuation: self.current_attenuation,
            },
        );

        // First message while waiting arms the timeout monitor.
        if self.state == ControlState::Waiting {
            self.transition_to(ControlState::Active);
        }

        let histogram = message.parameters;
        if histogram::catastrophic(&histogram, &self.thresholds) {
            tracing::error!(
                frame,
                count = histogram.high3,
                threshold = self.thresholds.high3,
                "catastrophic pixel count; closing shutter"
            );
            if let Err(error) = self.motion.execute(&self.shutter_program) {
                tracing::warn!(%error, "shutter-close command failed");
            }
            self.transition_to(ControlState::High3Triggered);
            return;
        }

        if frame <= self.last_processed_frame {
            tracing::debug!(
                frame,
                last_processed = self.last_processed_frame,
                "ignoring frame already processed"
            );
            return;
        }
        if frame == self.last_processed_frame + 1 {
            // The previous adjustment cannot have taken effect yet.
            tracing::debug!(frame, "ignoring subsequent frame");
            return;
        }

        match histogram::evaluate(&histogram, &self.thresholds) {
            Some((bin, delta)) => {
                tracing::info!(frame, bin = bin.as_str(), delta, "threshold triggered");
                let target = clamp_level(self.current_attenuation + delta);
                self.move_to(target);
                self.last_processed_frame = frame;
                self.last_adjustment = delta;

                let now = self.clock.now();
                if let Some(previous) = self.last_process_at {
                    self.process_period_us =
                        now.saturating_duration_since(previous).as_micros() as u64;
                }
                self.last_process_at = Some(now);
                let duration = now.saturating_duration_since(process_start).as_micros() as u64;
                self.process_duration_us = (self.process_duration_us + duration) / 2;
            }
            None => {
                self.last_adjustment = 0;
            }
        }
    }

    fn publish_event<E: EventSink>(&self, events: &mut E, event: FrameEvent) {
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                if let Err(error) = events.publish(&payload) {
                    tracing::warn!(%error, "event publish failed");
                }
            }
            Err(error) => tracing::warn!(%error, "event encode failed"),
        }
    }

    /// Execute the two-step move to `level`: post-in positions into the
    /// first slot bank, final positions into the second, then run the move
    /// program once. A demand identical to the current one is a no-op.
    fn move_to(&mut self, level: i32) {
        let level = clamp_level(level);
        let final_demand = Demand::from_level(level);
        if level == self.current_attenuation && final_demand == self.current_demand {
            tracing::trace!(level, "attenuation already at demanded level");
            return;
        }
        let post_in_demand = final_demand.or(&self.current_demand);
        let post_in_positions = post_in_demand.positions(&self.in_positions, &self.out_positions);
        let final_positions = final_demand.positions(&self.in_positions, &self.out_positions);

        for (slot, value) in POST_IN_SLOTS.iter().zip(post_in_positions) {
            self.write_position(*slot, value);
        }
        for (slot, value) in FINAL_SLOTS.iter().zip(final_positions) {
            self.write_position(*slot, value);
        }
        if let Err(error) = self.motion.execute(&self.move_program) {
            tracing::warn!(%error, program = %self.move_program, "move program failed");
        }

        self.current_demand = final_demand;
        self.current_attenuation = level;
        tracing::debug!(level, "attenuation move executed");
    }

    fn write_position(&mut self, slot: u16, value: i32) {
        if let Err(error) = self.motion.set_position(slot, value) {
            tracing::warn!(slot, value, %error, "position write failed");
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            process_duration: self.process_duration_us,
            process_period: self.process_period_us,
            last_received_frame: self.last_received_frame,
            last_processed_frame: self.last_processed_frame,
            time_since_last_message: self
                .last_message_at
                .map(|at| self.clock.now().saturating_duration_since(at).as_secs_f64())
                .unwrap_or(0.0),
            current_attenuation: self.current_attenuation,
            timeout: self.timeout,
            state: self.state.code(),
            mode: self.mode.code(),
            in_positions: self.in_positions,
            out_positions: self.out_positions,
            pixel_count_thresholds: self.thresholds,
        }
    }
}
