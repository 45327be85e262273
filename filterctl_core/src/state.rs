//! Mode and state machine for the control engine.
//!
//! The transition logic is a pure function over the current state, the
//! requested mode and a snapshot of the relevant inputs; side effects are
//! reported back to the caller as flags on the returned [`Transition`].

/// Operator-requested intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Data channel drained but ignored; attenuation only changes explicitly.
    Manual,
    /// Process frames indefinitely, with a data-starvation timeout.
    Continuous,
    /// One run: attenuate to MAX, servo down until stable, then hold.
    Singleshot,
}

impl ControlMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ControlMode::Manual),
            1 => Some(ControlMode::Continuous),
            2 => Some(ControlMode::Singleshot),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ControlMode::Manual => 0,
            ControlMode::Continuous => 1,
            ControlMode::Singleshot => 2,
        }
    }
}

/// Internal engine state. Negative codes form the error region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ControlState {
    /// Catastrophic bin exceeded; shutter closed.
    High3Triggered = -2,
    /// No messages within the configured timeout.
    Timeout = -1,
    /// Not monitoring.
    Idle = 0,
    /// At MAX attenuation, awaiting the first message.
    Waiting = 1,
    /// Processing messages.
    Active = 2,
    /// Singleshot mode, awaiting start.
    SingleshotWaiting = 3,
    /// Singleshot stabilized; holding attenuation.
    SingleshotComplete = 4,
}

impl ControlState {
    #[inline]
    pub fn code(self) -> i8 {
        self as i8
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self.code() < 0
    }
}

/// Inputs sampled once per data-loop iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inputs {
    /// Seconds since the last message reached the configured timeout.
    pub timed_out: bool,
    /// Operator requested an error clear.
    pub clear_error: bool,
    /// Operator requested a singleshot run.
    pub singleshot_start: bool,
    /// Singleshot stability: two frames arrived without a new adjustment,
    /// or the attenuation reached zero.
    pub singleshot_stable: bool,
}

/// Outcome of one state-machine pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: ControlState,
    /// Demand MAX attenuation (fail-to-attenuated side effect).
    pub demand_max: bool,
    /// The clear-error flag was consumed and must be reset.
    pub consumed_clear_error: bool,
    /// The singleshot-start flag was consumed and must be reset.
    pub consumed_singleshot_start: bool,
}

/// Whether moving from `from` to `to` demands MAX attenuation: entering the
/// error region, or entering a waiting state from a non-error state.
#[inline]
pub fn entry_demands_max(from: ControlState, to: ControlState) -> bool {
    to != from
        && (to.is_error()
            || (matches!(
                to,
                ControlState::Waiting | ControlState::SingleshotWaiting
            ) && !from.is_error()))
}

/// Run one pass of the state machine.
pub fn step(current: ControlState, mode: ControlMode, inputs: Inputs) -> Transition {
    let mut transition = Transition {
        next: current,
        demand_max: false,
        consumed_clear_error: false,
        consumed_singleshot_start: false,
    };

    match mode {
        ControlMode::Manual => advance(&mut transition, ControlState::Idle),
        ControlMode::Continuous => {
            if matches!(
                transition.next,
                ControlState::Idle
                    | ControlState::SingleshotWaiting
                    | ControlState::SingleshotComplete
            ) {
                advance(&mut transition, ControlState::Waiting);
            }
        }
        ControlMode::Singleshot => {
            if matches!(
                transition.next,
                ControlState::Idle | ControlState::Waiting
            ) {
                advance(&mut transition, ControlState::SingleshotWaiting);
            }
            if transition.next == ControlState::Active && inputs.singleshot_stable {
                advance(&mut transition, ControlState::SingleshotComplete);
                transition.consumed_singleshot_start = true;
            } else if inputs.singleshot_start
                && matches!(
                    transition.next,
                    ControlState::SingleshotWaiting | ControlState::SingleshotComplete
                )
            {
                advance(&mut transition, ControlState::Waiting);
            }
        }
    }

    if matches!(
        transition.next,
        ControlState::Active | ControlState::SingleshotComplete
    ) && inputs.timed_out
    {
        advance(&mut transition, ControlState::Timeout);
    } else if transition.next.is_error() && inputs.clear_error {
        transition.consumed_clear_error = true;
        let resume = if mode == ControlMode::Singleshot {
            ControlState::SingleshotWaiting
        } else {
            ControlState::Waiting
        };
        advance(&mut transition, resume);
    }

    transition
}

fn advance(transition: &mut Transition, to: ControlState) {
    if transition.next == to {
        return;
    }
    if entry_demands_max(transition.next, to) {
        transition.demand_max = true;
    }
    transition.next = to;
}
