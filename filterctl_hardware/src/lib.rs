//! filterctl_hardware: motion-controller backends behind `filterctl_traits`.
//!
//! Features:
//! - `hardware`: enable the on-target backend that drives the motion
//!   controller through its C shim (see `onboard` module docs).
//! - (default) no `hardware` feature: use a dry-run controller that logs
//!   intended actions and satisfies the trait.

pub mod error;

#[cfg(not(feature = "hardware"))]
pub mod sim {
    use std::collections::BTreeMap;

    use filterctl_traits::{BoxError, MotionController};

    /// Dry-run motion controller: logs every command and keeps the last
    /// value written to each slot so callers can inspect intended actions.
    #[derive(Debug, Default)]
    pub struct DryRunMotionController {
        slots: BTreeMap<u16, i32>,
        executions: u64,
    }

    impl DryRunMotionController {
        pub fn new() -> Self {
            Self::default()
        }

        /// Last value written to `slot`, if any.
        pub fn position(&self, slot: u16) -> Option<i32> {
            self.slots.get(&slot).copied()
        }

        /// Number of program executions so far.
        pub fn executions(&self) -> u64 {
            self.executions
        }
    }

    impl MotionController for DryRunMotionController {
        fn set_position(&mut self, slot: u16, value: i32) -> Result<(), BoxError> {
            tracing::info!(slot, value, "dry-run: set position");
            self.slots.insert(slot, value);
            Ok(())
        }

        fn execute(&mut self, program: &str) -> Result<(), BoxError> {
            tracing::info!(program, "dry-run: execute program");
            self.executions += 1;
            Ok(())
        }
    }
}

#[cfg(feature = "hardware")]
pub mod onboard {
    //! On-target backend.
    //!
    //! The vendor runtime is reached through a two-function C shim that the
    //! target image links in:
    //!
    //! ```c
    //! int fctl_set_position(unsigned int slot, int value);
    //! int fctl_execute(const char *program);
    //! ```
    //!
    //! `fctl_set_position` writes a 32-bit integer into one of the shared
    //! position slots; `fctl_execute` starts a pre-loaded motion program by
    //! name and blocks until the controller has accepted it. Both return 0
    //! on success.

    use std::ffi::CString;
    use std::os::raw::{c_char, c_int, c_uint};

    use filterctl_traits::{BoxError, MotionController};

    use crate::error::MotionError;

    extern "C" {
        fn fctl_set_position(slot: c_uint, value: c_int) -> c_int;
        fn fctl_execute(program: *const c_char) -> c_int;
    }

    /// Motion controller backed by the on-target C shim.
    #[derive(Debug, Default)]
    pub struct OnboardMotionController;

    impl OnboardMotionController {
        pub fn new() -> Self {
            Self
        }
    }

    impl MotionController for OnboardMotionController {
        fn set_position(&mut self, slot: u16, value: i32) -> Result<(), BoxError> {
            let rc = unsafe { fctl_set_position(c_uint::from(slot), value) };
            if rc != 0 {
                return Err(Box::new(MotionError::Shim {
                    call: "fctl_set_position",
                    rc,
                }));
            }
            Ok(())
        }

        fn execute(&mut self, program: &str) -> Result<(), BoxError> {
            let name = CString::new(program)
                .map_err(|_| Box::new(MotionError::BadProgramName) as BoxError)?;
            let rc = unsafe { fctl_execute(name.as_ptr()) };
            if rc != 0 {
                return Err(Box::new(MotionError::Shim {
                    call: "fctl_execute",
                    rc,
                }));
            }
            Ok(())
        }
    }
}

// Re-exports so callers pick the right backend without cfg noise.
#[cfg(not(feature = "hardware"))]
pub use sim::DryRunMotionController;

#[cfg(feature = "hardware")]
pub use onboard::OnboardMotionController;
