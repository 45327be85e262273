use thiserror::Error;

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("{call} failed with status {rc}")]
    Shim { call: &'static str, rc: i32 },
    #[error("program name contains an interior NUL byte")]
    BadProgramName,
}
