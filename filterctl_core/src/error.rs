use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ControlError {
    #[error("malformed request: {0}")]
    Request(String),
    #[error("malformed data message: {0}")]
    Data(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motion controller")]
    MissingMotion,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
