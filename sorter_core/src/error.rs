use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SorterError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("model error: {0}")]
    Model(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing colour sensor")]
    MissingColorSensor,
    #[error("missing servo")]
    MissingServo,
    #[error("missing bean source")]
    MissingSource,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
