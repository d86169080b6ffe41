use thiserror::Error;

/// Errors from the control surface. The audio path never produces one.
#[derive(Debug, Error)]
pub enum ShedError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("unknown parameter '{0}'")]
    UnknownParam(String),

    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),

    #[error("failed to spawn transport thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShedError>;
