//! Job-level errors.
//!
//! Front-end failures bubble up from the `log-lines` crate; cancellation and
//! I/O are flattened into the job-level kinds so the pool can translate them
//! into events without digging through sources.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Parsing was cancelled")]
    Cancelled,

    #[error(transparent)]
    Frontend(log_lines::errors::Error),

    #[error("Invalid parser configuration: {0}")]
    BadConfig(String),

    #[error("Unknown algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("Unknown preset {0:?}")]
    UnknownPreset(String),

    #[error("Destination table {0:?} already exists")]
    OutputConflict(String),

    #[error("Failed to parse toml config")]
    Toml(#[from] toml::de::Error),

    #[error("Pool was killed, submission refused")]
    PoolKilled,
}

impl From<log_lines::errors::Error> for Error {
    fn from(e: log_lines::errors::Error) -> Self {
        use log_lines::errors::Error as Frontend;
        match e {
            Frontend::Cancelled => Self::Cancelled,
            Frontend::Io(io) => Self::Io(io),
            other => Self::Frontend(other),
        }
    }
}

impl Error {
    /// `true` for the cooperative-cancellation abort, which the pool reports
    /// as an interruption rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
