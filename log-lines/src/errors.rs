//! Errors of the line-parsing front end.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to compile log format {spec:?}: {reason}")]
    BadFormatSpec { spec: String, reason: String },

    #[error("Failed to compile masking rule {pattern:?}")]
    BadMaskRule {
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },

    #[error("Parsing was cancelled")]
    Cancelled,
}
