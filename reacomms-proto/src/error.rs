use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("command {index} out of range for a batch of {len} commands")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("malformed {tag} row, field {field}: {reason}")]
    MalformedRow {
        tag: String,
        field: usize,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
