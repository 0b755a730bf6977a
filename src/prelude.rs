use std::{fmt, io};

/// Error type for letter_nn
#[derive(Debug)]
pub enum Error {
    /// Indicates some dimension is incorrect in a matrix or network operation.
    DimensionErr,
    /// The underlying dataset or configuration stream failed.
    Io(io::Error),
    /// A dataset line is missing its separator or holds an invalid field.
    MalformedRecord { line: u64 },
    /// The reader could not produce a record even after rewinding.
    RewindFailed,
    /// The operation needs an initialized network.
    NoNetwork,
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DimensionErr => write!(f, "dimension mismatch"),
            Error::Io(e) => write!(f, "io error: {e}"),
            Error::MalformedRecord { line } => {
                write!(f, "malformed dataset record at line {line}")
            }
            Error::RewindFailed => write!(f, "no record readable even after rewind"),
            Error::NoNetwork => write!(f, "network is not initialized"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
