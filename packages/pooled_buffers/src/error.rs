use std::io;

use thiserror::Error;

/// Errors that can occur when working with pooled buffers, buffer writers and the stream
/// adapters built on top of them.
///
/// The variants separate bad input ([`OutOfRange`][Error::OutOfRange],
/// [`InvalidArgument`][Error::InvalidArgument]) from lifecycle misuse
/// ([`Disposed`][Error::Disposed]), structurally meaningless operations
/// ([`NotSupported`][Error::NotSupported]) and cancellation ([`Cancelled`][Error::Cancelled]).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A size, offset or position was outside the range the operation accepts.
    #[error("'{parameter}' is out of range: {problem}")]
    OutOfRange {
        /// Name of the offending parameter.
        parameter: &'static str,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// An argument was in range on its own but could not be honored, e.g. a write larger
    /// than the remaining capacity of a fixed-size region.
    #[error("invalid '{parameter}': {problem}")]
    InvalidArgument {
        /// Name of the offending parameter.
        parameter: &'static str,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// The object was already disposed and its backing memory released.
    #[error("cannot access a disposed {type_name}")]
    Disposed {
        /// Short name of the disposed type.
        type_name: &'static str,
    },

    /// The operation is not meaningful for this object, e.g. reading from a write-only stream.
    #[error("the requested operation is not supported by this object")]
    NotSupported,

    /// The cancellation token passed to an async-shaped operation was already cancelled.
    #[error("the operation was cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn out_of_range(parameter: &'static str, problem: impl Into<String>) -> Self {
        Self::OutOfRange {
            parameter,
            problem: problem.into(),
        }
    }

    pub(crate) fn invalid_argument(parameter: &'static str, problem: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter,
            problem: problem.into(),
        }
    }

    pub(crate) const fn disposed(type_name: &'static str) -> Self {
        Self::Disposed { type_name }
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        let kind = match value {
            Error::OutOfRange { .. } | Error::InvalidArgument { .. } => io::ErrorKind::InvalidInput,
            Error::NotSupported => io::ErrorKind::Unsupported,
            Error::Disposed { .. } | Error::Cancelled => io::ErrorKind::Other,
        };

        Self::new(kind, value)
    }
}

/// A specialized `Result` type for buffer operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
