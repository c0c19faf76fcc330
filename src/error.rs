//! Crate-level error type.
//!
//! Every failure is fatal to the run that raised it.  Callers propagate with
//! `?` up to the binary, which alone decides how to report and exit.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    DescriptorInconsistency,
    UnsupportedCompressionType,
    IoFailure,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Bad ROM magic: expected 80371240, found {found}")]
    BadMagic { found: String },

    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Segment reference {name} (end={end}) has conflicting values {first:#010x} and {second:#010x}")]
    SegRefMismatch { name: String, end: bool, first: u32, second: u32 },

    #[error("Segment {0} has no start reference")]
    UnknownSegment(String),

    #[error("Invalid game descriptor: {0}")]
    Descriptor(String),

    #[error("Invalid dump listing: {0}")]
    Listing(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{}: {source}", path.display())]
    FileIo { path: PathBuf, source: io::Error },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker pool error: {0}")]
    Scheduler(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadMagic { .. } | Error::Malformed(_) => ErrorKind::MalformedInput,
            Error::Codec(CodecError::UnsupportedType(_)) => ErrorKind::UnsupportedCompressionType,
            Error::Codec(CodecError::Io(_))              => ErrorKind::IoFailure,
            Error::Codec(_)                              => ErrorKind::MalformedInput,
            Error::SegRefMismatch { .. }
            | Error::UnknownSegment(_)
            | Error::Descriptor(_)
            | Error::Listing(_)
            | Error::Json(_)                             => ErrorKind::DescriptorInconsistency,
            Error::FileIo { .. } | Error::Io(_) | Error::Scheduler(_) => ErrorKind::IoFailure,
        }
    }

    /// Wrap an I/O error with the path it concerns.
    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::FileIo { path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Error::Codec(CodecError::UnsupportedType(7)).kind(), ErrorKind::UnsupportedCompressionType);
        assert_eq!(Error::Codec(CodecError::Oversized { raw_size: 1 }).kind(), ErrorKind::MalformedInput);
        assert_eq!(Error::UnknownSegment("x".into()).kind(), ErrorKind::DescriptorInconsistency);
        let io = Error::file("a.bin", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.kind(), ErrorKind::IoFailure);
        assert!(io.to_string().starts_with("a.bin"));
    }
}
