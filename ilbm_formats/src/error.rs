use std::collections::TryReserveError;

use thiserror::Error;

/// Failures raised by the container, codec and layout helpers.
#[derive(Debug, Error)]
pub enum IlbmError {
    #[error("malformed IFF container: {0}")]
    Format(String),
    #[error(
        "input is {actual} bytes, expected {expected} (or {expected_with_palette} with a trailing palette)"
    )]
    SizeMismatch {
        actual: usize,
        expected: usize,
        expected_with_palette: usize,
    },
    #[error("unsupported BMHD compression {0} (expected 0 or 1)")]
    UnsupportedCompression(u8),
    #[error("row {row} decoded to {produced} bytes, expected {expected}")]
    TruncatedData {
        row: usize,
        produced: usize,
        expected: usize,
    },
    #[error("failed to allocate {bytes} bytes for {what}")]
    Allocation {
        what: &'static str,
        bytes: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = IlbmError> = std::result::Result<T, E>;

impl IlbmError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        IlbmError::Format(message.into())
    }

    pub(crate) fn geometry(message: impl Into<String>) -> Self {
        IlbmError::InvalidGeometry(message.into())
    }
}

/// Allocates a zero-filled buffer, reporting failure instead of aborting.
pub(crate) fn zeroed_buffer(what: &'static str, bytes: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(bytes)
        .map_err(|source| IlbmError::Allocation {
            what,
            bytes,
            source,
        })?;
    buffer.resize(bytes, 0);
    Ok(buffer)
}

/// Allocates an empty buffer with room for `bytes`.
pub(crate) fn reserved_buffer(what: &'static str, bytes: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve(bytes)
        .map_err(|source| IlbmError::Allocation {
            what,
            bytes,
            source,
        })?;
    Ok(buffer)
}
