//! Converter error taxonomy.
//!
//! Argument and capability errors ([`SparseError::InvalidArgument`],
//! [`SparseError::UnsupportedRank`], [`SparseError::NoTransferPath`], and
//! friends) are recoverable: the caller may pick another path or surface them
//! to the user. [`SparseError::CorruptTensor`] indicates a precondition
//! violation in the input itself; the operation aborts with no partial
//! result and the caller cannot repair it locally.

use kern_core::{CoreError, Device, DeviceKind, SparseFormat};
use thiserror::Error;

/// Errors produced by sparse format conversion.
#[derive(Debug, Error)]
pub enum SparseError {
    /// A malformed or out-of-contract argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Conversions accept rank-1 and rank-2 tensors only.
    #[error("unsupported tensor rank {0}: conversions accept rank 1 and 2")]
    UnsupportedRank(usize),

    /// Element width outside the supported 1/2/4/8-byte set.
    #[error("unsupported element width: {0} bytes")]
    UnsupportedElementWidth(usize),

    /// The operation requires one sparse layout but received the other.
    #[error("expected {expected:?} input, got {got:?}")]
    FormatMismatch {
        /// Layout the operation requires.
        expected: SparseFormat,
        /// Layout actually received.
        got: SparseFormat,
    },

    /// String tensors are only convertible with a host destination.
    #[error("string tensors can only be converted on the host, destination is {0}")]
    StringsRequireHost(Device),

    /// No data-transfer path is registered between the two domains.
    #[error("no data-transfer path registered for {src:?} -> {dst:?}")]
    NoTransferPath {
        /// Source domain of the missing path.
        src: DeviceKind,
        /// Destination domain of the missing path.
        dst: DeviceKind,
    },

    /// Internal inconsistency in the input tensor: index/value length
    /// mismatch, malformed outer table, out-of-bounds destination index, or
    /// a duplicate coordinate where deduplication is required.
    #[error("corrupt sparse tensor: {0}")]
    CorruptTensor(String),

    /// Error bubbled up from tensor construction or access.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A registered data transfer failed while staging.
    #[error("data transfer failed: {0}")]
    Transfer(#[source] anyhow::Error),
}

/// Result type alias for converter operations.
pub type Result<T> = std::result::Result<T, SparseError>;
