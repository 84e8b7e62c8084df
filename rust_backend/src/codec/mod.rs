//! Binary encodings used as durable storage formats and cache keys.
//!
//! - [`timeseries`]: ephemeris blobs, `N x 6` little-endian `f64` rows.
//! - [`mask`]: canonical byte identity of an elevation mask.
//!
//! Both layouts are fixed little-endian regardless of host byte order and
//! carry no version tag.

pub mod mask;
pub mod timeseries;

pub use mask::MaskKey;

use thiserror::Error;

/// Size of one encoded `f64` field.
pub const FIELD_BYTES: usize = std::mem::size_of::<f64>();

/// A stored blob does not match the layout it claims to have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("blob of {len} bytes is not a whole number of {row_bytes}-byte rows")]
    RaggedBlob { len: usize, row_bytes: usize },

    #[error("blob holds {actual} samples, expected {expected}")]
    SampleCountMismatch { expected: usize, actual: usize },

    #[error("sample window {offset}..{end} exceeds the {available} stored samples")]
    WindowOutOfRange {
        offset: usize,
        end: usize,
        available: usize,
    },
}

pub(crate) fn read_f64(chunk: &[u8]) -> f64 {
    let mut buf = [0u8; FIELD_BYTES];
    buf.copy_from_slice(chunk);
    f64::from_le_bytes(buf)
}
