//! Ephemeris time-series blob codec.
//!
//! Layout: rows of `x, y, z, vx, vy, vz`, each an IEEE-754 `f64` in
//! little-endian order, concatenated row-major without header or padding.

use super::{read_f64, CodecError, FIELD_BYTES};
use crate::models::StateSample;

/// Fields per encoded row.
pub const ROW_FIELDS: usize = 6;

/// Bytes per encoded row.
pub const ROW_BYTES: usize = ROW_FIELDS * FIELD_BYTES;

/// Encode samples into the persisted blob layout.
pub fn encode(samples: &[StateSample]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * ROW_BYTES);
    for sample in samples {
        for field in sample.to_row() {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
    out
}

/// Decode a blob that must hold exactly `sample_count` rows.
pub fn decode(bytes: &[u8], sample_count: usize) -> Result<Vec<StateSample>, CodecError> {
    decode_window(bytes, sample_count, 0, sample_count)
}

/// Decode rows `[offset, offset + count)` of a blob holding exactly
/// `sample_count` rows, without materializing the rows outside the window.
pub fn decode_window(
    bytes: &[u8],
    sample_count: usize,
    offset: usize,
    count: usize,
) -> Result<Vec<StateSample>, CodecError> {
    let available = row_count(bytes)?;
    if available != sample_count {
        return Err(CodecError::SampleCountMismatch {
            expected: sample_count,
            actual: available,
        });
    }

    let end = offset + count;
    if end > available {
        return Err(CodecError::WindowOutOfRange {
            offset,
            end,
            available,
        });
    }

    Ok(bytes[offset * ROW_BYTES..end * ROW_BYTES]
        .chunks_exact(ROW_BYTES)
        .map(decode_row)
        .collect())
}

/// Number of rows in a blob, or [`CodecError::RaggedBlob`] when its length is
/// not a multiple of [`ROW_BYTES`].
pub fn row_count(bytes: &[u8]) -> Result<usize, CodecError> {
    if bytes.len() % ROW_BYTES != 0 {
        return Err(CodecError::RaggedBlob {
            len: bytes.len(),
            row_bytes: ROW_BYTES,
        });
    }
    Ok(bytes.len() / ROW_BYTES)
}

fn decode_row(row: &[u8]) -> StateSample {
    let mut fields = [0.0; ROW_FIELDS];
    for (field, chunk) in fields.iter_mut().zip(row.chunks_exact(FIELD_BYTES)) {
        *field = read_f64(chunk);
    }
    StateSample::from_row(fields)
}
