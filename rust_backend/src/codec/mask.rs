//! Canonical byte identity of elevation masks.
//!
//! A mask's key is its azimuth table followed by its elevation table, each
//! value a little-endian `f64`. Two masks share cache entries only when
//! their keys are bit-identical; no numeric tolerance is applied.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{read_f64, CodecError, FIELD_BYTES};
use crate::models::ElevationMask;

/// Encoded elevation mask, usable as a cache key component.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaskKey(Vec<u8>);

impl MaskKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for MaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaskKey({})", hex::encode(&self.0))
    }
}

impl fmt::Display for MaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl Serialize for MaskKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for MaskKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map(MaskKey).map_err(serde::de::Error::custom)
    }
}

/// `azimuths || elevations`, both little-endian `f64`.
pub fn encode(mask: &ElevationMask) -> MaskKey {
    let mut out =
        Vec::with_capacity((mask.azimuths_deg().len() + mask.elevations_deg().len()) * FIELD_BYTES);
    for value in mask.azimuths_deg().iter().chain(mask.elevations_deg()) {
        out.extend_from_slice(&value.to_le_bytes());
    }
    MaskKey(out)
}

/// Split a key back into its azimuth and elevation tables.
pub fn decode(key: &MaskKey) -> Result<ElevationMask, CodecError> {
    let bytes = key.as_bytes();
    let pair = 2 * FIELD_BYTES;
    if bytes.is_empty() || bytes.len() % pair != 0 {
        return Err(CodecError::RaggedBlob {
            len: bytes.len(),
            row_bytes: pair,
        });
    }
    let values: Vec<f64> = bytes.chunks_exact(FIELD_BYTES).map(read_f64).collect();
    let (azimuths, elevations) = values.split_at(values.len() / 2);
    ElevationMask::new(azimuths.to_vec(), elevations.to_vec()).map_err(|_| CodecError::RaggedBlob {
        len: bytes.len(),
        row_bytes: pair,
    })
}
