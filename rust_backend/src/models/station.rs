//! Ground stations and elevation masks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::StationId;

/// Geodetic location. Angles in degrees, altitude in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: Option<StationId>,
    pub city: String,
    pub country: String,
    pub location: GroundLocation,
}

impl Station {
    pub fn new(city: impl Into<String>, country: impl Into<String>, location: GroundLocation) -> Self {
        Self {
            id: None,
            city: city.into(),
            country: country.into(),
            location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaskError {
    #[error("azimuths and elevations should contain the same number of values ({azimuths} vs {elevations})")]
    LengthMismatch { azimuths: usize, elevations: usize },

    #[error("elevation mask needs at least one threshold")]
    Empty,
}

/// Minimum elevation as a function of azimuth.
///
/// `elevations_deg[i]` applies from `azimuths_deg[i]` onwards; values between
/// thresholds are linearly interpolated and azimuths outside the table clamp
/// to the nearest end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MaskRepr", into = "MaskRepr")]
pub struct ElevationMask {
    azimuths_deg: Vec<f64>,
    elevations_deg: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MaskRepr {
    azimuths_deg: Vec<f64>,
    elevations_deg: Vec<f64>,
}

impl TryFrom<MaskRepr> for ElevationMask {
    type Error = MaskError;

    fn try_from(repr: MaskRepr) -> Result<Self, Self::Error> {
        ElevationMask::new(repr.azimuths_deg, repr.elevations_deg)
    }
}

impl From<ElevationMask> for MaskRepr {
    fn from(mask: ElevationMask) -> Self {
        MaskRepr {
            azimuths_deg: mask.azimuths_deg,
            elevations_deg: mask.elevations_deg,
        }
    }
}

impl ElevationMask {
    pub fn new(azimuths_deg: Vec<f64>, elevations_deg: Vec<f64>) -> Result<Self, MaskError> {
        if azimuths_deg.len() != elevations_deg.len() {
            return Err(MaskError::LengthMismatch {
                azimuths: azimuths_deg.len(),
                elevations: elevations_deg.len(),
            });
        }
        if azimuths_deg.is_empty() {
            return Err(MaskError::Empty);
        }
        Ok(Self {
            azimuths_deg,
            elevations_deg,
        })
    }

    /// Azimuth-independent mask, expanded to an explicit `[0, 360]` table so
    /// that it has a canonical byte encoding.
    pub fn constant(elevation_deg: f64) -> Self {
        Self {
            azimuths_deg: vec![0.0, 360.0],
            elevations_deg: vec![elevation_deg, elevation_deg],
        }
    }

    pub fn azimuths_deg(&self) -> &[f64] {
        &self.azimuths_deg
    }

    pub fn elevations_deg(&self) -> &[f64] {
        &self.elevations_deg
    }

    /// Minimum elevation required at `azimuth_deg`.
    pub fn min_elevation(&self, azimuth_deg: f64) -> f64 {
        let az = azimuth_deg.rem_euclid(360.0);
        let last = self.azimuths_deg.len() - 1;
        if az <= self.azimuths_deg[0] {
            return self.elevations_deg[0];
        }
        if az >= self.azimuths_deg[last] {
            return self.elevations_deg[last];
        }
        for i in 0..last {
            let (a0, a1) = (self.azimuths_deg[i], self.azimuths_deg[i + 1]);
            if az >= a0 && az <= a1 {
                if a1 == a0 {
                    return self.elevations_deg[i + 1];
                }
                let t = (az - a0) / (a1 - a0);
                return self.elevations_deg[i] + t * (self.elevations_deg[i + 1] - self.elevations_deg[i]);
            }
        }
        self.elevations_deg[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_mask_is_flat() {
        let mask = ElevationMask::constant(10.0);
        assert_eq!(mask.azimuths_deg(), &[0.0, 360.0]);
        for az in [0.0, 45.0, 180.0, 359.9, 400.0] {
            assert_eq!(mask.min_elevation(az), 10.0);
        }
    }

    #[test]
    fn test_mask_interpolates_between_thresholds() {
        let mask = ElevationMask::new(vec![0.0, 90.0, 180.0], vec![10.0, 30.0, 30.0]).unwrap();
        assert_eq!(mask.min_elevation(45.0), 20.0);
        assert_eq!(mask.min_elevation(270.0), 30.0);
    }

    #[test]
    fn test_mask_rejects_mismatched_tables() {
        assert_eq!(
            ElevationMask::new(vec![0.0, 90.0], vec![10.0]),
            Err(MaskError::LengthMismatch {
                azimuths: 2,
                elevations: 1
            })
        );
        assert_eq!(ElevationMask::new(vec![], vec![]), Err(MaskError::Empty));
    }

    #[test]
    fn test_deserialized_masks_are_validated() {
        let empty = r#"{"azimuths_deg":[],"elevations_deg":[]}"#;
        assert!(serde_json::from_str::<ElevationMask>(empty).is_err());

        let ragged = r#"{"azimuths_deg":[0.0,90.0],"elevations_deg":[5.0]}"#;
        assert!(serde_json::from_str::<ElevationMask>(ragged).is_err());

        let mask = ElevationMask::new(vec![0.0, 180.0], vec![5.0, 15.0]).unwrap();
        let json = serde_json::to_string(&mask).unwrap();
        let back: ElevationMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mask);
        assert_eq!(back.min_elevation(90.0), 10.0);
    }
}
