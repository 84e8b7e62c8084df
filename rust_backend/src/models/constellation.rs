//! Constellation geometry.
//!
//! Orbit layouts are a closed set of parameterizations dispatched by
//! [`build_orbits`]. A built [`Constellation`] is an arena: it owns every
//! satellite, planes hold indices into that arena, and the plane of a
//! satellite is answered from a reverse lookup table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::satellite::{Satellite, SatelliteOrbit};

const FULL_TURN: f64 = 360.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstellationError {
    #[error("constellation needs at least one plane and one satellite per plane (got {n_planes}x{n_per_plane})")]
    EmptyLayout { n_planes: usize, n_per_plane: usize },
}

/// Parameters shared by every layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseOrbitParameters {
    /// Kilometers.
    pub semi_major_axis: f64,
    /// Degrees.
    pub inclination: f64,
    pub eccentricity: f64,
    /// Degrees.
    pub argument_of_perigee: f64,
    /// RAAN of the first plane, degrees.
    pub raan_base: f64,
    /// RAAN increment between consecutive planes, degrees. Defaults to an
    /// even spread over a full turn.
    #[serde(default)]
    pub raan_spacing: Option<f64>,
    pub epoch: DateTime<Utc>,
}

/// How satellites are phased across planes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrbitLayout {
    /// Phasing from the nominal short-period mean argument of latitude, with
    /// `true_anomaly_period` degrees added per plane.
    Telesat { true_anomaly_period: f64 },
    /// Walker delta pattern with integer relative spacing `F`.
    WalkerDelta { relative_spacing: i64 },
    /// Each plane shifted by a fixed true anomaly, in degrees.
    TrueAnomalyShift { true_anomaly_delta: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitParameters {
    #[serde(flatten)]
    pub base: BaseOrbitParameters,
    pub layout: OrbitLayout,
}

/// Orbits of every satellite: `result[plane][slot]`.
pub fn build_orbits(
    params: &OrbitParameters,
    n_planes: usize,
    n_per_plane: usize,
) -> Result<Vec<Vec<SatelliteOrbit>>, ConstellationError> {
    if n_planes == 0 || n_per_plane == 0 {
        return Err(ConstellationError::EmptyLayout {
            n_planes,
            n_per_plane,
        });
    }

    let base = &params.base;
    let raan_spacing = base.raan_spacing.unwrap_or(FULL_TURN / n_planes as f64);
    let slot_spacing = FULL_TURN / n_per_plane as f64;

    let true_anomaly = |plane: usize, slot: usize| -> f64 {
        let (p, s) = (plane as f64, slot as f64);
        match params.layout {
            OrbitLayout::Telesat {
                true_anomaly_period,
            } => {
                // Planes and slots are 1-based in the phasing formula; here
                // `p` and `s` are already `index - 1`.
                let delta_phi0 = slot_spacing / 2.0 + true_anomaly_period;
                let arg_latitude = -s * slot_spacing - p * slot_spacing / 2.0 + p * delta_phi0;
                wrap_degrees(arg_latitude - base.argument_of_perigee)
            }
            OrbitLayout::WalkerDelta { relative_spacing } => {
                let plane_delta =
                    relative_spacing as f64 * FULL_TURN / (n_per_plane * n_planes) as f64;
                plane_delta * p + s * slot_spacing
            }
            OrbitLayout::TrueAnomalyShift { true_anomaly_delta } => {
                true_anomaly_delta * p + s * slot_spacing
            }
        }
    };

    Ok((0..n_planes)
        .map(|plane| {
            (0..n_per_plane)
                .map(|slot| SatelliteOrbit {
                    epoch: base.epoch,
                    semi_major_axis: base.semi_major_axis,
                    eccentricity: base.eccentricity,
                    inclination: base.inclination,
                    argument_of_perigee: base.argument_of_perigee,
                    raan: base.raan_base + raan_spacing * plane as f64,
                    true_anomaly: true_anomaly(plane, slot),
                })
                .collect()
        })
        .collect())
}

/// Wrap an angle into `[-180, 180)`.
fn wrap_degrees(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(FULL_TURN) - 180.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub index: usize,
    /// Indices into [`Constellation::satellites`], ordered by slot.
    pub satellites: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constellation {
    pub name: String,
    satellites: Vec<Satellite>,
    planes: Vec<Plane>,
    plane_of: Vec<usize>,
}

impl Constellation {
    /// Build every satellite of a `n_planes x n_per_plane` constellation.
    /// Satellites are named `<name>-P<plane>-S<slot>`.
    pub fn build(
        name: impl Into<String>,
        n_planes: usize,
        n_per_plane: usize,
        params: &OrbitParameters,
    ) -> Result<Self, ConstellationError> {
        let name = name.into();
        let orbits = build_orbits(params, n_planes, n_per_plane)?;

        let mut satellites = Vec::with_capacity(n_planes * n_per_plane);
        let mut planes = Vec::with_capacity(n_planes);
        let mut plane_of = Vec::with_capacity(n_planes * n_per_plane);

        for (plane_index, plane_orbits) in orbits.into_iter().enumerate() {
            let mut members = Vec::with_capacity(plane_orbits.len());
            for (slot, orbit) in plane_orbits.into_iter().enumerate() {
                members.push(satellites.len());
                plane_of.push(plane_index);
                satellites.push(Satellite::new(
                    format!("{}-P{}-S{}", name, plane_index, slot),
                    orbit,
                ));
            }
            planes.push(Plane {
                index: plane_index,
                satellites: members,
            });
        }

        Ok(Self {
            name,
            satellites,
            planes,
            plane_of,
        })
    }

    pub fn satellites(&self) -> &[Satellite] {
        &self.satellites
    }

    /// Mutable access for assigning persisted identities after registration.
    pub fn satellites_mut(&mut self) -> &mut [Satellite] {
        &mut self.satellites
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn satellite(&self, index: usize) -> Option<&Satellite> {
        self.satellites.get(index)
    }

    /// Plane owning the satellite at arena index `index`.
    pub fn plane_of(&self, index: usize) -> Option<&Plane> {
        self.plane_of.get(index).and_then(|&p| self.planes.get(p))
    }

    pub fn len(&self) -> usize {
        self.satellites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.satellites.is_empty()
    }
}
