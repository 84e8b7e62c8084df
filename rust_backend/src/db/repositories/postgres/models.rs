use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::{eligibilities, eligibility_groups, ephemerides, satellites, stations};
use crate::db::coverage::{StoredEphemeris, StoredInterval};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::models::{
    EligibilityId, EphemerisId, GroundLocation, Satellite, SatelliteId, SatelliteOrbit, Station,
    StationId, TimeHorizon,
};

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = satellites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SatelliteRow {
    pub satellite_id: i64,
    pub name: String,
    pub epoch: DateTime<Utc>,
    pub semi_major_axis_km: f64,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub argument_of_perigee_deg: f64,
    pub raan_deg: f64,
    pub true_anomaly_deg: f64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = satellites)]
pub struct NewSatelliteRow {
    pub name: String,
    pub epoch: DateTime<Utc>,
    pub semi_major_axis_km: f64,
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub argument_of_perigee_deg: f64,
    pub raan_deg: f64,
    pub true_anomaly_deg: f64,
}

impl From<SatelliteRow> for Satellite {
    fn from(row: SatelliteRow) -> Self {
        Satellite {
            id: Some(SatelliteId(row.satellite_id)),
            name: row.name,
            orbit: SatelliteOrbit {
                epoch: row.epoch,
                semi_major_axis: row.semi_major_axis_km,
                eccentricity: row.eccentricity,
                inclination: row.inclination_deg,
                argument_of_perigee: row.argument_of_perigee_deg,
                raan: row.raan_deg,
                true_anomaly: row.true_anomaly_deg,
            },
        }
    }
}

impl From<&Satellite> for NewSatelliteRow {
    fn from(sat: &Satellite) -> Self {
        NewSatelliteRow {
            name: sat.name.clone(),
            epoch: sat.orbit.epoch,
            semi_major_axis_km: sat.orbit.semi_major_axis,
            eccentricity: sat.orbit.eccentricity,
            inclination_deg: sat.orbit.inclination,
            argument_of_perigee_deg: sat.orbit.argument_of_perigee,
            raan_deg: sat.orbit.raan,
            true_anomaly_deg: sat.orbit.true_anomaly,
        }
    }
}

impl SatelliteRow {
    pub fn with_id(id: SatelliteId, sat: &Satellite) -> Self {
        SatelliteRow {
            satellite_id: id.0,
            name: sat.name.clone(),
            epoch: sat.orbit.epoch,
            semi_major_axis_km: sat.orbit.semi_major_axis,
            eccentricity: sat.orbit.eccentricity,
            inclination_deg: sat.orbit.inclination,
            argument_of_perigee_deg: sat.orbit.argument_of_perigee,
            raan_deg: sat.orbit.raan,
            true_anomaly_deg: sat.orbit.true_anomaly,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = stations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StationRow {
    pub station_id: i64,
    pub city: String,
    pub country: String,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = stations)]
pub struct NewStationRow {
    pub city: String,
    pub country: String,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

impl From<StationRow> for Station {
    fn from(row: StationRow) -> Self {
        Station {
            id: Some(StationId(row.station_id)),
            city: row.city,
            country: row.country,
            location: GroundLocation {
                latitude: row.latitude_deg,
                longitude: row.longitude_deg,
                altitude: row.altitude_km,
            },
        }
    }
}

impl From<&Station> for NewStationRow {
    fn from(station: &Station) -> Self {
        NewStationRow {
            city: station.city.clone(),
            country: station.country.clone(),
            latitude_deg: station.location.latitude,
            longitude_deg: station.location.longitude,
            altitude_km: station.location.altitude,
        }
    }
}

impl StationRow {
    pub fn with_id(id: StationId, station: &Station) -> Self {
        StationRow {
            station_id: id.0,
            city: station.city.clone(),
            country: station.country.clone(),
            latitude_deg: station.location.latitude,
            longitude_deg: station.location.longitude,
            altitude_km: station.location.altitude,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ephemerides)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EphemerisRow {
    pub ephemeris_id: i64,
    pub satellite_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub step_ms: i64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ephemerides)]
pub struct NewEphemerisRow<'a> {
    pub satellite_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub step_ms: i64,
    pub data: &'a [u8],
}

impl EphemerisRow {
    pub fn horizon(&self) -> RepositoryResult<TimeHorizon> {
        TimeHorizon::from_millis(self.start_time, self.end_time, self.step_ms).map_err(|e| {
            RepositoryError::corrupt(
                e.to_string(),
                ErrorContext::new("read_ephemeris")
                    .with_entity("ephemeris")
                    .with_entity_id(self.ephemeris_id),
            )
        })
    }

    pub fn into_stored(self) -> RepositoryResult<StoredEphemeris> {
        let horizon = self.horizon()?;
        Ok(StoredEphemeris {
            id: EphemerisId(self.ephemeris_id),
            satellite_id: SatelliteId(self.satellite_id),
            horizon,
            data: self.data,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = eligibility_groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GroupRow {
    pub group_id: i64,
    pub ephemeris_id: i64,
    pub station_id: i64,
    pub mask: Vec<u8>,
    pub step_ms: i64,
    pub backend: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = eligibility_groups)]
pub struct NewGroupRow {
    pub ephemeris_id: i64,
    pub station_id: i64,
    pub mask: Vec<u8>,
    pub step_ms: i64,
    pub backend: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = eligibilities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IntervalRow {
    pub eligibility_id: i64,
    pub group_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = eligibilities)]
pub struct NewIntervalRow {
    pub group_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<&IntervalRow> for StoredInterval {
    fn from(row: &IntervalRow) -> Self {
        StoredInterval {
            id: EligibilityId(row.eligibility_id),
            start: row.start_time,
            end: row.end_time,
        }
    }
}
