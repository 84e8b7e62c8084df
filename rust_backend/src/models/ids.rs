//! Identifiers assigned by the persistence layer.

use crate::define_id_type;

define_id_type!(
    /// Identity of a persisted satellite.
    i64,
    SatelliteId
);
define_id_type!(
    /// Identity of a persisted ground station.
    i64,
    StationId
);
define_id_type!(
    /// Identity of a cached ephemeris record.
    i64,
    EphemerisId
);
define_id_type!(
    /// Identity of a cached eligibility group.
    i64,
    EligibilityGroupId
);
define_id_type!(
    /// Identity of a single cached visibility interval.
    i64,
    EligibilityId
);
