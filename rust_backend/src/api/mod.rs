//! # API Module
//!
//! Entry point for callers that speak JSON: the CLI today, an HTTP layer if
//! one is ever added. It keeps the wire format separate from the domain
//! types so that either can evolve on its own.
//!
//! ## Architecture
//!
//! - [`types`]: request/response DTOs (serde only, flat, plain numbers)
//! - [`conversions`]: DTO to service-layer conversions and request parsing
//!
//! ## Usage
//!
//! ```
//! use smartlink_rust::api::{parse_json, EligibilityRequest};
//! use smartlink_rust::services::EligibilityBatch;
//!
//! let request: EligibilityRequest = parse_json(r#"{
//!     "satellite_ids": [1],
//!     "station_with_masks": [{"station_id": 1, "elevations_deg": 10}],
//!     "horizon": {"start": "2024-01-01T00:00:00Z", "end": "2024-01-01T01:00:00Z", "step_ms": 60000}
//! }"#).unwrap();
//! let batch = EligibilityBatch::try_from(request).unwrap();
//! assert_eq!(batch.station_masks.len(), 1);
//! ```

pub mod conversions;
pub mod types;

pub use conversions::parse_json;
pub use types::*;
