//! Smartlink cache - horizon-aware caching of satellite ephemerides and
//! ground-station eligibilities.
//!
//! Layers, bottom-up:
//! - [`models`]: horizons, ephemerides, stations, masks, constellations
//! - [`codec`]: binary encodings of time series and masks
//! - [`db`]: repository traits, unit of work and storage backends
//! - [`compute`]: propagation, frame conversion and visibility capabilities
//! - [`services`]: batched, cache-aware orchestration
//! - [`api`]: JSON request/response types

pub mod api;
pub mod codec;
pub mod compute;
pub mod db;
pub mod models;
pub mod services;
