//! Core of the scan relay: producer frame decoding, Cartesian projection,
//! point storage and fan-out of point-cloud updates to observers.
//!
//! Each transport connection is driven by a [`relay::Relay`]; the store and the
//! session registry are process-wide and shared through [`relay::RelayContext`].

pub mod geometry;
pub mod prelude;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod store;
pub mod telemetry;

pub use prelude::{Point, PointFields, RawReading, ScanError, ScanResult};
