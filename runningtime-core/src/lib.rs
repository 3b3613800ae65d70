//! Crate containing models for minimum running time simulation of a train over
//! an ordered sequence of speed-restricted track sections, starting and ending
//! at rest.
//! # Features:
//! - resources: bundle the example tracks in `resources/tracks` into the binary
//! - validation: validate [DriverParams](params::DriverParams) on load

#[macro_use]
pub mod macros;

pub mod accel;
pub mod combo_error;
pub mod driver;
pub mod imports;
pub mod lookahead;
pub mod params;
pub mod prelude;
#[cfg(feature = "resources")]
pub mod resources;
pub mod simdrive;
pub mod track;
pub mod traits;
pub mod validate;
