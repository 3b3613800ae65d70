//! Convenience module for exposing the commonly used structs and functions
pub use crate::driver::Mode;
pub use crate::params::{kmh_to_mps, mps_to_kmh, DriverParams};
pub use crate::simdrive::{simulate, Event, Outcome, RunSummary, SimDrive, SimDriveVec};
pub use crate::track::{Section, Track, TrackCursor, TrackError};
pub use crate::traits::{ApproxEq, SerdeAPI};
pub use crate::validate::ObjState;
