//! Skeleton sensor relay.
//!
//! A background loop reads skeleton frames from a sensor, maps the sensor's
//! unstable body indices onto stable player slots, and publishes the latest
//! joint positions in a shared table that any number of readers can query.

pub mod config;
pub mod error;
pub mod joints;
pub mod normalize;
pub mod poll;
pub mod pose;
pub mod query;
pub mod sensor;
pub mod session;
pub mod simulate;
pub mod store;
pub mod tracking;

pub use config::AppConfig;
pub use error::{LookupError, SensorError, SetupError};
pub use joints::{Coord, JointName};
pub use pose::{JointSample, PlayerSlot, PoseSnapshot};
pub use query::{PoseMatch, PoseQuery};
pub use session::TrackingSession;
