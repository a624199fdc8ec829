// src/error.rs - Error taxonomy for the sensor, the poll loop and lookups
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a skeleton source.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to subscribe to the skeleton stream: {0}")]
    Subscribe(String),

    #[error("sensor stream disconnected")]
    Disconnected,

    #[error("sensor fault: {0}")]
    Fault(String),

    #[error("replay source error: {0}")]
    Replay(String),
}

/// Raised by `start()` when the poll loop never became ready.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error("sensor was not ready after {0:?}")]
    ReadyTimeout(Duration),

    #[error("failed to spawn the sensor thread")]
    Spawn(#[source] std::io::Error),

    #[error("sensor thread exited before signaling readiness")]
    LoopExited,

    #[error("poll loop already started")]
    AlreadyStarted,
}

/// A lookup key that does not name anything in the pose table.
///
/// An untracked slot is not an error: its row exists and reads as zeros.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("player slot {slot} is out of range (1..={max}, or 0 for the first tracked player)")]
    SlotOutOfRange { slot: u32, max: u8 },

    #[error("unknown joint '{0}'")]
    UnknownJoint(String),

    #[error("unknown coordinate '{0}'")]
    UnknownCoord(String),

    #[error("unknown key '{0}'")]
    UnknownKey(String),

    #[error("a joint or coordinate was given without a player slot")]
    MissingSlot,

    #[error("a coordinate was given without a joint")]
    MissingJoint,

    #[error("slot 0 only aliases the first tracked player and cannot be written")]
    AliasNotWritable,
}
