// src/sensor.rs - Skeleton sensor interface and frame sources
use nalgebra::Vector4;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::error::SensorError;
use crate::joints::JOINT_COUNT;
use crate::tracking::TrackedSkeleton;

/// Skeleton-space position in meters plus the sensor's `w` component.
pub type RawPosition = Vector4<f64>;

/// Raw positions of every joint, indexed by `JointName::index`.
pub type JointPositions = [RawPosition; JOINT_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    NotTracked,
    PositionOnly,
    Tracked,
}

/// One body slot of a sensor frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonRecord {
    pub tracking_state: TrackingState,
    pub positions: JointPositions,
}

impl SkeletonRecord {
    pub fn tracked(positions: JointPositions) -> Self {
        Self { tracking_state: TrackingState::Tracked, positions }
    }

    pub fn not_tracked() -> Self {
        Self {
            tracking_state: TrackingState::NotTracked,
            positions: [RawPosition::zeros(); JOINT_COUNT],
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.tracking_state == TrackingState::Tracked
    }
}

/// Everything the sensor delivered for one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorFrame {
    pub skeletons: Vec<SkeletonRecord>,
}

impl SensorFrame {
    pub fn new(skeletons: Vec<SkeletonRecord>) -> Self {
        Self { skeletons }
    }

    /// Tracked bodies, keyed by their position in the sensor's skeleton array.
    pub fn tracked(&self) -> Vec<TrackedSkeleton<'_>> {
        self.skeletons
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_tracked())
            .map(|(index, record)| TrackedSkeleton { index, joints: &record.positions })
            .collect()
    }
}

/// A device (or stand-in) that delivers skeleton frames.
///
/// `open` and `next_frame` are only ever called from the poll loop thread.
pub trait SkeletonSource: Send {
    /// Opens the device and subscribes to the skeleton stream.
    fn open(&mut self) -> Result<(), SensorError>;

    /// Waits up to `timeout` for the next frame; `Ok(None)` if none arrived.
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<SensorFrame>, SensorError>;

    fn close(&mut self) {}
}

impl<S: SkeletonSource + ?Sized> SkeletonSource for Box<S> {
    fn open(&mut self) -> Result<(), SensorError> {
        (**self).open()
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Option<SensorFrame>, SensorError> {
        (**self).next_frame(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Pushes frames into a [`ChannelSource`].
#[derive(Clone)]
pub struct FrameSender {
    tx: Sender<SensorFrame>,
}

impl FrameSender {
    /// Returns false once the receiving source is gone.
    pub fn send(&self, frame: SensorFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Frame-ready events delivered over a channel, one frame per send.
pub struct ChannelSource {
    rx: Receiver<SensorFrame>,
    open_error: Option<SensorError>,
}

impl ChannelSource {
    pub fn channel() -> (FrameSender, Self) {
        let (tx, rx) = mpsc::channel();
        (FrameSender { tx }, Self { rx, open_error: None })
    }

    /// A source whose `open` fails with `error`.
    pub fn failing(error: SensorError) -> Self {
        let (_tx, rx) = mpsc::channel();
        Self { rx, open_error: Some(error) }
    }
}

impl SkeletonSource for ChannelSource {
    fn open(&mut self) -> Result<(), SensorError> {
        match self.open_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Option<SensorFrame>, SensorError> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SensorError::Disconnected),
        }
    }
}

/// Replays newline-delimited JSON `SensorFrame`s from a recording.
pub struct ReplaySource {
    path: PathBuf,
    interval: Duration,
    looping: bool,
    frames: VecDeque<SensorFrame>,
    played: Vec<SensorFrame>,
    last_emit: Option<Instant>,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            looping: false,
            frames: VecDeque::new(),
            played: Vec::new(),
            last_emit: None,
        }
    }

    /// Restart from the first frame once the recording is exhausted.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn load(&mut self) -> Result<(), SensorError> {
        let file = std::fs::File::open(&self.path).map_err(|e| {
            SensorError::DeviceNotFound(format!("{}: {}", self.path.display(), e))
        })?;
        self.frames.clear();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| SensorError::Replay(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: SensorFrame = serde_json::from_str(&line).map_err(|e| {
                SensorError::Replay(format!("{}:{}: {}", self.path.display(), line_no + 1, e))
            })?;
            self.frames.push_back(frame);
        }
        if self.frames.is_empty() {
            return Err(SensorError::Replay(format!("{} holds no frames", self.path.display())));
        }
        Ok(())
    }
}

impl SkeletonSource for ReplaySource {
    fn open(&mut self) -> Result<(), SensorError> {
        self.load()?;
        tracing::info!("Replaying {} frames from {}", self.frames.len(), self.path.display());
        Ok(())
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Option<SensorFrame>, SensorError> {
        if self.frames.is_empty() && self.looping {
            self.frames.extend(self.played.drain(..));
        }
        if self.frames.is_empty() {
            std::thread::sleep(timeout);
            return Ok(None);
        }

        if let Some(last) = self.last_emit {
            let due = last + self.interval;
            let now = Instant::now();
            if due > now {
                let wait = due - now;
                if wait > timeout {
                    std::thread::sleep(timeout);
                    return Ok(None);
                }
                std::thread::sleep(wait);
            }
        }

        self.last_emit = Some(Instant::now());
        let frame = self.frames.pop_front();
        if let (Some(frame), true) = (&frame, self.looping) {
            self.played.push(frame.clone());
        }
        Ok(frame)
    }
}
