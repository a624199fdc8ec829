// src/simulate.rs - Synthetic skeleton stream for running without hardware
use std::time::{Duration, Instant};

use crate::error::SensorError;
use crate::joints::{JointName, JOINT_COUNT};
use crate::sensor::{JointPositions, RawPosition, SensorFrame, SkeletonRecord, SkeletonSource};

/// Body slots in one sensor frame.
pub const SENSOR_BODY_SLOTS: usize = 6;

/// Standing pose in skeleton space (meters), relative to the hip centre.
const STANDING_POSE: [(JointName, f64, f64); JOINT_COUNT] = [
    (JointName::HipCenter, 0.0, 0.0),
    (JointName::Spine, 0.0, 0.1),
    (JointName::ShoulderCenter, 0.0, 0.45),
    (JointName::Head, 0.0, 0.65),
    (JointName::ShoulderLeft, -0.18, 0.42),
    (JointName::ElbowLeft, -0.25, 0.15),
    (JointName::WristLeft, -0.28, -0.08),
    (JointName::HandLeft, -0.29, -0.15),
    (JointName::ShoulderRight, 0.18, 0.42),
    (JointName::ElbowRight, 0.25, 0.15),
    (JointName::WristRight, 0.28, -0.08),
    (JointName::HandRight, 0.29, -0.15),
    (JointName::HipLeft, -0.1, -0.05),
    (JointName::KneeLeft, -0.11, -0.5),
    (JointName::AnkleLeft, -0.12, -0.9),
    (JointName::FootLeft, -0.12, -0.97),
    (JointName::HipRight, 0.1, -0.05),
    (JointName::KneeRight, 0.11, -0.5),
    (JointName::AnkleRight, 0.12, -0.9),
    (JointName::FootRight, 0.12, -0.97),
];

/// People drifting in and out of view, one per sensor body slot.
pub struct SimulatedSensor {
    people: usize,
    frame_interval: Duration,
    frame_index: u64,
    last_emit: Option<Instant>,
}

impl SimulatedSensor {
    pub fn new(people: usize, fps: u32) -> Self {
        Self {
            people: people.min(SENSOR_BODY_SLOTS),
            frame_interval: Duration::from_secs(1) / fps.max(1),
            frame_index: 0,
            last_emit: None,
        }
    }

    /// The frame emitted at position `frame_index` of the stream.
    pub fn frame_at(&self, frame_index: u64) -> SensorFrame {
        let t = frame_index as f64 * self.frame_interval.as_secs_f64();
        let skeletons = (0..SENSOR_BODY_SLOTS)
            .map(|slot| {
                if slot < self.people && Self::in_view(slot, t) {
                    SkeletonRecord::tracked(Self::pose(slot, t))
                } else {
                    SkeletonRecord::not_tracked()
                }
            })
            .collect();
        SensorFrame::new(skeletons)
    }

    fn in_view(slot: usize, t: f64) -> bool {
        let phase = slot as f64 * 2.1;
        // the first person only leaves briefly
        let threshold = if slot == 0 { -0.9 } else { 0.0 };
        (t * 0.15 + phase).sin() > threshold
    }

    fn pose(slot: usize, t: f64) -> JointPositions {
        let phase = slot as f64 * 1.3;
        let hip_x = -1.0 + slot as f64 * 0.6 + 0.3 * (t * 0.4 + phase).sin();
        let hip_y = 0.1 * (t * 2.0 + phase).sin().abs();
        let hip_z = 2.5 + 0.5 * (t * 0.3 + phase).cos();
        let wave = 0.2 * (t * 3.0 + phase).sin();

        let mut joints = [RawPosition::zeros(); JOINT_COUNT];
        for (joint, dx, dy) in STANDING_POSE {
            let lift = match joint {
                JointName::WristRight | JointName::HandRight => wave.max(0.0) * 2.0,
                JointName::ElbowRight => wave.max(0.0),
                _ => 0.0,
            };
            joints[joint.index()] = RawPosition::new(hip_x + dx, hip_y + dy + lift, hip_z, 1.0);
        }
        joints
    }
}

impl SkeletonSource for SimulatedSensor {
    fn open(&mut self) -> Result<(), SensorError> {
        tracing::info!("Using simulated sensor with {} people", self.people);
        Ok(())
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Option<SensorFrame>, SensorError> {
        if let Some(last) = self.last_emit {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                let wait = self.frame_interval - elapsed;
                if wait > timeout {
                    std::thread::sleep(timeout);
                    return Ok(None);
                }
                std::thread::sleep(wait);
            }
        }
        self.last_emit = Some(Instant::now());
        let frame = self.frame_at(self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }
}
