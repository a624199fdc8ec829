// src/pose.rs - Pose table data model
use chrono::{DateTime, Local};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::joints::{Coord, JointName, JOINT_COUNT};

/// Stable player identity exposed to consumers, in `1..=max_players`.
pub type PlayerSlot = u8;

/// One joint position in display space.
///
/// `x`/`y` are display coordinates, `z` is the distance from the sensor in
/// millimeters and `w` is passed through from the sensor untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct JointSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl JointSample {
    pub const ZERO: JointSample = JointSample { x: 0.0, y: 0.0, z: 0.0, w: 0.0 };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn get(&self, coord: Coord) -> f64 {
        match coord {
            Coord::X => self.x,
            Coord::Y => self.y,
            Coord::Z => self.z,
            Coord::W => self.w,
        }
    }
}

/// Every joint of one player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointRow {
    samples: [JointSample; JOINT_COUNT],
}

impl JointRow {
    /// Row of an untracked player.
    pub fn zeroed() -> Self {
        Self { samples: [JointSample::ZERO; JOINT_COUNT] }
    }

    pub fn from_samples(samples: [JointSample; JOINT_COUNT]) -> Self {
        Self { samples }
    }

    pub fn get(&self, joint: JointName) -> JointSample {
        self.samples[joint.index()]
    }

    pub fn set(&mut self, joint: JointName, sample: JointSample) {
        self.samples[joint.index()] = sample;
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointName, JointSample)> + '_ {
        JointName::ALL.iter().map(move |&joint| (joint, self.samples[joint.index()]))
    }

    pub fn is_zeroed(&self) -> bool {
        self.samples.iter().all(|s| *s == JointSample::ZERO)
    }
}

impl Default for JointRow {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Serialize for JointRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(JOINT_COUNT))?;
        for (joint, sample) in self.iter() {
            map.serialize_entry(joint.key(), &sample)?;
        }
        map.end()
    }
}

/// Slot -> joint -> sample. A row exists for every slot for the table's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PoseTable {
    rows: BTreeMap<PlayerSlot, JointRow>,
}

impl PoseTable {
    pub fn new(max_players: u8) -> Self {
        let rows = (1..=max_players).map(|slot| (slot, JointRow::zeroed())).collect();
        Self { rows }
    }

    pub fn max_players(&self) -> u8 {
        self.rows.len() as u8
    }

    pub fn row(&self, slot: PlayerSlot) -> Option<&JointRow> {
        self.rows.get(&slot)
    }

    pub fn row_mut(&mut self, slot: PlayerSlot) -> Option<&mut JointRow> {
        self.rows.get_mut(&slot)
    }

    pub fn rows(&self) -> impl Iterator<Item = (PlayerSlot, &JointRow)> {
        self.rows.iter().map(|(slot, row)| (*slot, row))
    }
}

/// Everything a reader can see, taken from one committed frame.
#[derive(Debug, Clone, Serialize)]
pub struct PoseSnapshot {
    pub skeletons: PoseTable,
    pub num_tracked: usize,
    pub tracked_players: Vec<PlayerSlot>,
    pub frame_seq: u64,
    pub updated_at: Option<DateTime<Local>>,
}

impl PoseSnapshot {
    /// Flat `<slot><joint><coord>` view, e.g. `1handleftx`.
    pub fn flatten(&self) -> BTreeMap<String, f64> {
        let mut flat = BTreeMap::new();
        for (slot, row) in self.skeletons.rows() {
            for (joint, sample) in row.iter() {
                for coord in Coord::ALL {
                    flat.insert(flat_key(slot, joint, coord), sample.get(coord));
                }
            }
        }
        flat
    }
}

pub fn flat_key(slot: PlayerSlot, joint: JointName, coord: Coord) -> String {
    format!("{}{}{}", slot, joint.key(), coord.key())
}
