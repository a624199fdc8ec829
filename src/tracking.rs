// src/tracking.rs - Stable player identities across sensor frames
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, trace};

use crate::config::TrackerConfig;
use crate::joints::{JointName, JOINT_COUNT};
use crate::normalize::Normalizer;
use crate::pose::{JointRow, JointSample, PlayerSlot};
use crate::sensor::JointPositions;

/// A body the sensor reports as tracked in the current frame.
///
/// `index` is only meaningful within one frame; the sensor gives no guarantee
/// that the same person keeps it.
#[derive(Debug, Clone, Copy)]
pub struct TrackedSkeleton<'a> {
    pub index: usize,
    pub joints: &'a JointPositions,
}

/// What one frame changes in the pose table. Applied as a single batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameUpdate {
    /// Slots whose player left view; their rows reset to zero.
    pub cleared: Vec<PlayerSlot>,
    /// Fresh joint rows for every slot tracked this frame.
    pub rows: Vec<(PlayerSlot, JointRow)>,
    pub tracked_count: usize,
    pub tracked_players: Vec<PlayerSlot>,
}

/// Maps the sensor's per-frame body indices onto persistent player slots.
///
/// Owned by the poll loop thread alone, so none of this state is locked.
pub struct IdentityTracker<N> {
    normalizer: N,
    max_players: u8,
    assignment: BTreeMap<usize, PlayerSlot>,
    available: BTreeSet<PlayerSlot>,
    previous: BTreeSet<usize>,
}

impl<N: Normalizer> IdentityTracker<N> {
    pub fn new(max_players: u8, normalizer: N) -> Self {
        Self {
            normalizer,
            max_players,
            assignment: BTreeMap::new(),
            available: (1..=max_players).collect(),
            previous: BTreeSet::new(),
        }
    }

    pub fn from_config(config: &TrackerConfig, normalizer: N) -> Self {
        Self::new(config.max_players, normalizer)
    }

    pub fn max_players(&self) -> u8 {
        self.max_players
    }

    /// Current sensor index -> slot mapping.
    pub fn assignment(&self) -> &BTreeMap<usize, PlayerSlot> {
        &self.assignment
    }

    /// Unassigned slots, lowest first.
    pub fn available_slots(&self) -> impl Iterator<Item = PlayerSlot> + '_ {
        self.available.iter().copied()
    }

    /// Processes one frame of tracked bodies and returns the table changes.
    pub fn assign(&mut self, frame: &[TrackedSkeleton<'_>]) -> FrameUpdate {
        let current: BTreeSet<usize> = frame.iter().map(|s| s.index).collect();
        let mut update = FrameUpdate {
            tracked_count: frame.len(),
            ..FrameUpdate::default()
        };

        // Same bodies as last frame: keep every slot as it is.
        if current != self.previous {
            update.cleared = self.release_departed(&current);
            self.admit_arrivals(frame);
            self.previous = current;
        }

        for skeleton in frame {
            let Some(&slot) = self.assignment.get(&skeleton.index) else {
                trace!("Sensor body {} has no free player slot", skeleton.index);
                continue;
            };
            if update.rows.iter().any(|(written, _)| *written == slot) {
                continue;
            }
            update.rows.push((slot, self.normalize_row(skeleton.joints)));
        }

        let mut players: Vec<PlayerSlot> = self.assignment.values().copied().collect();
        players.sort_unstable();
        players.dedup();
        update.tracked_players = players;
        update
    }

    fn release_departed(&mut self, current: &BTreeSet<usize>) -> Vec<PlayerSlot> {
        let departed: Vec<usize> = self
            .assignment
            .keys()
            .filter(|index| !current.contains(index))
            .copied()
            .collect();

        let mut cleared = Vec::with_capacity(departed.len());
        for index in departed {
            if let Some(slot) = self.assignment.remove(&index) {
                info!("Player {} left (sensor body {})", slot, index);
                self.available.insert(slot);
                cleared.push(slot);
            }
        }
        cleared.sort_unstable();
        cleared
    }

    fn admit_arrivals(&mut self, frame: &[TrackedSkeleton<'_>]) {
        for skeleton in frame {
            if self.assignment.contains_key(&skeleton.index) {
                continue;
            }
            match self.available.pop_first() {
                Some(slot) => {
                    info!("Player {} entered (sensor body {})", slot, skeleton.index);
                    self.assignment.insert(skeleton.index, slot);
                }
                None => {
                    debug!(
                        "Ignoring sensor body {}: all {} player slots in use",
                        skeleton.index, self.max_players
                    );
                }
            }
        }
    }

    fn normalize_row(&self, joints: &JointPositions) -> JointRow {
        let mut samples = [JointSample::ZERO; JOINT_COUNT];
        for joint in JointName::ALL {
            samples[joint.index()] = self.normalizer.normalize(&joints[joint.index()]);
        }
        JointRow::from_samples(samples)
    }
}
