// src/query.rs - Read-only lookups for the HTTP/CLI layer
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::LookupError;
use crate::joints::{normalize_key, Coord, JointName};
use crate::pose::{JointRow, JointSample, PlayerSlot, PoseSnapshot, PoseTable};
use crate::store::PoseStore;

/// Result of [`PoseQuery::lookup`]; narrower keys give narrower results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PoseMatch {
    Table(PoseTable),
    Slot(JointRow),
    Joint(JointSample),
    Coord(f64),
}

#[derive(Debug, Clone)]
pub struct PoseQuery {
    store: PoseStore,
}

impl PoseQuery {
    pub fn new(store: PoseStore) -> Self {
        Self { store }
    }

    /// Looks up pose data by slot, joint and coordinate.
    ///
    /// Joint and coordinate names are matched case-insensitively, ignoring
    /// `_` and `-`. Slot 0 means the lowest tracked slot, or 1 when nobody is
    /// tracked.
    pub fn lookup(
        &self,
        slot: Option<PlayerSlot>,
        joint: Option<&str>,
        coord: Option<&str>,
    ) -> Result<PoseMatch, LookupError> {
        let joint = joint.map(JointName::from_key).transpose()?;
        let coord = coord.map(Coord::from_key).transpose()?;

        let Some(slot) = slot else {
            if joint.is_some() || coord.is_some() {
                return Err(LookupError::MissingSlot);
            }
            return Ok(PoseMatch::Table(self.store.read_all()));
        };

        match (joint, coord) {
            (None, None) => self.store.read_slot(slot).map(PoseMatch::Slot),
            (Some(joint), None) => self.store.read_joint(slot, joint).map(PoseMatch::Joint),
            (Some(joint), Some(coord)) => self
                .store
                .read_joint(slot, joint)
                .map(|sample| PoseMatch::Coord(sample.get(coord))),
            (None, Some(_)) => Err(LookupError::MissingJoint),
        }
    }

    pub fn num_tracked(&self) -> usize {
        self.store.read_meta().tracked_count
    }

    pub fn tracked_players(&self) -> Vec<PlayerSlot> {
        self.store.read_meta().tracked_players
    }

    /// The whole table and its metadata from one frame.
    pub fn snapshot(&self) -> PoseSnapshot {
        self.store.snapshot()
    }

    /// Reads a flat `<slot><joint><coord>` key such as `1HandLeft_x`.
    pub fn get_flat(&self, key: &str) -> Result<f64, LookupError> {
        let (slot, joint, coord) = parse_flat_key(key)?;
        let slot = PlayerSlot::try_from(slot).map_err(|_| self.store.out_of_range(slot))?;
        Ok(self.store.read_joint(slot, joint)?.get(coord))
    }

    /// Every flat entry whose key contains `pattern`, e.g. `1handleft`.
    pub fn find_flat(&self, pattern: &str) -> BTreeMap<String, f64> {
        let pattern = normalize_key(pattern);
        self.snapshot()
            .flatten()
            .into_iter()
            .filter(|(key, _)| key.contains(&pattern))
            .collect()
    }
}

fn parse_flat_key(key: &str) -> Result<(u32, JointName, Coord), LookupError> {
    let unknown = || LookupError::UnknownKey(key.to_string());
    let normalized = normalize_key(key);

    let digits = normalized.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return Err(unknown());
    }
    // all digits, so parsing only fails on overflow
    let slot = normalized[..digits].parse::<u32>().unwrap_or(u32::MAX);
    let rest = &normalized[digits..];
    let coord_at = match rest.char_indices().last() {
        Some((at, _)) if at > 0 => at,
        _ => return Err(unknown()),
    };
    let (joint, coord) = rest.split_at(coord_at);
    let joint = JointName::from_key(joint).map_err(|_| unknown())?;
    let coord = Coord::from_key(coord).map_err(|_| unknown())?;
    Ok((slot, joint, coord))
}
