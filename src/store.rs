// src/store.rs - Pose table shared between the poll loop and readers
use chrono::Local;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::LookupError;
use crate::joints::JointName;
use crate::pose::{JointRow, JointSample, PlayerSlot, PoseSnapshot, PoseTable};
use crate::tracking::FrameUpdate;

/// Slot number that stands for "first tracked player, or 1".
pub const FIRST_TRACKED: PlayerSlot = 0;

/// Tracked-body metadata of the last committed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingMeta {
    pub tracked_count: usize,
    pub tracked_players: Vec<PlayerSlot>,
}

/// Handle to the shared pose state. Clones share the same table.
///
/// The poll loop commits one whole frame per write lock; every read takes a
/// single read lock, so a read never mixes data from two frames.
#[derive(Debug, Clone)]
pub struct PoseStore {
    state: Arc<RwLock<PoseSnapshot>>,
    max_players: u8,
}

impl PoseStore {
    pub fn new(max_players: u8) -> Self {
        let snapshot = PoseSnapshot {
            skeletons: PoseTable::new(max_players),
            num_tracked: 0,
            tracked_players: Vec::new(),
            frame_seq: 0,
            updated_at: None,
        };
        Self {
            state: Arc::new(RwLock::new(snapshot)),
            max_players,
        }
    }

    pub fn max_players(&self) -> u8 {
        self.max_players
    }

    // A panicking writer can only leave a fully replaced row behind, so the
    // poison flag carries no information worth failing readers over.
    fn read(&self) -> RwLockReadGuard<'_, PoseSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, PoseSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one frame's changes as a single batch.
    pub fn commit(&self, update: &FrameUpdate) {
        let mut state = self.write_guard();
        for &slot in &update.cleared {
            if let Some(row) = state.skeletons.row_mut(slot) {
                *row = JointRow::zeroed();
            }
        }
        for (slot, fresh) in &update.rows {
            if let Some(row) = state.skeletons.row_mut(*slot) {
                *row = *fresh;
            }
        }
        state.num_tracked = update.tracked_count;
        state.tracked_players = update.tracked_players.clone();
        state.frame_seq += 1;
        state.updated_at = Some(Local::now());
    }

    /// Overwrites a single joint. Producer side only.
    pub fn write(
        &self,
        slot: PlayerSlot,
        joint: JointName,
        sample: JointSample,
    ) -> Result<(), LookupError> {
        if slot == FIRST_TRACKED {
            return Err(LookupError::AliasNotWritable);
        }
        self.check_slot(slot)?;
        let mut state = self.write_guard();
        let row = state.skeletons.row_mut(slot).ok_or_else(|| self.out_of_range(slot))?;
        row.set(joint, sample);
        Ok(())
    }

    pub fn snapshot(&self) -> PoseSnapshot {
        self.read().clone()
    }

    pub fn read_all(&self) -> PoseTable {
        self.read().skeletons.clone()
    }

    /// Every joint of one player. Slot 0 resolves to the first tracked player.
    pub fn read_slot(&self, slot: PlayerSlot) -> Result<JointRow, LookupError> {
        self.check_slot(slot)?;
        let state = self.read();
        let slot = resolve_slot(&state, slot);
        state
            .skeletons
            .row(slot)
            .copied()
            .ok_or_else(|| self.out_of_range(slot))
    }

    pub fn read_joint(&self, slot: PlayerSlot, joint: JointName) -> Result<JointSample, LookupError> {
        Ok(self.read_slot(slot)?.get(joint))
    }

    pub fn read_meta(&self) -> TrackingMeta {
        let state = self.read();
        TrackingMeta {
            tracked_count: state.num_tracked,
            tracked_players: state.tracked_players.clone(),
        }
    }

    /// The slot a lookup of `slot` reads, with slot 0 resolved.
    pub fn resolve(&self, slot: PlayerSlot) -> Result<PlayerSlot, LookupError> {
        self.check_slot(slot)?;
        Ok(resolve_slot(&self.read(), slot))
    }

    fn check_slot(&self, slot: PlayerSlot) -> Result<(), LookupError> {
        if slot > self.max_players {
            return Err(self.out_of_range(slot));
        }
        Ok(())
    }

    pub(crate) fn out_of_range(&self, slot: impl Into<u32>) -> LookupError {
        LookupError::SlotOutOfRange { slot: slot.into(), max: self.max_players }
    }
}

fn resolve_slot(state: &PoseSnapshot, slot: PlayerSlot) -> PlayerSlot {
    if slot != FIRST_TRACKED {
        return slot;
    }
    state.tracked_players.iter().copied().min().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joints::JOINT_COUNT;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn uniform_row(value: f64) -> JointRow {
        JointRow::from_samples([JointSample::new(value, value, value, value); JOINT_COUNT])
    }

    fn row_is_uniform(row: &JointRow) -> bool {
        let first = row.get(JointName::HipCenter);
        row.iter().all(|(_, sample)| sample == first)
    }

    #[test]
    fn test_initial_state_is_zeroed() {
        let store = PoseStore::new(2);
        assert!(store.read_slot(1).unwrap().is_zeroed());
        assert!(store.read_slot(2).unwrap().is_zeroed());
        assert_eq!(store.read_meta(), TrackingMeta { tracked_count: 0, tracked_players: vec![] });
        assert_eq!(store.snapshot().frame_seq, 0);
    }

    #[test]
    fn test_commit_and_departure_zeroing() {
        let store = PoseStore::new(2);
        store.commit(&FrameUpdate {
            cleared: vec![],
            rows: vec![(1, uniform_row(1.0)), (2, uniform_row(2.0))],
            tracked_count: 2,
            tracked_players: vec![1, 2],
        });
        assert_eq!(store.read_joint(2, JointName::Head).unwrap().x, 2.0);

        store.commit(&FrameUpdate {
            cleared: vec![1],
            rows: vec![(2, uniform_row(3.0))],
            tracked_count: 1,
            tracked_players: vec![2],
        });
        assert!(store.read_slot(1).unwrap().is_zeroed());
        assert_eq!(store.read_joint(2, JointName::FootLeft).unwrap().z, 3.0);
        assert_eq!(store.read_meta().tracked_players, vec![2]);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.frame_seq, 2);
        assert!(snapshot.updated_at.is_some());
    }

    #[test]
    fn test_slot_zero_alias() {
        let store = PoseStore::new(2);
        store.commit(&FrameUpdate {
            cleared: vec![],
            rows: vec![(2, uniform_row(5.0))],
            tracked_count: 1,
            tracked_players: vec![2],
        });
        assert_eq!(store.resolve(0), Ok(2));
        assert_eq!(store.read_slot(0), store.read_slot(2));

        store.commit(&FrameUpdate {
            cleared: vec![2],
            rows: vec![],
            tracked_count: 0,
            tracked_players: vec![],
        });
        assert_eq!(store.resolve(0), Ok(1));
        assert_eq!(store.read_slot(0), store.read_slot(1));
    }

    #[test]
    fn test_out_of_range_slot() {
        let store = PoseStore::new(2);
        assert_eq!(
            store.read_slot(3),
            Err(LookupError::SlotOutOfRange { slot: 3, max: 2 })
        );
        assert!(store.write(9, JointName::Head, JointSample::ZERO).is_err());
    }

    #[test]
    fn test_single_joint_write() {
        let store = PoseStore::new(1);
        store.write(1, JointName::Head, JointSample::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(store.read_joint(1, JointName::Head).unwrap().w, 4.0);
        assert_eq!(store.read_joint(1, JointName::Spine).unwrap(), JointSample::ZERO);
    }

    #[test]
    fn test_write_to_slot_zero_is_rejected() {
        let store = PoseStore::new(2);
        let sample = JointSample::new(7.0, 7.0, 7.0, 7.0);
        assert_eq!(
            store.write(0, JointName::Head, sample),
            Err(LookupError::AliasNotWritable)
        );
        assert_eq!(store.read_joint(0, JointName::Head).unwrap(), JointSample::ZERO);
        assert_eq!(store.read_joint(1, JointName::Head).unwrap(), JointSample::ZERO);
        assert_eq!(store.write(3, JointName::Head, sample), Err(LookupError::SlotOutOfRange { slot: 3, max: 2 }));
    }

    #[test]
    fn test_readers_never_see_mixed_frames() {
        let store = PoseStore::new(2);
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut reads = 0u64;
                    while !done.load(Ordering::Relaxed) || reads == 0 {
                        for slot in 0..=2 {
                            let row = store.read_slot(slot).unwrap();
                            assert!(row_is_uniform(&row), "torn row in slot {slot}");
                        }
                        let snapshot = store.snapshot();
                        let mut values = snapshot
                            .skeletons
                            .rows()
                            .map(|(_, row)| row.get(JointName::Head).x);
                        // both slots are written with the same frame number
                        let first = values.next().unwrap();
                        assert!(values.all(|v| v == first), "table mixes two frames");
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for frame in 1..=2_000u32 {
            let value = f64::from(frame);
            store.commit(&FrameUpdate {
                cleared: vec![],
                rows: vec![(1, uniform_row(value)), (2, uniform_row(value))],
                tracked_count: 2,
                tracked_players: vec![1, 2],
            });
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert_eq!(store.read_joint(1, JointName::Head).unwrap().x, 2000.0);
    }
}
