// src/session.rs - Store, poll loop and query wired together
use tracing::info;

use crate::config::AppConfig;
use crate::error::{LookupError, SetupError};
use crate::normalize::{DepthProjection, Normalizer};
use crate::poll::{LoopStatus, PollLoop};
use crate::pose::{PlayerSlot, PoseSnapshot};
use crate::query::{PoseMatch, PoseQuery};
use crate::sensor::SkeletonSource;
use crate::store::PoseStore;
use crate::tracking::IdentityTracker;

/// One tracking run: owns the pose store and the sensor loop that feeds it.
///
/// Clone the [`PoseQuery`] from [`TrackingSession::query`] to hand read
/// access to other threads.
pub struct TrackingSession {
    config: AppConfig,
    store: PoseStore,
    query: PoseQuery,
    poll: Option<PollLoop>,
}

impl TrackingSession {
    pub fn new(config: AppConfig) -> Self {
        let store = PoseStore::new(config.tracker.max_players);
        let query = PoseQuery::new(store.clone());
        Self { config, store, query, poll: None }
    }

    /// Starts the sensor loop with the configured depth projection.
    pub fn start<S>(&mut self, source: S) -> Result<(), SetupError>
    where
        S: SkeletonSource + 'static,
    {
        let normalizer = DepthProjection::from_config(&self.config.display);
        self.start_with(source, normalizer)
    }

    /// Starts the sensor loop and blocks until it is ready or has failed.
    pub fn start_with<S, N>(&mut self, source: S, normalizer: N) -> Result<(), SetupError>
    where
        S: SkeletonSource + 'static,
        N: Normalizer + Send + 'static,
    {
        if self.poll.is_some() {
            return Err(SetupError::AlreadyStarted);
        }
        let tracker = IdentityTracker::from_config(&self.config.tracker, normalizer);
        let poll = PollLoop::start(source, tracker, self.store.clone(), &self.config.sensor)?;
        info!("Tracking up to {} players", self.config.tracker.max_players);
        self.poll = Some(poll);
        Ok(())
    }

    /// Requests the sensor loop to stop. Does not wait for it.
    pub fn end(&self) {
        if let Some(poll) = &self.poll {
            poll.stop();
        }
    }

    /// `None` until `start` has succeeded.
    pub fn status(&self) -> Option<LoopStatus> {
        self.poll.as_ref().map(PollLoop::status)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &PoseStore {
        &self.store
    }

    pub fn query(&self) -> &PoseQuery {
        &self.query
    }

    pub fn lookup(
        &self,
        slot: Option<PlayerSlot>,
        joint: Option<&str>,
        coord: Option<&str>,
    ) -> Result<PoseMatch, LookupError> {
        self.query.lookup(slot, joint, coord)
    }

    pub fn num_tracked(&self) -> usize {
        self.query.num_tracked()
    }

    pub fn tracked_players(&self) -> Vec<PlayerSlot> {
        self.query.tracked_players()
    }

    pub fn snapshot(&self) -> PoseSnapshot {
        self.query.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;
    use crate::joints::{JointName, JOINT_COUNT};
    use crate::sensor::{ChannelSource, RawPosition, SensorFrame, SkeletonRecord};
    use std::time::{Duration, Instant};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.sensor.frame_wait_ms = 5;
        config.sensor.ready_timeout_ms = 2_000;
        config
    }

    fn wait_for_frames(session: &TrackingSession, frames: u64) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if session.snapshot().frame_seq >= frames {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn body_at(x: f64, z: f64) -> SkeletonRecord {
        SkeletonRecord::tracked([RawPosition::new(x, 0.0, z, 1.0); JOINT_COUNT])
    }

    #[test]
    fn test_end_to_end_with_depth_projection() {
        let mut session = TrackingSession::new(test_config());
        let (tx, source) = ChannelSource::channel();
        session.start(source).unwrap();
        assert_eq!(session.status(), Some(LoopStatus::Running));

        tx.send(SensorFrame::new(vec![
            SkeletonRecord::not_tracked(),
            SkeletonRecord::not_tracked(),
            body_at(0.0, 2.0),
        ]));
        assert!(wait_for_frames(&session, 1));

        assert_eq!(session.num_tracked(), 1);
        assert_eq!(session.tracked_players(), vec![1]);
        let head = session.lookup(Some(0), Some("Head"), None).unwrap();
        match head {
            PoseMatch::Joint(sample) => {
                assert!(sample.x.abs() < 1e-9);
                assert!((sample.z - 2000.0).abs() < 1e-9);
            }
            other => panic!("unexpected match {other:?}"),
        }

        session.end();
    }

    #[test]
    fn test_capacity_bound_through_session() {
        let mut session = TrackingSession::new(test_config());
        let (tx, source) = ChannelSource::channel();
        session.start(source).unwrap();

        tx.send(SensorFrame::new((0..5).map(|i| body_at(i as f64 * 0.1, 2.0)).collect()));
        assert!(wait_for_frames(&session, 1));
        assert_eq!(session.num_tracked(), 5);
        assert_eq!(session.tracked_players(), vec![1, 2]);
        let snapshot = session.snapshot();
        assert!(snapshot.skeletons.rows().all(|(_, row)| !row.is_zeroed()));
        session.end();
    }

    #[test]
    fn test_departed_player_reads_zero() {
        let mut session = TrackingSession::new(test_config());
        let (tx, source) = ChannelSource::channel();
        session.start(source).unwrap();

        tx.send(SensorFrame::new(vec![body_at(0.1, 2.0), body_at(0.5, 2.0)]));
        tx.send(SensorFrame::new(vec![SkeletonRecord::not_tracked(), body_at(0.5, 2.0)]));
        assert!(wait_for_frames(&session, 2));

        assert_eq!(session.tracked_players(), vec![2]);
        assert_eq!(session.lookup(Some(1), None, None), Ok(PoseMatch::Slot(Default::default())));
        assert_eq!(
            session.store().read_joint(2, JointName::Head).unwrap().w,
            1.0
        );
        session.end();
    }

    #[test]
    fn test_start_failure_and_double_start() {
        let mut session = TrackingSession::new(test_config());
        let failing = ChannelSource::failing(SensorError::Subscribe("stream busy".into()));
        assert!(matches!(
            session.start(failing),
            Err(SetupError::Sensor(SensorError::Subscribe(_)))
        ));
        assert_eq!(session.status(), None);

        let (_tx, source) = ChannelSource::channel();
        session.start(source).unwrap();
        let (_tx2, again) = ChannelSource::channel();
        assert!(matches!(session.start(again), Err(SetupError::AlreadyStarted)));
        session.end();
    }
}
