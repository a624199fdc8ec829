// src/poll.rs - Background sensor loop feeding the pose store
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, trace};

use crate::config::SensorConfig;
use crate::error::{SensorError, SetupError};
use crate::normalize::Normalizer;
use crate::sensor::{SensorFrame, SkeletonSource};
use crate::store::PoseStore;
use crate::tracking::IdentityTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStatus {
    Starting,
    Running,
    Stopped,
    Failed(String),
}

struct LoopShared {
    stop: AtomicBool,
    status: Mutex<LoopStatus>,
}

impl LoopShared {
    fn set_status(&self, status: LoopStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn status(&self) -> LoopStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Owns the sensor thread. The thread is never joined implicitly: dropping
/// the handle only asks it to stop.
pub struct PollLoop {
    shared: Arc<LoopShared>,
    handle: Option<JoinHandle<()>>,
}

impl PollLoop {
    /// Spawns the sensor thread and blocks until the skeleton stream is
    /// subscribed, setup fails, or the ready timeout passes.
    pub fn start<S, N>(
        source: S,
        tracker: IdentityTracker<N>,
        store: PoseStore,
        config: &SensorConfig,
    ) -> Result<Self, SetupError>
    where
        S: SkeletonSource + 'static,
        N: Normalizer + Send + 'static,
    {
        let shared = Arc::new(LoopShared {
            stop: AtomicBool::new(false),
            status: Mutex::new(LoopStatus::Starting),
        });
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let frame_wait = config.frame_wait();

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("sensor-poll".to_string())
            .spawn(move || run(source, tracker, store, thread_shared, ready_tx, frame_wait))
            .map_err(SetupError::Spawn)?;

        let ready_timeout = config.ready_timeout();
        match ready_rx.recv_timeout(ready_timeout) {
            Ok(Ok(())) => Ok(Self { shared, handle: Some(handle) }),
            Ok(Err(err)) => Err(SetupError::Sensor(err)),
            Err(RecvTimeoutError::Timeout) => {
                error!("Sensor not ready after {:?}, abandoning it", ready_timeout);
                shared.stop.store(true, Ordering::Release);
                Err(SetupError::ReadyTimeout(ready_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SetupError::LoopExited),
        }
    }

    /// Asks the loop to finish after its current wait. Does not join.
    pub fn stop(&self) {
        if !self.shared.stop.swap(true, Ordering::AcqRel) {
            info!("Stopping sensor poll loop");
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire)
    }

    pub fn status(&self) -> LoopStatus {
        self.shared.status()
    }

    pub fn is_running(&self) -> bool {
        self.status() == LoopStatus::Running
    }

    /// Stops the loop and waits for the thread to exit.
    pub fn join(mut self) -> LoopStatus {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                self.shared.set_status(LoopStatus::Failed("sensor thread panicked".to_string()));
            }
        }
        self.shared.status()
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Marks the loop failed if the sensor thread unwinds past the frame guard,
/// e.g. from `open` or `close`.
struct UnwindGuard<'a>(&'a LoopShared);

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Sensor thread panicked");
            self.0.set_status(LoopStatus::Failed("sensor thread panicked".to_string()));
        }
    }
}

fn run<S, N>(
    mut source: S,
    mut tracker: IdentityTracker<N>,
    store: PoseStore,
    shared: Arc<LoopShared>,
    ready: SyncSender<Result<(), SensorError>>,
    frame_wait: Duration,
) where
    S: SkeletonSource,
    N: Normalizer,
{
    let _guard = UnwindGuard(&shared);

    info!("Connecting to the skeleton sensor");
    if let Err(err) = source.open() {
        error!("Sensor setup failed: {}", err);
        shared.set_status(LoopStatus::Failed(err.to_string()));
        let _ = ready.send(Err(err));
        return;
    }
    shared.set_status(LoopStatus::Running);
    info!("Skeleton stream ready");
    let _ = ready.send(Ok(()));
    drop(ready);

    let final_status = loop {
        if shared.stop.load(Ordering::Acquire) {
            break LoopStatus::Stopped;
        }
        // A panic anywhere in one iteration must surface through the status.
        let step = panic::catch_unwind(AssertUnwindSafe(|| {
            poll_once(&mut source, &mut tracker, &store, frame_wait)
        }));
        match step {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!("Sensor fault, poll loop terminating: {}", err);
                break LoopStatus::Failed(err.to_string());
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Poll loop terminating: {}", message);
                break LoopStatus::Failed(message);
            }
        }
    };

    source.close();
    info!("Sensor poll loop exited: {:?}", final_status);
    shared.set_status(final_status);
}

/// Waits for one frame and commits it, if one arrived.
fn poll_once<S, N>(
    source: &mut S,
    tracker: &mut IdentityTracker<N>,
    store: &PoseStore,
    frame_wait: Duration,
) -> Result<(), SensorError>
where
    S: SkeletonSource,
    N: Normalizer,
{
    let Some(frame) = source.next_frame(frame_wait)? else {
        return Ok(());
    };
    process_frame(tracker, store, &frame);
    Ok(())
}

fn process_frame<N: Normalizer>(
    tracker: &mut IdentityTracker<N>,
    store: &PoseStore,
    frame: &SensorFrame,
) {
    let update = tracker.assign(&frame.tracked());
    trace!(
        "Frame: {} tracked, players {:?}",
        update.tracked_count,
        update.tracked_players
    );
    store.commit(&update);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("sensor thread panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("sensor thread panicked: {}", message)
    } else {
        "sensor thread panicked".to_string()
    }
}
