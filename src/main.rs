// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use skeleton_relay::poll::LoopStatus;
use skeleton_relay::sensor::{ReplaySource, SkeletonSource};
use skeleton_relay::simulate::SimulatedSensor;
use skeleton_relay::{AppConfig, TrackingSession};

#[derive(Parser, Debug)]
#[command(name = "skeleton_relay", about = "Relays skeleton tracking data with stable player slots")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay newline-delimited JSON frames instead of simulating people
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Restart the replay when it reaches the end
    #[arg(long)]
    looping: bool,

    /// Number of simulated people
    #[arg(long, default_value_t = 2)]
    people: usize,

    /// Frames per second of the simulated or replayed stream
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Player slot to print (0 = first tracked player)
    #[arg(long, default_value_t = 1)]
    slot: u8,

    /// Joint to print
    #[arg(long, default_value = "head")]
    joint: String,

    /// Print the full snapshot as JSON instead of one joint
    #[arg(long)]
    snapshot: bool,

    /// Milliseconds between prints
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

fn open_source(args: &Args) -> Box<dyn SkeletonSource> {
    match &args.replay {
        Some(path) => {
            let interval = Duration::from_secs(1) / args.fps.max(1);
            Box::new(ReplaySource::new(path, interval).looping(args.looping))
        }
        None => Box::new(SimulatedSensor::new(args.people, args.fps)),
    }
}

/// Prints on every tick until `shutdown` resolves or the sensor loop fails.
///
/// `shutdown` is polled through one pinned future, so a signal that arrives
/// while a tick is being printed is still seen on the next iteration.
async fn relay<F>(session: &TrackingSession, args: &Args, shutdown: F) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(LoopStatus::Failed(reason)) = session.status() {
                    session.end();
                    anyhow::bail!("sensor loop failed: {}", reason);
                }
                let line = if args.snapshot {
                    serde_json::to_string(&session.snapshot())?
                } else {
                    let found = session.lookup(Some(args.slot), Some(&args.joint), None)?;
                    format!(
                        "tracked={} players={:?} {}={}",
                        session.num_tracked(),
                        session.tracked_players(),
                        args.joint,
                        serde_json::to_string(&found)?
                    )
                };
                println!("{}", line);
            }
            result = &mut shutdown => {
                result.context("failed to listen for Ctrl+C")?;
                tracing::info!("Closing sensor connection...");
                session.end();
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let mut session = TrackingSession::new(config);
    let source = open_source(&args);

    tracing::info!("Connecting to the sensor...");
    let session = tokio::task::spawn_blocking(move || session.start(source).map(|_| session))
        .await
        .context("sensor start task failed")?
        .context("could not connect to the sensor")?;
    tracing::info!("Ready! Hit Ctrl+C to end.");

    relay(&session, &args, tokio::signal::ctrl_c()).await?;

    tracing::info!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skeleton_relay::sensor::{ChannelSource, FrameSender};

    fn test_args() -> Args {
        Args::parse_from(["skeleton_relay", "--interval-ms", "5"])
    }

    // The sender must outlive the test, a closed channel fails the loop.
    fn started_session() -> (TrackingSession, FrameSender) {
        let mut config = AppConfig::default();
        config.sensor.frame_wait_ms = 5;
        let mut session = TrackingSession::new(config);
        let (tx, source) = ChannelSource::channel();
        session.start(source).unwrap();
        (session, tx)
    }

    #[tokio::test]
    async fn test_shutdown_during_ticks_ends_relay() {
        let (session, _tx) = started_session();
        let args = test_args();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = stop_tx.send(());
        });

        let shutdown = async move {
            let _ = stop_rx.await;
            Ok::<(), std::io::Error>(())
        };
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            relay(&session, &args, shutdown),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
        assert!(matches!(session.status(), Some(LoopStatus::Running | LoopStatus::Stopped)));
    }

    #[tokio::test]
    async fn test_shutdown_already_signalled() {
        let (session, _tx) = started_session();
        let args = test_args();
        let shutdown = std::future::ready(Ok::<(), std::io::Error>(()));
        let result = relay(&session, &args, shutdown).await;
        assert!(result.is_ok());
    }
}
