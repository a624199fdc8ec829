use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use skeleton_relay::sensor::{ReplaySource, SkeletonSource};
use skeleton_relay::simulate::SimulatedSensor;

/// Checks that a skeleton source can be opened and delivers frames.
#[derive(Parser, Debug)]
struct Args {
    /// Recording to probe; the simulated sensor is used when omitted
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Seconds to wait for the first frame
    #[arg(long, default_value_t = 5)]
    wait_secs: u64,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    println!("Testing sensor access...\n");

    let mut source: Box<dyn SkeletonSource> = match &args.replay {
        Some(path) => Box::new(ReplaySource::new(path, Duration::ZERO)),
        None => Box::new(SimulatedSensor::new(2, 30)),
    };

    if let Err(e) = source.open() {
        println!("✗ Failed to open sensor: {}", e);
        println!("\nPossible causes:");
        println!("1. Sensor is not connected or not powered");
        println!("2. Sensor is being used by another app");
        println!("3. Recording path is wrong or empty");
        std::process::exit(1);
    }
    println!("✓ Sensor opened");

    match source.next_frame(Duration::from_secs(args.wait_secs)) {
        Ok(Some(frame)) => {
            let tracked = frame.tracked();
            println!(
                "✓ Frame received: {} body slots, {} tracked",
                frame.skeletons.len(),
                tracked.len()
            );
        }
        Ok(None) => println!("✗ No frame within {} seconds", args.wait_secs),
        Err(e) => println!("✗ Failed to read frame: {}", e),
    }
    source.close();
}
