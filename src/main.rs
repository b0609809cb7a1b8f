//! Continuous-capture binary: runs the acquisition engine against a V4L2
//! device until ENTER is pressed.

use std::time::Duration;

use clap::Parser;

use cam_acquire::{
    AcquisitionEngine, AcquisitionMode, EngineConfig, V4l2Driver, V4l2Options,
};

#[derive(Parser)]
#[command(name = "cam-acquire")]
#[command(about = "Continuous image acquisition from a V4L2 capture device", long_about = None)]
struct Cli {
    /// Device index (0 for /dev/video0)
    #[arg(short, long, default_value_t = 0)]
    device: u32,

    /// Completion wait timeout in milliseconds
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,

    /// Emit a statistics snapshot every N captured frames (0 disables)
    #[arg(long, default_value_t = 100)]
    stats_every: u64,

    /// Number of capture buffers to request from the driver
    #[arg(long, default_value_t = 4)]
    buffers: u32,

    /// Capture width in pixels (device default when omitted)
    #[arg(long)]
    width: Option<u32>,

    /// Capture height in pixels (device default when omitted)
    #[arg(long)]
    height: Option<u32>,

    /// Capture a single frame, then exit
    #[arg(long)]
    single_shot: bool,
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> cam_acquire::Result<()> {
    let cli = Cli::parse();

    let options = V4l2Options {
        buffer_count: cli.buffers,
        width: cli.width,
        height: cli.height,
    };
    let driver = V4l2Driver::open(cli.device, &options)?;

    let config = EngineConfig {
        wait_timeout: Duration::from_millis(cli.timeout_ms),
        stats_interval: cli.stats_every,
        mode: if cli.single_shot {
            AcquisitionMode::SingleShot
        } else {
            AcquisitionMode::Continuous
        },
    };
    let engine = AcquisitionEngine::new(driver, config).with_consumer(|current, _previous| {
        let meta = &current.payload().metadata;
        log::debug!(
            "frame {}: {} bytes, timestamp {:?}",
            meta.sequence,
            meta.bytes_used,
            meta.timestamp
        );
    });

    let handle = engine.spawn()?;

    if !cli.single_shot {
        println!("Press <<ENTER>> to end the application");
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        handle.signal_stop();
    }

    let report = handle.join()?;
    println!(
        "{} frames completed, {} failed, {} requests submitted",
        report.frames_completed, report.frames_failed, report.requests_submitted
    );
    Ok(())
}
