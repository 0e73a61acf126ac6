use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use roverlink::cli::{Cli, Cmd, ImageOpts, ModeOpts, TelemetryOpts};
use roverlink::port::open_port;
use roverlink::session::{DeployForcing, FlightMode, LinkSession};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    match args.cmd {
        Cmd::Telemetry(opts) => run_telemetry(opts),
        Cmd::Image(opts) => run_image(opts),
        Cmd::Mode(opts) => run_mode(opts),
    }
}

fn run_telemetry(opts: TelemetryOpts) -> Result<()> {
    let channel = open_port(&opts.ser)?;
    let config = opts
        .ser
        .link_config(DeployForcing::Direct, Duration::from_secs_f64(opts.interval));
    let session = LinkSession::new(channel, config);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("installing interrupt handler")?;
    }

    session.issue_mode(FlightMode::TelemetryTransmission)?;
    let result = stream_telemetry(&session, &stop);

    // Normal or not, drop the rover back to its default mode and
    // persist whatever was accumulated before exiting.
    let _ = session.issue_mode(FlightMode::Terminate);
    session
        .flush_log(&opts.log)
        .with_context(|| format!("flushing telemetry log to {}", opts.log.display()))?;
    result
}

fn stream_telemetry(session: &LinkSession, stop: &AtomicBool) -> Result<()> {
    while !stop.load(Ordering::SeqCst) {
        match session.request_telemetry() {
            Ok(sample) => println!("{sample}"),
            Err(err) => {
                error!(%err, "link failed, ending session");
                return Err(err.into());
            }
        }
    }
    info!(samples = session.sample_count(), "interrupted, ending session");
    Ok(())
}

fn run_image(opts: ImageOpts) -> Result<()> {
    let forcing = DeployForcing::from_str(&opts.forcing)
        .map_err(|_| anyhow!("forcing must be \"direct\" or \"via-installation\""))?;
    let channel = open_port(&opts.ser)?;
    let config = opts.ser.link_config(forcing, Duration::from_secs(1));
    let session = LinkSession::new(channel, config);

    let frame = session.request_image()?;
    frame
        .save(&opts.out)
        .with_context(|| format!("saving image to {}", opts.out.display()))?;
    info!(
        width = frame.width(),
        height = frame.height(),
        bytes = frame.bytes().len(),
        path = %opts.out.display(),
        "deployment image captured"
    );
    Ok(())
}

fn run_mode(opts: ModeOpts) -> Result<()> {
    let mode = FlightMode::from_number(opts.mode)
        .ok_or_else(|| anyhow!("unknown flight mode {} (expected 0, 1, 2 or 5)", opts.mode))?;
    let channel = open_port(&opts.ser)?;
    let config = opts.ser.link_config(DeployForcing::Direct, Duration::from_secs(1));
    let session = LinkSession::new(channel, config);

    if session.issue_mode(mode)? {
        info!(?mode, "flight mode commanded");
    } else {
        info!(?mode, "already current, nothing written");
    }
    Ok(())
}
