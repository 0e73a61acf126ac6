use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::scan::DEFAULT_MAX_FRAME;
use crate::session::{DeployForcing, LinkConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "roverlink", about = "Ground-control serial link to the rover")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Stream telemetry and log it until interrupted
    Telemetry(TelemetryOpts),
    /// Deploy the rover, capture its camera image and save it
    Image(ImageOpts),
    /// Issue a single flight-mode command
    Mode(ModeOpts),
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Serial device path; scans for the radio when omitted
    #[arg(long)]
    pub dev: Option<String>,
    /// Baud rate (field radio runs 9600, bench setups 115200)
    #[arg(long, default_value_t = 9_600)]
    pub baud: u32,
    /// Max bytes buffered while hunting for a frame delimiter
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME)]
    pub max_frame: usize,
    /// Per-frame receive deadline in seconds (0 waits forever)
    #[arg(long, default_value_t = 0.0)]
    pub deadline: f64,
}

impl SerialOpts {
    pub fn link_config(&self, forcing: DeployForcing, retry_interval: Duration) -> LinkConfig {
        LinkConfig {
            max_frame: self.max_frame,
            read_deadline: (self.deadline > 0.0).then(|| Duration::from_secs_f64(self.deadline)),
            retry_interval,
            deploy_forcing: forcing,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TelemetryOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// Telemetry log written on exit
    #[arg(long, default_value = "telemetry_data.txt")]
    pub log: PathBuf,
    /// Seconds between re-arms while the link is not in telemetry mode
    #[arg(long, default_value_t = 1.0)]
    pub interval: f64,
}

#[derive(Args, Debug, Clone)]
pub struct ImageOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// Where the captured JPEG is written
    #[arg(long, default_value = "rover-deployment.jpeg")]
    pub out: PathBuf,
    /// Mode sequence forced before capture: "direct" or "via-installation"
    #[arg(long, default_value = "direct")]
    pub forcing: String,
}

#[derive(Args, Debug, Clone)]
pub struct ModeOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// Flight mode number: 0 install, 1 telemetry, 2 deploy, 5 terminate
    pub mode: u8,
}
