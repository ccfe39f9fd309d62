use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use knitkit::app::{drive_session, render_preview, resolve_port, worker_config, JobSetup};
use knitkit::{
    init_logging, list_ports, request_script, Alignment, Config, KnittingSettings,
    SerialTransport, SessionController, SessionState, SimulatedDevice, SimulatedDeviceConfig,
    BUILD_DATE, VERSION,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "knitkit", version, about = "Knit images on a motorized knitting machine")]
struct Cli {
    /// Configuration file (TOML or JSON); defaults to the platform config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List candidate serial ports
    Ports,
    /// Print the encoded passes of an image
    Preview(JobArgs),
    /// Knit an image on a serial port
    Knit {
        #[command(flatten)]
        job: JobArgs,
        /// Serial port, overriding the configuration
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Knit an image against the simulated device
    Simulate {
        #[command(flatten)]
        job: JobArgs,
        /// Time the simulated carriage takes per pass
        #[arg(long, default_value_t = 0)]
        pass_delay_ms: u64,
    },
    /// Write the effective configuration to a file
    SaveConfig {
        /// Target file; defaults to the configuration path
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AlignmentArg {
    Center,
    Left,
    Right,
}

#[derive(Args)]
struct JobArgs {
    /// Image to knit
    image: PathBuf,
    /// Number of colors to quantize the image into
    #[arg(long)]
    colors: Option<u8>,
    /// First needle of the knit window (0-199)
    #[arg(long)]
    start_needle: Option<i32>,
    /// Last needle of the knit window (0-199)
    #[arg(long)]
    stop_needle: Option<i32>,
    /// Placement of the image in the knit window
    #[arg(long, value_enum, conflicts_with = "offset")]
    alignment: Option<AlignmentArg>,
    /// Bed needle of the first image column
    #[arg(long)]
    offset: Option<i32>,
    /// Image row to start at
    #[arg(long)]
    start_line: Option<u32>,
    /// Restart the image instead of finishing
    #[arg(long)]
    infinite: bool,
    /// Ask the firmware for status reports while knitting
    #[arg(long)]
    continuous_reporting: bool,
    /// Swap light and dark
    #[arg(long)]
    invert: bool,
}

impl JobArgs {
    fn apply(&self, settings: &mut KnittingSettings) {
        if let Some(colors) = self.colors {
            settings.num_colors = colors;
        }
        if let Some(start) = self.start_needle {
            settings.start_needle = start;
        }
        if let Some(stop) = self.stop_needle {
            settings.stop_needle = stop;
        }
        if let Some(alignment) = self.alignment {
            settings.alignment = match alignment {
                AlignmentArg::Center => Alignment::Center,
                AlignmentArg::Left => Alignment::Left,
                AlignmentArg::Right => Alignment::Right,
            };
        }
        if let Some(offset) = self.offset {
            settings.alignment = Alignment::Offset(offset);
        }
        if let Some(start_line) = self.start_line {
            settings.start_line = start_line;
        }
        settings.infinite_repeat |= self.infinite;
        settings.continuous_reporting |= self.continuous_reporting;
    }

    fn setup(&self, config: &Config) -> anyhow::Result<JobSetup> {
        let mut settings = config.knitting.clone();
        self.apply(&mut settings);
        JobSetup::load(&self.image, &settings, self.invert)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging()?;
    tracing::debug!("knitkit {} built {}", VERSION, BUILD_DATE);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let mut config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    match cli.command {
        Command::Ports => {
            for port in list_ports()? {
                println!("{}\t{}", port.port_name, port.description);
            }
        }
        Command::Preview(job) => {
            let setup = job.setup(&config)?;
            print!("{}", render_preview(&setup.encoder()?));
        }
        Command::Knit { job, port } => {
            if let Some(port) = port {
                config.connection.port = port;
            }
            let setup = job.setup(&config)?;
            let port = resolve_port(&config.connection)?;

            let transport = SerialTransport::with_settings(
                config.connection.baud_rate,
                config.connection.read_timeout(),
            );
            let mut controller = SessionController::new(transport);
            setup.configure(&mut controller)?;

            let (_, state) =
                drive_session(controller, worker_config(&config.connection, port)).await?;
            report(state);

            config.add_recent_file(job.image.clone());
            save_recent(&config, &config_path);
        }
        Command::Simulate { job, pass_delay_ms } => {
            let setup = job.setup(&config)?;
            let encoder = setup.encoder()?;
            let cycles = if setup.options.infinite_repeat { 2 } else { 1 };
            let script = request_script(&encoder, setup.start.start_line(), cycles);

            let device = SimulatedDevice::new(
                SimulatedDeviceConfig {
                    pass_delay: Duration::from_millis(pass_delay_ms),
                    ..Default::default()
                },
                script,
            );
            let mut controller = SessionController::new(device.clone());
            setup.configure(&mut controller)?;

            // Infinite repeat stops requesting when the script runs out; Ctrl-C ends it.
            let mut worker = worker_config(&config.connection, "simulated");
            worker.settle_delay = Duration::ZERO;

            let (_, state) = drive_session(controller, worker).await?;
            report(state);
            println!("{} lines accepted by the simulated device", device.lines().len());
        }
        Command::SaveConfig { path } => {
            let path = path.unwrap_or(config_path);
            config.save_to_file(&path)?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

fn report(state: SessionState) {
    match state {
        SessionState::Finished => println!("Finished"),
        SessionState::Configured => println!("Cancelled"),
        other => println!("Session ended in state {}", other),
    }
}

fn save_recent(config: &Config, path: &Path) {
    if let Err(e) = config.save_to_file(path) {
        tracing::warn!("Could not update recent files in {}: {}", path.display(), e);
    }
}
