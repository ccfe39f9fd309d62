//! Glue between the configuration file, the pattern encoder and the session
//! worker, shared by the command line front end and its tests.

use anyhow::{bail, Context};
use knitkit_communication::{
    list_ports, spawn_session, SessionController, SessionOutcome, WorkerConfig,
};
use knitkit_core::{KnitOptions, NeedleRange, SessionEvent, SessionState, StartPosition};
use knitkit_pattern::{KnitImage, LineEncoder};
use knitkit_settings::{ConnectionSettings, KnittingSettings};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Everything `SessionController::configure` needs for one job
#[derive(Debug, Clone)]
pub struct JobSetup {
    /// Quantized image
    pub image: KnitImage,
    /// Unplaced knit window
    pub range: NeedleRange,
    /// Image row knitting starts at
    pub start: StartPosition,
    /// Alignment, reporting, repeat and API version options
    pub options: KnitOptions,
}

impl JobSetup {
    /// Build a job from in-memory parts and the knitting settings
    pub fn new(image: KnitImage, settings: &KnittingSettings) -> anyhow::Result<Self> {
        let range = settings.needle_range()?;
        let start = settings.start_position();
        start.validate(image.height())?;

        Ok(Self {
            image,
            range,
            start,
            options: settings.knit_options(),
        })
    }

    /// Load an image file and quantize it with the configured color count
    pub fn load(path: &Path, settings: &KnittingSettings, invert: bool) -> anyhow::Result<Self> {
        let mut image = KnitImage::open(path, settings.num_colors)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        if invert {
            image = image.inverted();
        }
        tracing::info!(
            "Loaded {} ({}x{}, {} colors)",
            path.display(),
            image.width(),
            image.height(),
            image.num_colors()
        );
        Self::new(image, settings)
    }

    /// Encoder for the image placed in the knit window
    pub fn encoder(&self) -> anyhow::Result<LineEncoder> {
        let placed = self.range.placed(self.image.width(), self.options.alignment)?;
        Ok(LineEncoder::new(self.image.clone(), placed)?)
    }

    /// Hand the job to a controller
    pub fn configure(self, controller: &mut SessionController) -> knitkit_core::Result<()> {
        controller.configure(self.image, self.range, self.start, self.options)
    }
}

/// Worker settings for a port
pub fn worker_config(connection: &ConnectionSettings, port: impl Into<String>) -> WorkerConfig {
    WorkerConfig {
        port: port.into(),
        settle_delay: connection.settle_delay(),
        handshake: connection.handshake,
        response_timeout: connection.response_timeout(),
        idle_timeout: connection.idle_timeout(),
        ..WorkerConfig::default()
    }
}

/// Pick the configured port, or the only candidate when none is configured
pub fn resolve_port(connection: &ConnectionSettings) -> anyhow::Result<String> {
    if !connection.port.is_empty() {
        return Ok(connection.port.clone());
    }

    let ports = list_ports()?;
    match ports.as_slice() {
        [] => bail!("No serial port found; pass one with --port"),
        [only] => {
            tracing::info!("Using {} ({})", only.port_name, only.description);
            Ok(only.port_name.clone())
        }
        _ => {
            let names: Vec<_> = ports.iter().map(|p| p.port_name.as_str()).collect();
            bail!("Several serial ports found ({}); pass one with --port", names.join(", "))
        }
    }
}

/// Text rendering of every pass, in knitting order
pub fn render_preview(encoder: &LineEncoder) -> String {
    let range = encoder.range();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} passes on needles {}..={}",
        encoder.pass_count(),
        range.knit_start(),
        range.knit_stop()
    );
    for (row, color, line) in encoder.passes() {
        let marker = if encoder.is_final(row, color) { " last" } else { "" };
        let _ = writeln!(out, "{:>4} c{} |{}|{}", row, color, line.render(), marker);
    }
    out
}

/// Run a configured controller to completion, logging its events
///
/// Ctrl-C cancels the session. Returns the controller so it can be reused.
pub async fn drive_session(
    controller: SessionController,
    config: WorkerConfig,
) -> anyhow::Result<(SessionController, SessionState)> {
    let mut events = controller.subscribe();
    let handle = spawn_session(controller, config);
    let mut poll = tokio::time::interval(Duration::from_millis(200));
    let mut cancelled = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    log_event(&event);
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Dropped {} session events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c(), if !cancelled => {
                tracing::warn!("Interrupted, cancelling");
                handle.cancel();
                cancelled = true;
            }
            _ = poll.tick() => {
                if handle.is_finished() {
                    break;
                }
            }
        }
    }

    let SessionOutcome { controller, result } = handle.join().await?;
    let state = result?;
    Ok((controller, state))
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Progress(progress) => tracing::info!("{}", progress),
        SessionEvent::DeviceStatus(_) => tracing::debug!("{}", event),
        SessionEvent::Failed(reason) => tracing::error!("Knitting failed: {}", reason),
        _ => tracing::info!("{}", event),
    }
}
