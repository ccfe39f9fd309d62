//! Session worker
//!
//! Runs a whole knitting session on a blocking task: open the port, let the
//! firmware reset, optionally check its API version, start knitting and
//! service line requests until the session ends. The controller is handed
//! back when the task is joined so it can be reconfigured.

use super::controller::{SessionController, SessionObserver};
use knitkit_core::{Error, Result, SessionState};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Settings of a session run
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Port to open
    pub port: String,
    /// Pause after opening while the firmware resets
    pub settle_delay: Duration,
    /// Ask for the firmware API version before starting
    pub handshake: bool,
    /// Bound on waiting for `cnfInfo` and `cnfStart`
    pub response_timeout: Duration,
    /// Bound on silence between line requests
    pub idle_timeout: Option<Duration>,
    /// Time to keep answering re-requests of the last line after finishing
    pub finish_linger: Duration,
}

impl WorkerConfig {
    /// Default settings for a port
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            settle_delay: Duration::from_secs(1),
            handshake: true,
            response_timeout: Duration::from_secs(5),
            idle_timeout: None,
            finish_linger: Duration::from_millis(500),
        }
    }
}

/// Result of a joined session
pub struct SessionOutcome {
    /// The controller, ready to be reconfigured
    pub controller: SessionController,
    /// Final state, or the error that ended the session
    pub result: Result<SessionState>,
}

/// Handle to a running session
pub struct SessionHandle {
    shutdown_tx: mpsc::Sender<()>,
    observer: SessionObserver,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    /// Ask the worker to cancel knitting
    pub fn cancel(&self) {
        let _ = self.shutdown_tx.try_send(());
    }

    /// Read-only view of the session
    pub fn observer(&self) -> &SessionObserver {
        &self.observer
    }

    /// Check whether the worker has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the worker to exit
    pub async fn join(self) -> Result<SessionOutcome> {
        self.task
            .await
            .map_err(|e| Error::other(format!("Session worker failed: {}", e)))
    }
}

/// Run a configured session on a blocking task
///
/// Must be called from within a tokio runtime.
pub fn spawn_session(controller: SessionController, config: WorkerConfig) -> SessionHandle {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let observer = controller.observer();

    let task = tokio::task::spawn_blocking(move || {
        let mut controller = controller;
        let mut shutdown_rx = shutdown_rx;
        let result = run_session(&mut controller, &config, &mut shutdown_rx);

        if let Err(e) = controller.close() {
            tracing::warn!("Failed to close {}: {}", config.port, e);
        }
        match &result {
            Ok(state) => tracing::info!("Session on {} ended in state {}", config.port, state),
            Err(e) => tracing::error!("Session on {} failed: {}", config.port, e),
        }

        SessionOutcome { controller, result }
    });

    SessionHandle {
        shutdown_tx,
        observer,
        task,
    }
}

fn run_session(
    controller: &mut SessionController,
    config: &WorkerConfig,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<SessionState> {
    controller.open(&config.port)?;

    if !config.settle_delay.is_zero() {
        tracing::debug!("Waiting {:?} for the firmware to settle", config.settle_delay);
        std::thread::sleep(config.settle_delay);
    }

    if config.handshake {
        controller.request_info()?;
        controller.wait_for(config.response_timeout, "cnfInfo", |c| {
            c.device_api_version().is_some()
        })?;
    }

    controller.knit()?;
    controller.wait_for(config.response_timeout, "cnfStart", |c| {
        c.start_confirmed() || c.state() != SessionState::Knitting
    })?;

    loop {
        if shutdown_rx.try_recv().is_ok() {
            if controller.state() == SessionState::Knitting {
                controller.cancel()?;
            }
            break;
        }

        if controller.state() != SessionState::Knitting {
            break;
        }

        controller.service()?;

        if let Some(idle_timeout) = config.idle_timeout {
            if controller.state() == SessionState::Knitting && controller.idle_time() > idle_timeout {
                tracing::warn!("No line request for {:?}", controller.idle_time());
                return Err(controller.fail_timeout(idle_timeout));
            }
        }
    }

    if controller.state() == SessionState::Finished {
        linger(controller, config.finish_linger);
    }

    Ok(controller.state())
}

// Keep the port open until the device stays quiet for `quiet`.
fn linger(controller: &mut SessionController, quiet: Duration) {
    while controller.idle_time() < quiet {
        if let Err(e) = controller.service() {
            tracing::warn!("Stopped listening after the last line: {}", e);
            break;
        }
    }
}
