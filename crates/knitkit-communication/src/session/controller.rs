//! Knitting session controller
//!
//! Owns the transport, the configured job and the line cursor, and drives
//! the request/confirm exchange with the firmware. State changes go through
//! [`knitkit_core::transition`] so observers and the engine agree on the
//! table.

use super::cursor::LineCursor;
use crate::protocol::{decode_frame, hex_dump, separator_len, DeviceMessage, HostMessage, LineFlags};
use crate::transport::Transport;
use knitkit_core::{
    transition, ConfigurationError, DeviceRejection, Error, EventDispatcher, KnitOptions,
    NeedleRange, ProgressSnapshot, ProgressTracker, ProtocolViolation, Result, SessionError,
    SessionEvent, SessionState, StartPosition, TransportError, Trigger,
};
use knitkit_pattern::{KnitImage, LineEncoder};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// A validated knitting job
#[derive(Debug, Clone)]
pub struct KnitJob {
    encoder: LineEncoder,
    start: StartPosition,
    options: KnitOptions,
}

impl KnitJob {
    /// Encoder over the placed image
    pub fn encoder(&self) -> &LineEncoder {
        &self.encoder
    }

    /// Start line of the job
    pub fn start(&self) -> StartPosition {
        self.start
    }

    /// Options the job was configured with
    pub fn options(&self) -> &KnitOptions {
        &self.options
    }
}

/// Read-only view of a running session
#[derive(Clone)]
pub struct SessionObserver {
    state: Arc<RwLock<SessionState>>,
    progress: ProgressTracker,
    events: EventDispatcher,
}

impl SessionObserver {
    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Latest progress snapshot
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[derive(Debug, Clone)]
struct SentLine {
    line_number: u8,
    frame: Vec<u8>,
}

/// Protocol engine and state machine of a knitting session
pub struct SessionController {
    transport: Box<dyn Transport>,
    state: Arc<RwLock<SessionState>>,
    progress: ProgressTracker,
    events: EventDispatcher,
    job: Option<KnitJob>,
    cursor: Option<LineCursor>,
    last_sent: Option<SentLine>,
    rx_buffer: Vec<u8>,
    device_api_version: Option<u8>,
    start_confirmed: bool,
    last_activity: Instant,
}

impl SessionController {
    /// Create a controller in the `Activated` state
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            transport: Box::new(transport),
            state: Arc::new(RwLock::new(SessionState::Activated)),
            progress: ProgressTracker::new(),
            events: EventDispatcher::default(),
            job: None,
            cursor: None,
            last_sent: None,
            rx_buffer: Vec::new(),
            device_api_version: None,
            start_confirmed: false,
            last_activity: Instant::now(),
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Latest progress snapshot
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Shared progress tracker
    pub fn progress_tracker(&self) -> ProgressTracker {
        self.progress.clone()
    }

    /// Event dispatcher of this session
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Read-only view for other threads
    pub fn observer(&self) -> SessionObserver {
        SessionObserver {
            state: Arc::clone(&self.state),
            progress: self.progress.clone(),
            events: self.events.clone(),
        }
    }

    /// Configured job, if any
    pub fn job(&self) -> Option<&KnitJob> {
        self.job.as_ref()
    }

    /// API version the firmware reported
    pub fn device_api_version(&self) -> Option<u8> {
        self.device_api_version
    }

    /// Check whether the firmware confirmed the current start
    pub fn start_confirmed(&self) -> bool {
        self.start_confirmed
    }

    /// Time since the firmware last sent a message
    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// The underlying transport
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Open the transport
    pub fn open(&mut self, port: &str) -> Result<()> {
        if let Err(e) = self.transport.open(port) {
            return Err(self.fail(e));
        }
        self.rx_buffer.clear();
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Close the transport
    pub fn close(&mut self) -> Result<()> {
        self.transport.close()?;
        Ok(())
    }

    /// Validate and store a job
    ///
    /// The needle range is placed for the image width and alignment. On
    /// error neither the state nor the previous job change.
    pub fn configure(
        &mut self,
        image: KnitImage,
        range: NeedleRange,
        start: StartPosition,
        options: KnitOptions,
    ) -> Result<()> {
        let next = transition(self.state(), Trigger::Configure)?;
        let placed = range.placed(image.width(), options.alignment)?;
        start.validate(image.height())?;
        let encoder = LineEncoder::new(image, placed)?;

        tracing::info!(
            "Configured {} passes on {}, starting at line {} ({})",
            encoder.pass_count(),
            placed,
            start.start_line(),
            options.alignment
        );

        self.job = Some(KnitJob {
            encoder,
            start,
            options,
        });
        self.cursor = None;
        self.last_sent = None;
        self.start_confirmed = false;
        self.progress.reset();
        self.set_state(next);
        Ok(())
    }

    /// Ask the firmware to start knitting the configured job
    pub fn knit(&mut self) -> Result<()> {
        let next = transition(self.state(), Trigger::Knit)?;
        let (request, cursor) = {
            let job = self.job.as_ref().ok_or(SessionError::NotConfigured)?;
            let range = job.encoder.range();
            let cursor = LineCursor::start(&job.encoder, job.start).ok_or(
                ConfigurationError::InvalidStartLine {
                    start_line: job.start.start_line(),
                    height: job.encoder.height(),
                },
            )?;
            let request = HostMessage::ReqStart {
                start_needle: range.knit_start(),
                stop_needle: range.knit_stop(),
                continuous_reporting: job.options.continuous_reporting,
            };
            (request, cursor)
        };

        if !self.transport.is_open() {
            return Err(self.fail(TransportError::NotOpen));
        }

        self.cursor = Some(cursor);
        self.last_sent = None;
        self.start_confirmed = false;
        self.last_activity = Instant::now();
        self.set_state(next);
        self.send(&request)
    }

    /// Ask the firmware for its API version
    pub fn request_info(&mut self) -> Result<()> {
        self.send(&HostMessage::ReqInfo)
    }

    /// Ask the firmware to run its self test
    pub fn request_test(&mut self) -> Result<()> {
        self.send(&HostMessage::ReqTest)
    }

    /// Stop knitting and keep the job for a restart
    pub fn cancel(&mut self) -> Result<()> {
        let next = transition(self.state(), Trigger::Cancel)?;
        tracing::info!("Knitting cancelled at {}", self.progress());
        self.cursor = None;
        self.last_sent = None;
        self.set_state(next);
        self.events.publish(SessionEvent::Cancelled);
        Ok(())
    }

    /// Read pending bytes and handle every complete message
    ///
    /// Blocks for at most one transport read timeout. Returns the number of
    /// messages handled.
    pub fn service(&mut self) -> Result<usize> {
        if let Err(e) = self.transport.read_available(&mut self.rx_buffer) {
            if self.state().is_terminal() {
                return Err(e.into());
            }
            return Err(self.fail(e));
        }

        let mut handled = 0;
        loop {
            match decode_frame(&self.rx_buffer) {
                Ok(Some((consumed, message))) => {
                    self.rx_buffer.drain(..consumed);
                    self.handle_message(message)?;
                    handled += 1;
                }
                Ok(None) => {
                    let skip = separator_len(&self.rx_buffer);
                    self.rx_buffer.drain(..skip);
                    break;
                }
                Err(violation) => {
                    let raw = hex_dump(&self.rx_buffer);
                    self.rx_buffer.clear();
                    if self.state().is_terminal() {
                        tracing::warn!("Discarding [{}] after session end: {}", raw, violation);
                        break;
                    }
                    tracing::error!("Protocol violation: {} in [{}]", violation, raw);
                    return Err(self.fail(violation));
                }
            }
        }
        Ok(handled)
    }

    /// Service the transport until `done` holds or `timeout` expires
    pub fn wait_for<F>(&mut self, timeout: Duration, what: &str, done: F) -> Result<()>
    where
        F: Fn(&Self) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if done(self) {
                return Ok(());
            }
            if self.state() == SessionState::Error {
                return Err(Error::other(format!("session failed while waiting for {}", what)));
            }
            self.service()?;
            if Instant::now() >= deadline {
                tracing::warn!("Timed out waiting for {}", what);
                return Err(self.fail(TransportError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }));
            }
        }
    }

    /// Fail the session on a timeout detected outside the controller
    pub fn fail_timeout(&mut self, timeout: Duration) -> Error {
        self.fail(TransportError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// Handle one decoded device message
    pub fn handle_message(&mut self, message: DeviceMessage) -> Result<()> {
        self.last_activity = Instant::now();
        tracing::trace!("Received {}", message);

        match message {
            DeviceMessage::CnfStart { success } => self.on_start_confirmed(success),
            DeviceMessage::CnfInfo { api_version } => self.on_device_info(api_version),
            DeviceMessage::CnfTest { result } => {
                tracing::info!("Device self test result: {}", result);
                self.events.publish(SessionEvent::TestResult(result));
                Ok(())
            }
            DeviceMessage::IndState(status) => {
                tracing::debug!(
                    "Device status: ready={} {} at {} hall={}/{}",
                    status.ready,
                    status.carriage,
                    status.carriage_position,
                    status.hall_left,
                    status.hall_right
                );
                self.events.publish(SessionEvent::DeviceStatus(status));
                Ok(())
            }
            DeviceMessage::ReqLine { line_number } => self.on_line_request(line_number),
        }
    }

    fn on_start_confirmed(&mut self, success: bool) -> Result<()> {
        if self.state() != SessionState::Knitting {
            tracing::warn!("Ignoring cnfStart in state {}", self.state());
            return Ok(());
        }

        match transition(SessionState::Knitting, Trigger::StartConfirmed { success })? {
            SessionState::Knitting => {
                tracing::info!("Device started knitting");
                self.start_confirmed = true;
                Ok(())
            }
            _ => Err(self.fail(DeviceRejection::StartRejected)),
        }
    }

    fn on_device_info(&mut self, api_version: u8) -> Result<()> {
        tracing::info!("Firmware API version {}", api_version);
        self.device_api_version = Some(api_version);
        self.events.publish(SessionEvent::DeviceInfo { api_version });

        let expected = self
            .job
            .as_ref()
            .and_then(|job| job.options.expected_api_version);
        match expected {
            Some(expected) if expected != api_version => {
                Err(self.fail(DeviceRejection::ApiVersionMismatch {
                    expected,
                    actual: api_version,
                }))
            }
            _ => Ok(()),
        }
    }

    fn on_line_request(&mut self, line_number: u8) -> Result<()> {
        match self.state() {
            SessionState::Knitting => {}
            SessionState::Finished => {
                // The last line can still fail the device's checksum.
                if let Some(frame) = self.sent_frame(line_number) {
                    tracing::warn!("Device requested last line {} again, re-sending", line_number);
                    return self.write_frame(&frame);
                }
                tracing::debug!("Ignoring reqLine {} after session end", line_number);
                return Ok(());
            }
            SessionState::Error => {
                tracing::debug!("Ignoring reqLine {} after session end", line_number);
                return Ok(());
            }
            state => {
                tracing::warn!("Ignoring reqLine {} in state {}", line_number, state);
                return Ok(());
            }
        }

        let Some(cursor) = self.cursor else {
            return Err(self.fail(ProtocolViolation::SequenceExhausted {
                received: line_number,
            }));
        };

        if cursor.resolve(line_number) == cursor.line() {
            return self.serve_line(line_number, cursor);
        }

        if let Some(frame) = self.sent_frame(line_number) {
            tracing::warn!("Device requested line {} again, re-sending", line_number);
            return self.write_frame(&frame);
        }

        Err(self.fail(ProtocolViolation::UnexpectedLine {
            expected: cursor.wire_line(),
            received: line_number,
        }))
    }

    fn sent_frame(&self, line_number: u8) -> Option<Vec<u8>> {
        self.last_sent
            .as_ref()
            .filter(|sent| sent.line_number == line_number)
            .map(|sent| sent.frame.clone())
    }

    fn serve_line(&mut self, line_number: u8, cursor: LineCursor) -> Result<()> {
        let served = self.job.as_ref().and_then(|job| {
            let repeat = job.options.infinite_repeat;
            let line = job.encoder.encode(cursor.row(), cursor.color())?;
            let last = !repeat && job.encoder.is_final(cursor.row(), cursor.color());
            let mut next = cursor;
            let more = next.advance(&job.encoder, repeat);
            Some((line, last, more.then_some(next), job.encoder.height()))
        });
        let Some((line, last, next_cursor, height)) = served else {
            return Err(self.fail(ProtocolViolation::SequenceExhausted {
                received: line_number,
            }));
        };

        let flags = if last {
            LineFlags::LAST_LINE
        } else {
            LineFlags::empty()
        };
        let frame = HostMessage::CnfLine {
            line_number,
            data: line.to_wire_bytes(),
            flags,
        }
        .encode();
        self.write_frame(&frame)?;

        tracing::debug!(
            "Sent line {} (row {} color {}, {} needles{})",
            line_number,
            cursor.row(),
            cursor.color(),
            line.active_count(),
            if last { ", last" } else { "" }
        );
        tracing::trace!("{}", line.render());

        self.last_sent = Some(SentLine { line_number, frame });
        self.progress.update(
            cursor.row() as i32,
            height as i32,
            cursor.repeats() as i32,
            cursor.color() as i32,
        )?;
        self.events
            .publish(SessionEvent::Progress(self.progress.snapshot()));

        let next_state = transition(SessionState::Knitting, Trigger::LineServed { last })?;
        self.cursor = next_cursor.filter(|_| !last);
        if last {
            self.set_state(next_state);
            tracing::info!("Last line sent, knitting finished");
            self.events.publish(SessionEvent::Finished);
        }
        Ok(())
    }

    fn send(&mut self, message: &HostMessage) -> Result<()> {
        tracing::debug!("Sending {}", message);
        self.write_frame(&message.encode())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        if let Err(e) = self.transport.write(frame) {
            return Err(self.fail(e));
        }
        tracing::trace!("Wrote [{}]", hex_dump(frame));
        Ok(())
    }

    fn fail(&mut self, error: impl Into<Error>) -> Error {
        let error = error.into();
        tracing::error!("Session failed: {}", error);
        self.cursor = None;
        let next = transition(self.state(), Trigger::Fail).unwrap_or(SessionState::Error);
        self.set_state(next);
        self.events.publish(SessionEvent::Failed(error.to_string()));
        error
    }

    fn set_state(&self, next: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            tracing::info!("Session state {} -> {}", previous, next);
            self.events.publish(SessionEvent::StateChanged(next));
        }
    }
}
