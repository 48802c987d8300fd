//! Request/response state machine over a matcher's line protocol.

use std::path::Path;

use log::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::process::{ChildProcess, LineTransport};
use crate::protocol::ProtocolLine;

/// Lifecycle of an [`ApiController`].
///
/// ```text
/// Unstarted -> Starting -> Ready <-> AwaitingResponse
///                  |         |              |
///                  +---------+--> Failed <--+
/// any state --close--> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Unstarted,
    /// Process running, startup readiness not yet observed.
    Starting,
    Ready,
    AwaitingResponse,
    Failed,
    Closed,
}

/// Exclusive owner of one matcher process.
///
/// Every command goes through [`request`](ApiController::request), which
/// waits for `API_READY` before writing and then blocks for the matching
/// `API_RESPONSE:` line, so at most one command is ever in flight. There is no
/// timeout: a hung matcher blocks the caller until [`close`](ApiController::close)
/// is called from elsewhere or the process dies.
///
/// Dropping the controller terminates the process.
pub struct ApiController<T: LineTransport> {
    transport: Option<T>,
    state: ControllerState,
    // API_READY for the next command has already been read
    handshake_done: bool,
}

impl<T: LineTransport> Default for ApiController<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: LineTransport> ApiController<T> {
    pub fn new() -> Self {
        Self {
            transport: None,
            state: ControllerState::Unstarted,
            handshake_done: false,
        }
    }

    /// Controller over an already running matcher.
    pub fn with_transport(transport: T) -> Self {
        let mut controller = Self::new();
        controller.transport = Some(transport);
        controller.state = ControllerState::Starting;
        controller
    }

    /// Takes ownership of a running matcher. Only valid once, from `Unstarted`.
    pub fn attach(&mut self, transport: T) -> Result<()> {
        if self.state != ControllerState::Unstarted {
            return Err(Error::NotReady(self.state));
        }
        self.transport = Some(transport);
        self.state = ControllerState::Starting;
        Ok(())
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether a request may be issued.
    pub fn is_usable(&self) -> bool {
        matches!(
            self.state,
            ControllerState::Starting | ControllerState::Ready
        )
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.is_usable() {
            Ok(())
        } else {
            Err(Error::NotReady(self.state))
        }
    }

    fn fail(&mut self, reason: String) -> Error {
        error!("{}", reason);
        self.state = ControllerState::Failed;
        Error::Protocol(reason)
    }

    fn next_line(&mut self) -> Result<ProtocolLine> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(Error::NotReady(self.state))?;
        match transport.read_line() {
            Ok(line) => Ok(ProtocolLine::classify(line.as_deref())),
            Err(err) => Err(self.fail(format!("failed to read from matcher: {}", err))),
        }
    }

    /// Reads until the matcher announces `API_READY`.
    ///
    /// Diagnostic lines are logged and dropped. A successful response seen
    /// here (the startup announcement) is discarded; an error response is
    /// returned as [`Error::RequestRejected`]. End of stream fails the
    /// controller.
    pub fn await_ready(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if self.handshake_done {
            return Ok(());
        }
        loop {
            match self.next_line()? {
                ProtocolLine::Ready => {
                    self.handshake_done = true;
                    self.state = ControllerState::Ready;
                    return Ok(());
                }
                ProtocolLine::ResponseOk(payload) => {
                    debug!("discarding unsolicited response: {}", payload);
                }
                ProtocolLine::ResponseError(message) => {
                    warn!("matcher reported an error while idle: {}", message);
                    return Err(Error::RequestRejected(message));
                }
                ProtocolLine::Unclassified(line) => debug!("matcher: {}", line),
                ProtocolLine::StreamClosed => {
                    return Err(
                        self.fail("matcher closed its output before announcing readiness".into())
                    );
                }
            }
        }
    }

    /// Sends one command and returns the response payload.
    ///
    /// The readiness handshake is part of the call: the command is written
    /// only after `API_READY` has been read, and the call returns only after
    /// the response line has been read. Rejected commands leave the controller
    /// `Ready`; protocol failures leave it `Failed` and every later call fails
    /// without touching the process.
    pub fn request(&mut self, command: &str) -> Result<String> {
        self.ensure_usable()?;
        if command.contains(|c| c == '\r' || c == '\n') {
            return Err(Error::InvalidInput(format!(
                "command must be a single line: {:?}",
                command
            )));
        }
        self.await_ready()?;

        self.state = ControllerState::AwaitingResponse;
        self.handshake_done = false;
        debug!("-> {}", command);
        let sent = match self.transport.as_mut() {
            Some(transport) => transport.send_line(command),
            None => return Err(self.fail("matcher transport missing".into())),
        };
        if let Err(err) = sent {
            return Err(self.fail(format!("failed to write to matcher: {}", err)));
        }

        loop {
            match self.next_line()? {
                ProtocolLine::ResponseOk(payload) => {
                    debug!("<- {}", payload);
                    self.state = ControllerState::Ready;
                    return Ok(payload);
                }
                ProtocolLine::ResponseError(message) => {
                    warn!("matcher rejected `{}`: {}", command, message);
                    self.state = ControllerState::Ready;
                    return Err(Error::RequestRejected(message));
                }
                ProtocolLine::Ready => {
                    warn!("matcher became ready without answering `{}`", command);
                    self.handshake_done = true;
                    self.state = ControllerState::Ready;
                    return Ok(String::new());
                }
                ProtocolLine::Unclassified(line) => debug!("matcher: {}", line),
                ProtocolLine::StreamClosed => {
                    return Err(self.fail(format!(
                        "matcher closed its output while `{}` was pending",
                        command
                    )));
                }
            }
        }
    }

    /// Terminates the matcher. Idempotent and valid from every state.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ControllerState::Closed {
            return Ok(());
        }
        self.state = ControllerState::Closed;
        self.handshake_done = false;
        if let Some(mut transport) = self.transport.take() {
            info!("closing matcher");
            transport.terminate()?;
        }
        Ok(())
    }
}

impl ApiController<ChildProcess> {
    /// Launches the matcher in `api` mode and takes ownership of it.
    pub fn start(&mut self, executable: &Path) -> Result<()> {
        if self.state != ControllerState::Unstarted {
            return Err(Error::NotReady(self.state));
        }
        match ChildProcess::spawn(executable) {
            Ok(process) => {
                info!(
                    "started matcher {} (pid {})",
                    executable.display(),
                    process.id()
                );
                self.attach(process)
            }
            Err(err) => {
                error!("{}", err);
                self.state = ControllerState::Failed;
                Err(err)
            }
        }
    }

    pub fn spawn(executable: &Path) -> Result<Self> {
        let mut controller = Self::new();
        controller.start(executable)?;
        Ok(controller)
    }
}

impl<T: LineTransport> Drop for ApiController<T> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to close matcher: {}", err);
        }
    }
}
