//! Per-client command loop.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{tokenize, CommandDispatcher};
use crate::control::{read_line, write_line, write_text};
use crate::files::PathSandbox;
use crate::transfer::FileSender;

/// Line that ends a session.
pub const BYE_COMMAND: &str = "bye";

/// Reply to [`BYE_COMMAND`].
pub const FAREWELL: &str = "Bye for now!";

/// Default time a session may sit without input.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default pause after each command.
pub const DEFAULT_COMMAND_PACING: Duration = Duration::from_millis(1);

/// Session loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Close the session after this long without a command line.
    pub idle_timeout: Duration,
    /// Pause after each command before reading the next.
    pub command_pacing: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            command_pacing: DEFAULT_COMMAND_PACING,
        }
    }
}

/// Why a session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client said `bye`.
    Farewell,
    /// The control channel reached end of input.
    Disconnected,
    /// No input within the idle timeout.
    IdleTimeout,
    /// The server is shutting down.
    Shutdown,
}

/// Drives one client's prompt, read, dispatch cycle.
///
/// Owns the session's sandbox and datagram sender; the control channel is
/// any buffered reader and writer pair, so tests can run it over in-memory
/// pipes.
pub struct SessionCoordinator<R, W> {
    reader: R,
    writer: W,
    sandbox: PathSandbox,
    sender: FileSender,
    settings: SessionSettings,
}

impl<R, W> SessionCoordinator<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        reader: R,
        writer: W,
        sandbox: PathSandbox,
        sender: FileSender,
        settings: SessionSettings,
    ) -> Self {
        Self {
            reader,
            writer,
            sandbox,
            sender,
            settings,
        }
    }

    /// The session's sandbox, for inspection after the loop ends.
    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Run until the client leaves, goes idle, or `shutdown` fires.
    ///
    /// Command failures are written to the client and the loop continues.
    /// Only control-channel I/O errors end the session with an error.
    pub async fn run(&mut self, shutdown: CancellationToken) -> io::Result<SessionEnd> {
        loop {
            write_line(&mut self.writer, &self.sandbox.prompt()).await?;

            // Continuation lines are read under the same deadline, so a
            // dangling backslash cannot hold the session open.
            let request = tokio::select! {
                _ = shutdown.cancelled() => return Ok(SessionEnd::Shutdown),
                request = timeout(self.settings.idle_timeout, next_request(&mut self.reader)) => {
                    request
                }
            };
            let args = match request {
                Ok(read) => match read? {
                    Some(Request::Command(args)) => args,
                    Some(Request::Bye) => {
                        write_line(&mut self.writer, FAREWELL).await?;
                        return Ok(SessionEnd::Farewell);
                    }
                    None => return Ok(SessionEnd::Disconnected),
                },
                Err(_) => {
                    info!(
                        timeout_secs = self.settings.idle_timeout.as_secs(),
                        "Closing idle session"
                    );
                    return Ok(SessionEnd::IdleTimeout);
                }
            };
            debug!(?args, "Command received");

            let mut dispatcher = CommandDispatcher::new(&mut self.sandbox, &self.sender);
            match dispatcher.dispatch(&args).await {
                Ok(Some(output)) => write_text(&mut self.writer, &output).await?,
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "Command failed");
                    write_line(&mut self.writer, &err.to_string()).await?;
                }
            }

            if !self.settings.command_pacing.is_zero() {
                sleep(self.settings.command_pacing).await;
            }
        }
    }
}

enum Request {
    Bye,
    Command(Vec<String>),
}

/// Read one logical command, continuation lines included.
///
/// Returns `None` at end of input.
async fn next_request<R>(reader: &mut R) -> io::Result<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(line) = read_line(reader).await? else {
        return Ok(None);
    };
    if line.trim() == BYE_COMMAND {
        return Ok(Some(Request::Bye));
    }
    Ok(Some(Request::Command(tokenize(&line, reader).await?)))
}
