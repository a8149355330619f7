//! Interactive client side of a session.
//!
//! [`ClientSession`] performs the handshake, sends command lines and
//! collects responses up to the next prompt. For `get` it runs the datagram
//! receiver alongside the response read, so the file is captured while the
//! server streams it.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::path::MAIN_SEPARATOR;

use protocol::{ProtocolError, SessionInfo, DEFAULT_CHUNK_SIZE};
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::command::{Command, CommandScanner};
use crate::control::{read_line, write_line};
use crate::session::{BYE_COMMAND, FAREWELL};
use crate::transfer::{FileReceiver, ReceiveEvent, ReceiveReport, TransferError, TransferTimings};

/// Prefix of the server's handshake acknowledgement.
const ACKNOWLEDGEMENT_PREFIX: &str = "Session establishing:";

/// Errors that end or prevent a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered the handshake with something other than an
    /// acknowledgement.
    #[error("server rejected session: {0}")]
    Rejected(String),

    /// The control connection is closed.
    #[error("connection closed by server")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Client-side knobs.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Where received files are written.
    pub download_dir: PathBuf,
    /// Maximum payload per datagram requested from the server.
    pub chunk_size: usize,
    /// Receive timeouts.
    pub timings: TransferTimings,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timings: TransferTimings::default(),
        }
    }
}

/// Result of one command round trip.
#[derive(Debug)]
pub struct CommandOutcome {
    /// Response lines before the prompt.
    pub lines: Vec<String>,
    /// The prompt that followed, or `None` once the session has ended.
    pub prompt: Option<String>,
    /// Outcome of the datagram receive, for a `get` the server accepted.
    pub transfer: Option<Result<ReceiveReport, TransferError>>,
}

/// A connected, handshaken session.
pub struct ClientSession {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    receiver: FileReceiver,
    info: SessionInfo,
    acknowledgement: String,
    prompt: String,
    closed: bool,
}

impl ClientSession {
    /// Connect, bind the datagram socket and perform the handshake.
    ///
    /// Returns once the first prompt has been read.
    pub async fn connect(
        server: impl ToSocketAddrs,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server).await?;
        let local = stream.local_addr()?;

        let receiver = FileReceiver::bind(
            SocketAddr::new(local.ip(), 0),
            options.download_dir,
            options.timings,
        )
        .await?;
        let info = SessionInfo::new(
            local.ip(),
            local.port(),
            receiver.local_addr()?.port(),
            options.chunk_size,
        );
        info.validate()?;

        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_line(&mut writer, &info.to_json()?).await?;
        let acknowledgement = read_line(&mut reader).await?.ok_or(ClientError::Closed)?;
        if !acknowledgement.starts_with(ACKNOWLEDGEMENT_PREFIX) {
            return Err(ClientError::Rejected(acknowledgement));
        }
        let prompt = read_line(&mut reader).await?.ok_or(ClientError::Closed)?;
        info!(session = %info.id, "Connected: {}", acknowledgement);

        Ok(Self {
            reader,
            writer,
            receiver,
            info,
            acknowledgement,
            prompt,
            closed: false,
        })
    }

    /// The handshake record sent to the server.
    pub fn session_info(&self) -> &SessionInfo {
        &self.info
    }

    /// The server's handshake acknowledgement line.
    pub fn acknowledgement(&self) -> &str {
        &self.acknowledgement
    }

    /// The most recent prompt.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Whether the server has ended the session.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send one command and read its response.
    ///
    /// `text` may span several lines when the first ends in a continuation
    /// backslash. Only the lines that belong to the first command are sent.
    /// For a `get`, `on_event` observes the receive.
    pub async fn execute<F>(
        &mut self,
        text: &str,
        on_event: F,
    ) -> Result<CommandOutcome, ClientError>
    where
        F: FnMut(ReceiveEvent),
    {
        if self.closed {
            return Err(ClientError::Closed);
        }

        let mut lines = text.lines();
        let first = lines.next().unwrap_or("");

        if first.trim() == BYE_COMMAND {
            write_line(&mut self.writer, first).await?;
            let lines = read_until_farewell(&mut self.reader).await?;
            self.closed = true;
            return Ok(CommandOutcome {
                lines,
                prompt: None,
                transfer: None,
            });
        }

        // Send exactly the lines the server will consume for this command. A
        // dangling continuation is closed with a blank line.
        let mut wire = first.to_string();
        let mut scanner = CommandScanner::new(first);
        while scanner.wants_line() {
            let next = lines.next().unwrap_or("");
            wire.push('\n');
            wire.push_str(next);
            scanner.continue_with(Some(next));
        }
        if lines.next().is_some() {
            debug!("Ignoring text after the end of the command");
        }
        write_line(&mut self.writer, &wire).await?;

        let args = scanner.finish();
        let is_get = matches!(Command::parse(&args), Ok(Some(Command::Get(_))));

        let (lines, prompt, transfer) = if is_get {
            let receive = self.receiver.receive(on_event);
            let responses = read_responses(&mut self.reader);
            tokio::pin!(receive);
            tokio::pin!(responses);

            let first_done = tokio::select! {
                result = &mut receive => FirstDone::Transfer(result),
                response = &mut responses => FirstDone::Responses(response),
            };
            match first_done {
                FirstDone::Transfer(result) => {
                    let (lines, prompt) = responses.await?;
                    (lines, prompt, Some(result))
                }
                FirstDone::Responses(response) => {
                    let (lines, prompt) = response?;
                    // the server reported an error instead of sending
                    if lines.is_empty() {
                        (lines, prompt, Some(receive.await))
                    } else {
                        debug!("Abandoning receive: {:?}", lines);
                        (lines, prompt, None)
                    }
                }
            }
        } else {
            let (lines, prompt) = read_responses(&mut self.reader).await?;
            (lines, prompt, None)
        };

        match &prompt {
            Some(prompt) => self.prompt = prompt.clone(),
            None => self.closed = true,
        }

        Ok(CommandOutcome {
            lines,
            prompt,
            transfer,
        })
    }
}

enum FirstDone<T, R> {
    Transfer(T),
    Responses(R),
}

fn is_prompt(line: &str) -> bool {
    line.starts_with(MAIN_SEPARATOR)
}

/// Read response lines up to and including the next prompt.
async fn read_responses(
    reader: &mut BufReader<OwnedReadHalf>,
) -> io::Result<(Vec<String>, Option<String>)> {
    let mut lines = Vec::new();
    while let Some(line) = read_line(reader).await? {
        if is_prompt(&line) {
            return Ok((lines, Some(line)));
        }
        lines.push(line);
    }
    Ok((lines, None))
}

/// Read up to the farewell line, or end of input.
async fn read_until_farewell(reader: &mut BufReader<OwnedReadHalf>) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    while let Some(line) = read_line(reader).await? {
        let done = line == FAREWELL;
        lines.push(line);
        if done {
            break;
        }
    }
    Ok(lines)
}
