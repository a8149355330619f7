//! Executes parsed commands against a session's sandbox.

use std::path::Path;

use tracing::{debug, info};

use super::{Command, CommandError};
use crate::files::{render_listing, ListingEntry, PathSandbox, SandboxError};
use crate::transfer::FileSender;

/// Routes commands for one session.
///
/// Responses are returned rather than written so the caller owns the
/// control channel. `None` means the command produces no output.
pub struct CommandDispatcher<'a> {
    sandbox: &'a mut PathSandbox,
    sender: &'a FileSender,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(sandbox: &'a mut PathSandbox, sender: &'a FileSender) -> Self {
        Self { sandbox, sender }
    }

    /// Parse and execute one tokenized command line.
    pub async fn dispatch(&mut self, args: &[String]) -> Result<Option<String>, CommandError> {
        match Command::parse(args)? {
            Some(command) => self.execute(command).await,
            None => Ok(None),
        }
    }

    /// Execute a parsed command.
    pub async fn execute(&mut self, command: Command) -> Result<Option<String>, CommandError> {
        debug!(command = command.name(), "Executing command");
        match command {
            Command::List(path) => self.list(path.as_deref().map(Path::new)).map(Some),
            Command::ChangeDirectory(path) => {
                self.sandbox.change_directory(Path::new(&path))?;
                Ok(None)
            }
            Command::Get(path) => {
                let report = self.sender.send_file(self.sandbox, Path::new(&path)).await?;
                info!(
                    file = %report.file_name,
                    chunks = report.chunks_sent,
                    bytes = report.bytes_sent,
                    checksum = %report.checksum,
                    "File sent"
                );
                Ok(None)
            }
        }
    }

    fn list(&self, path: Option<&Path>) -> Result<String, CommandError> {
        let entries = self
            .sandbox
            .list(path)?
            .iter()
            .map(|p| ListingEntry::from_path(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(SandboxError::from)?;
        Ok(render_listing(&entries))
    }
}
