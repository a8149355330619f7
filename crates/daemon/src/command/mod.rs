//! Command parsing and execution.
//!
//! A command line is tokenized by [`tokenizer::tokenize`], classified by
//! [`Command::parse`] and executed by [`CommandDispatcher`].
//!
//! | Command       | Arguments | Effect                                   |
//! |---------------|-----------|------------------------------------------|
//! | `ls [path]`   | 0 or 1    | table of the directory's entries         |
//! | `cd <path>`   | 1         | change directory, silent on success      |
//! | `get <path>`  | 1         | stream the file over the datagram channel |

pub mod dispatcher;
pub mod tokenizer;

use std::fmt;

use thiserror::Error;

use crate::files::SandboxError;
use crate::transfer::TransferError;

pub use dispatcher::CommandDispatcher;
pub use tokenizer::{tokenize, CommandScanner};

/// Which way an argument count was off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    TooMany,
    TooFew,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::TooMany => write!(f, "Too many arguments!"),
            Arity::TooFew => write!(f, "Too few arguments!"),
        }
    }
}

/// Errors reported back to the client as a single line.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Wrong number of arguments for the command.
    #[error("{0}")]
    ArgumentCount(Arity),

    /// Unrecognized command name.
    #[error("No such command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// A recognized command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `ls [path]`
    List(Option<String>),
    /// `cd <path>`
    ChangeDirectory(String),
    /// `get <path>`
    Get(String),
}

impl Command {
    /// Classify a tokenized command line.
    ///
    /// No command takes more than one argument, so an overlong line is
    /// rejected before the name is even looked at. An empty line is not a
    /// command and yields `None`.
    pub fn parse(args: &[String]) -> Result<Option<Self>, CommandError> {
        if args.len() > 2 {
            return Err(CommandError::ArgumentCount(Arity::TooMany));
        }
        let Some((name, rest)) = args.split_first() else {
            return Ok(None);
        };
        let argument = rest.first().cloned();

        let command = match name.as_str() {
            "ls" => Command::List(argument),
            "cd" => Command::ChangeDirectory(required(argument)?),
            "get" => Command::Get(required(argument)?),
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }

    /// Command name as typed.
    pub fn name(&self) -> &'static str {
        match self {
            Command::List(_) => "ls",
            Command::ChangeDirectory(_) => "cd",
            Command::Get(_) => "get",
        }
    }
}

fn required(argument: Option<String>) -> Result<String, CommandError> {
    argument.ok_or(CommandError::ArgumentCount(Arity::TooFew))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(Command::parse(&args(&["ls"])).unwrap(), Some(Command::List(None)));
        assert_eq!(
            Command::parse(&args(&["ls", "docs"])).unwrap(),
            Some(Command::List(Some("docs".to_string())))
        );
        assert_eq!(
            Command::parse(&args(&["cd", ".."])).unwrap(),
            Some(Command::ChangeDirectory("..".to_string()))
        );
        assert_eq!(
            Command::parse(&args(&["get", "a.txt"])).unwrap(),
            Some(Command::Get("a.txt".to_string()))
        );
    }

    #[test]
    fn test_parse_empty_is_none() {
        assert_eq!(Command::parse(&[]).unwrap(), None);
    }

    #[test]
    fn test_parse_too_few() {
        for name in ["cd", "get"] {
            let err = Command::parse(&args(&[name])).unwrap_err();
            assert!(matches!(err, CommandError::ArgumentCount(Arity::TooFew)));
            assert_eq!(err.to_string(), "Too few arguments!");
        }
    }

    #[test]
    fn test_parse_too_many_checked_before_name() {
        let err = Command::parse(&args(&["ls", "a", "b"])).unwrap_err();
        assert_eq!(err.to_string(), "Too many arguments!");

        let err = Command::parse(&args(&["frobnicate", "a", "b"])).unwrap_err();
        assert!(matches!(err, CommandError::ArgumentCount(Arity::TooMany)));
    }

    #[test]
    fn test_parse_unknown() {
        let err = Command::parse(&args(&["rm", "x"])).unwrap_err();
        assert_eq!(err.to_string(), "No such command: rm");
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert!(matches!(
            Command::parse(&args(&["LS"])),
            Err(CommandError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_sandbox_errors_pass_through() {
        let err = CommandError::from(SandboxError::NotAFile("docs".into()));
        assert_eq!(err.to_string(), "This is not a file!");
    }
}
