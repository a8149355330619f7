//! Quote-aware command tokenizer with line continuation.
//!
//! Rules, scanning left to right:
//!
//! - an unquoted space separates arguments; empty arguments are dropped
//! - `'...'` and `"..."` group text; the other quote kind is literal inside
//! - inside quotes, `\\` is a backslash and `\'` / `\"` (matching the active
//!   quote) is a literal quote
//! - a backslash ending the line pulls in the next line, trimmed; if that
//!   line is blank or missing the backslash is kept literally
//! - any other backslash is literal
//!
//! The first line is trimmed before scanning, so a backslash followed only by
//! whitespace still continues. Unterminated quotes are not an error; the scan
//! just ends.

use std::io;

use tokio::io::AsyncBufRead;

use crate::control::read_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Incremental form of [`tokenize`].
///
/// The scan stops at a continuation backslash and waits for the caller to
/// supply the next line. Anything that must know where a multi-line command
/// ends (the server loop, the interactive client) drives one of these so
/// both sides agree on how many lines a command spans.
#[derive(Debug)]
pub struct CommandScanner {
    line: Vec<char>,
    pos: usize,
    args: Vec<String>,
    current: String,
    quote: Quote,
}

impl CommandScanner {
    /// Start scanning `first_line`, ignoring surrounding whitespace.
    pub fn new(first_line: &str) -> Self {
        Self {
            line: first_line.trim().chars().collect(),
            pos: 0,
            args: Vec::new(),
            current: String::new(),
            quote: Quote::None,
        }
    }

    /// Scan as far as the text allows.
    ///
    /// Returns `true` when the text ends in a continuation backslash and
    /// [`CommandScanner::continue_with`] must be called before scanning on.
    pub fn wants_line(&mut self) -> bool {
        while self.pos < self.line.len() {
            let at_end = self.pos == self.line.len() - 1;
            match self.line[self.pos] {
                '\\' if at_end => return true,
                '\\' => self.escape(),
                '\'' => match self.quote {
                    Quote::None => self.quote = Quote::Single,
                    Quote::Single => self.quote = Quote::None,
                    Quote::Double => self.current.push('\''),
                },
                '"' => match self.quote {
                    Quote::None => self.quote = Quote::Double,
                    Quote::Double => self.quote = Quote::None,
                    Quote::Single => self.current.push('"'),
                },
                ' ' if self.quote == Quote::None => self.flush(),
                c => self.current.push(c),
            }
            self.pos += 1;
        }
        false
    }

    /// Supply the line following a continuation backslash, or `None` at end
    /// of input. A blank or missing line keeps the backslash literally.
    pub fn continue_with(&mut self, next: Option<&str>) {
        match next.map(str::trim) {
            Some(next) if !next.is_empty() => self.line.extend(next.chars()),
            _ => self.current.push('\\'),
        }
        self.pos += 1;
    }

    /// The arguments scanned so far.
    pub fn finish(mut self) -> Vec<String> {
        self.flush();
        self.args
    }

    fn escape(&mut self) {
        match (self.quote, self.line[self.pos + 1]) {
            (Quote::Single | Quote::Double, '\\') => {
                self.current.push('\\');
                self.pos += 1;
            }
            (Quote::Single, '\'') => {
                self.current.push('\'');
                self.pos += 1;
            }
            (Quote::Double, '"') => {
                self.current.push('"');
                self.pos += 1;
            }
            _ => self.current.push('\\'),
        }
    }

    fn flush(&mut self) {
        let arg = std::mem::take(&mut self.current);
        if !arg.trim().is_empty() {
            self.args.push(arg);
        }
    }
}

/// Split one logical command line into arguments.
///
/// `source` is consulted only for continuation lines.
pub async fn tokenize<R>(first_line: &str, source: &mut R) -> io::Result<Vec<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut scanner = CommandScanner::new(first_line);
    while scanner.wants_line() {
        let next = read_line(source).await?;
        scanner.continue_with(next.as_deref());
    }
    Ok(scanner.finish())
}
