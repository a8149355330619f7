//! Line I/O on the control channel.
//!
//! The control channel carries one UTF-8 text line per message. Every write
//! is flushed immediately so a response never lingers across commands.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Read one line, without its terminator.
///
/// Returns `None` at end of input.
pub async fn read_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let len = line.trim_end_matches(&['\r', '\n'][..]).len();
    line.truncate(len);
    Ok(Some(line))
}

/// Write `text` followed by a newline and flush.
pub async fn write_line<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = String::with_capacity(text.len() + 1);
    buf.push_str(text);
    buf.push('\n');
    writer.write_all(buf.as_bytes()).await?;
    writer.flush().await
}

/// Write pre-rendered text verbatim and flush.
///
/// Used for multi-line responses that already end in a newline.
pub async fn write_text<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_strips_terminators() {
        let mut input: &[u8] = b"ls\r\ncd docs\nlast";
        assert_eq!(read_line(&mut input).await.unwrap().as_deref(), Some("ls"));
        assert_eq!(
            read_line(&mut input).await.unwrap().as_deref(),
            Some("cd docs")
        );
        assert_eq!(read_line(&mut input).await.unwrap().as_deref(), Some("last"));
        assert_eq!(read_line(&mut input).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_line_keeps_empty_lines() {
        let mut input: &[u8] = b"\n\n";
        assert_eq!(read_line(&mut input).await.unwrap().as_deref(), Some(""));
        assert_eq!(read_line(&mut input).await.unwrap().as_deref(), Some(""));
        assert_eq!(read_line(&mut input).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_line_appends_newline() {
        let mut out = Vec::new();
        write_line(&mut out, "/docs").await.unwrap();
        write_text(&mut out, "a\nb\n").await.unwrap();
        assert_eq!(out, b"/docs\na\nb\n");
    }
}
