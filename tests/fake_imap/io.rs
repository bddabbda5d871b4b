//! Shared I/O helpers for the fake IMAP server.
//!
//! Every write is flushed immediately, which keeps the test server
//! simple and deterministic.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Write a protocol line (the caller supplies the CRLF) and flush.
pub async fn write_line<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    line: &str,
) -> std::io::Result<()> {
    stream.get_mut().write_all(line.as_bytes()).await?;
    stream.get_mut().flush().await
}

/// Write `prefix {len}`, the counted literal `data`, and the closing
/// parenthesis of a FETCH response, then flush.
pub async fn write_literal<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    prefix: &str,
    data: &[u8],
) -> std::io::Result<()> {
    let writer = stream.get_mut();
    writer
        .write_all(format!("{prefix} {{{}}}\r\n", data.len()).as_bytes())
        .await?;
    writer.write_all(data).await?;
    writer.write_all(b")\r\n").await?;
    writer.flush().await
}
