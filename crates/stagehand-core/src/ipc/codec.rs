//! JSONL framing over async streams.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ipc::errors::IpcError;

/// Lines longer than this are rejected rather than buffered without bound.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Read one message. `Ok(None)` means the peer closed the stream.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, IpcError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        // At most one byte past the limit is ever buffered.
        let n = (&mut *reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_LINE_BYTES {
            return Err(IpcError::ProtocolError {
                message: format!("message exceeds {} bytes", MAX_LINE_BYTES),
            });
        }
        if !line.iter().all(u8::is_ascii_whitespace) {
            break;
        }
    }
    serde_json::from_slice(line.trim_ascii_end())
        .map(Some)
        .map_err(|e| IpcError::ProtocolError {
            message: format!("invalid JSON message: {}", e),
        })
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(message).map_err(|e| IpcError::ProtocolError {
        message: e.to_string(),
    })?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
