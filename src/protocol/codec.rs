//! Native messaging frame codec.
//!
//! A frame is a little-endian `u32` length followed by that many bytes of
//! UTF-8 JSON. End of stream before a length prefix is a clean close;
//! end of stream anywhere else is an error.

// ============================================================================
// Imports
// ============================================================================

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{Error, Result};

use super::message::Message;

// ============================================================================
// Constants
// ============================================================================

/// Largest frame accepted in either direction (64 MiB).
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Size of the length prefix.
const HEADER_LEN: usize = 4;

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a message as a complete frame.
///
/// # Errors
///
/// - [`Error::Json`] if serialization fails
/// - [`Error::MessageTooLarge`] if the body exceeds [`MAX_FRAME_LEN`]
pub fn encode_frame(message: &Message) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(Error::message_too_large(body.len(), MAX_FRAME_LEN));
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decodes a frame body.
///
/// # Errors
///
/// Returns [`Error::Json`] if the body is not a known message.
pub fn decode_frame(body: &[u8]) -> Result<Message> {
    Ok(serde_json::from_slice(body)?)
}

/// Writes one message as a frame and flushes.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    trace!(kind = message.type_name(), len = frame.len(), "Frame written");
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Reads the raw body of the next frame.
///
/// Returns `Ok(None)` on a clean end of stream.
///
/// # Errors
///
/// - [`Error::Protocol`] if the stream ends inside a length prefix
/// - [`Error::MessageTooLarge`] if the announced length exceeds [`MAX_FRAME_LEN`]
/// - [`Error::Io`] if the stream ends inside a body
pub async fn read_frame_body<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::protocol(format!(
                "stream ended after {filled} of {HEADER_LEN} length bytes"
            )));
        }
        filled += n;
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::message_too_large(len, MAX_FRAME_LEN));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    trace!(len, "Frame read");
    Ok(Some(body))
}

/// Reads and decodes the next message.
///
/// Returns `Ok(None)` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match read_frame_body(reader).await? {
        Some(body) => decode_frame(&body).map(Some),
        None => Ok(None),
    }
}

// ============================================================================
// Tests
// ============================================================================
