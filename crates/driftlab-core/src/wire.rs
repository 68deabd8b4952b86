//! Length-delimited wire format for `Message`
//!
//! Frames are a 4-byte big-endian body length followed by a bincode-encoded
//! `Message`, carried over a persistent stream connection. A frame whose body
//! fails to decode leaves the stream aligned on the next header, so a single
//! malformed message never poisons the connection.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};
use crate::message::Message;

/// Upper bound on a frame body. A header that claims more than this is
/// treated as corrupt, and the connection cannot be realigned.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

// ----------------------------------------------------------------------------
// Frame Header
// ----------------------------------------------------------------------------

/// The fixed-size frame prefix: body length as a big-endian `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub len: u32,
}

impl FrameHeader {
    pub const SIZE: usize = 4;

    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        self.len.to_be_bytes()
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            len: u32::from_be_bytes(bytes),
        }
    }
}

// ----------------------------------------------------------------------------
// Wire Format Codec
// ----------------------------------------------------------------------------

/// Binary encoder/decoder for complete frames.
pub struct WireFormat;

impl WireFormat {
    /// Encode a message to a complete frame (header + body).
    pub fn encode(message: &Message) -> Result<Vec<u8>> {
        let body = bincode::serialize(message)?;
        if body.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge {
                len: body.len(),
                max: MAX_FRAME_LEN,
            });
        }

        let header = FrameHeader {
            len: body.len() as u32,
        };
        let mut frame = Vec::with_capacity(FrameHeader::SIZE + body.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decode a complete frame (header + body) back into a message.
    pub fn decode(frame: &[u8]) -> Result<Message> {
        if frame.len() < FrameHeader::SIZE {
            return Err(ProtocolError::Serialization(Box::new(
                bincode::ErrorKind::Custom("frame shorter than header".to_string()),
            )));
        }

        let mut header_bytes = [0u8; FrameHeader::SIZE];
        header_bytes.copy_from_slice(&frame[..FrameHeader::SIZE]);
        let header = FrameHeader::from_bytes(header_bytes);

        let body = &frame[FrameHeader::SIZE..];
        if body.len() != header.len as usize {
            return Err(ProtocolError::Serialization(Box::new(
                bincode::ErrorKind::Custom(format!(
                    "frame body is {} bytes, header declared {}",
                    body.len(),
                    header.len
                )),
            )));
        }

        Ok(bincode::deserialize(body)?)
    }
}

// ----------------------------------------------------------------------------
// Framed Stream IO
// ----------------------------------------------------------------------------

/// Read one framed message from the stream.
///
/// Returns `Ok(None)` on a clean close at a frame boundary. A body that fails
/// to decode yields `ProtocolError::Serialization` with the stream already
/// positioned at the next header.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let mut header_bytes = [0u8; FrameHeader::SIZE];
    match reader.read_exact(&mut header_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let header = FrameHeader::from_bytes(header_bytes);
    let len = header.len as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    Ok(Some(bincode::deserialize(&body)?))
}

/// Write one framed message to the stream.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = WireFormat::encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
