//! Envelope framing (length + crc32c).
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────┐
//! │ u32 LE len   │ u32 LE crc32c│ body (len bytes)     │
//! └──────────────┴──────────────┴──────────────────────┘
//! ```
//!
//! One frame per connection; the sender closes after writing it.

use std::io::{ErrorKind, Read, Write};

use crc32c::crc32c;
use thiserror::Error;

pub const FRAME_HEADER_LEN: usize = 8;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame length cannot be zero")]
    EmptyFrame,
    #[error("frame too large: max {max_frame_bytes} got {got_bytes}")]
    FrameTooLarge {
        max_frame_bytes: usize,
        got_bytes: usize,
    },
    #[error("frame crc mismatch: expected {expected:#010x} got {got:#010x}")]
    CrcMismatch { expected: u32, got: u32 },
}

pub fn encode_frame(body: &[u8], max_frame_bytes: usize) -> Result<Vec<u8>, FrameError> {
    if body.is_empty() {
        return Err(FrameError::EmptyFrame);
    }
    let length = match u32::try_from(body.len()) {
        Ok(length) if body.len() <= max_frame_bytes => length,
        _ => {
            return Err(FrameError::FrameTooLarge {
                max_frame_bytes,
                got_bytes: body.len(),
            });
        }
    };

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc32c(body).to_le_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

pub fn write_frame<W: Write>(
    writer: &mut W,
    body: &[u8],
    max_frame_bytes: usize,
) -> Result<usize, FrameError> {
    let frame = encode_frame(body, max_frame_bytes)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(frame.len())
}

/// Read one frame body. `Ok(None)` means the peer closed without sending anything.
pub fn read_frame<R: Read>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<Vec<u8>>, FrameError> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    let first = loop {
        match reader.read(&mut header[..1]) {
            Ok(n) => break n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    };
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[1..])?;

    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if length == 0 {
        return Err(FrameError::EmptyFrame);
    }
    if length > max_frame_bytes {
        return Err(FrameError::FrameTooLarge {
            max_frame_bytes,
            got_bytes: length,
        });
    }
    let expected = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;

    let got = crc32c(&body);
    if got != expected {
        return Err(FrameError::CrcMismatch { expected, got });
    }
    Ok(Some(body))
}
