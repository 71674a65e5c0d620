//! CBOR envelope codec.
//!
//! Body layout (CBOR map, keys in this order when encoding):
//!
//! ```text
//! { "v": 1, "origin": text, "kind": "word"|"ack"|"ready"|"shutdown",
//!   "word": text (kind = word only), "ts": u64 }
//! ```
//!
//! Decoding accepts keys in any order and skips unknown keys.

use std::convert::Infallible;
use std::io::{Read, Write};

use minicbor::{Decoder, Encoder};
use thiserror::Error;

use crate::core::{Envelope, Payload, PayloadKind, PeerId, PeerIdError};

use super::frame::{FrameError, encode_frame, read_frame, write_frame};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ProtoEncodeError {
    #[error("cbor encode error: {0}")]
    Cbor(#[from] minicbor::encode::Error<Infallible>),
}

#[derive(Debug, Error)]
pub enum ProtoDecodeError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("invalid origin: {0}")]
    InvalidOrigin(#[from] PeerIdError),
    #[error("unknown payload kind {0:?}")]
    UnknownKind(String),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u32),
    #[error("indefinite-length map not allowed")]
    IndefiniteLength,
    #[error("trailing bytes after envelope")]
    TrailingBytes,
    #[error("cbor decode error: {0}")]
    Cbor(#[from] minicbor::decode::Error),
}

/// Errors from moving a whole envelope over a stream.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("encode error: {0}")]
    Encode(#[from] ProtoEncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] ProtoDecodeError),
}

pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, ProtoEncodeError> {
    let word = envelope.payload.as_word();
    let fields = if word.is_some() { 5 } else { 4 };

    let mut buf = Vec::new();
    let mut enc = Encoder::new(&mut buf);
    enc.map(fields)?;
    enc.str("v")?.u32(PROTOCOL_VERSION)?;
    enc.str("origin")?.str(envelope.origin.as_str())?;
    enc.str("kind")?.str(envelope.payload.kind().as_str())?;
    if let Some(word) = word {
        enc.str("word")?.str(word)?;
    }
    enc.str("ts")?.u64(envelope.timestamp)?;
    Ok(buf)
}

pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, ProtoDecodeError> {
    let mut dec = Decoder::new(bytes);
    let len = dec.map()?.ok_or(ProtoDecodeError::IndefiniteLength)?;

    let mut version = None;
    let mut origin = None;
    let mut kind = None;
    let mut word = None;
    let mut timestamp = None;

    for _ in 0..len {
        match dec.str()? {
            "v" => version = Some(dec.u32()?),
            "origin" => origin = Some(PeerId::parse(dec.str()?)?),
            "kind" => {
                let raw = dec.str()?;
                kind = Some(
                    PayloadKind::parse(raw)
                        .ok_or_else(|| ProtoDecodeError::UnknownKind(raw.to_string()))?,
                );
            }
            "word" => word = Some(dec.str()?.to_string()),
            "ts" => timestamp = Some(dec.u64()?),
            _ => dec.skip()?,
        }
    }

    if dec.position() != bytes.len() {
        return Err(ProtoDecodeError::TrailingBytes);
    }

    let version = version.ok_or(ProtoDecodeError::MissingField("v"))?;
    if version != PROTOCOL_VERSION {
        return Err(ProtoDecodeError::UnsupportedVersion(version));
    }
    let origin = origin.ok_or(ProtoDecodeError::MissingField("origin"))?;
    let kind = kind.ok_or(ProtoDecodeError::MissingField("kind"))?;
    let timestamp = timestamp.ok_or(ProtoDecodeError::MissingField("ts"))?;

    let payload = match (kind, word) {
        (PayloadKind::Word, Some(word)) => Payload::Word(word),
        (PayloadKind::Word, None) => return Err(ProtoDecodeError::MissingField("word")),
        (other, Some(_)) => {
            return Err(ProtoDecodeError::InvalidField {
                field: "word",
                reason: format!("not allowed for kind {}", other.as_str()),
            });
        }
        (PayloadKind::Ack, None) => Payload::Ack,
        (PayloadKind::Ready, None) => Payload::Ready,
        (PayloadKind::Shutdown, None) => Payload::Shutdown,
    };

    Ok(Envelope::new(origin, payload, timestamp))
}

/// Encode and frame an envelope, ready to write to a socket.
pub fn encode_wire(envelope: &Envelope, max_frame_bytes: usize) -> Result<Vec<u8>, WireError> {
    let body = encode_envelope(envelope)?;
    Ok(encode_frame(&body, max_frame_bytes)?)
}

pub fn write_envelope<W: Write>(
    writer: &mut W,
    envelope: &Envelope,
    max_frame_bytes: usize,
) -> Result<usize, WireError> {
    let body = encode_envelope(envelope)?;
    Ok(write_frame(writer, &body, max_frame_bytes)?)
}

/// Read exactly one envelope. `Ok(None)` if the stream closed before any byte.
pub fn read_envelope<R: Read>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<Envelope>, WireError> {
    match read_frame(reader, max_frame_bytes)? {
        Some(body) => Ok(Some(decode_envelope(&body)?)),
        None => Ok(None),
    }
}
