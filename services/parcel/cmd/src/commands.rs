//! Subcommand implementations: decode, encode and handshake.
//!
//! Input and output handling is kept separate from the byte-level work so the
//! latter can be tested without touching the filesystem.

use anyhow::{bail, Context, Result};
use bytes::{Bytes, BytesMut};
use parcel_wire::{
    Compression, Encoding, EncodedParcel, Handshake, HandshakeStatus, ParcelBuilder, ParcelType,
    StructDecoder, WireError, WireStruct, HANDSHAKE_SIZE,
};
use serde_json::{json, Value};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::{component_debug, component_warn};

/// Result of decoding one input buffer
#[derive(Debug, Default)]
pub struct DecodeReport {
    /// Handshake at the head of the input, if requested
    pub handshake: Option<Handshake>,
    /// Decoded parcels and chunks in stream order
    pub records: Vec<WireStruct>,
    /// Bytes left over that do not form a complete record
    pub trailing: usize,
}

/// Options for the encode subcommand
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub parcel_id: u32,
    pub parcel_type: ParcelType,
    pub compression: Compression,
    pub encoding: Encoding,
    pub fragment_size: usize,
}

/// Read the whole input from a file, or stdin when no path is given
pub async fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Write output to a file, or stdout when no path is given
pub async fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(bytes).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}

/// Turn raw input into wire bytes, hex-decoding when asked
pub fn unwrap_input(raw: &[u8], hex_input: bool) -> Result<Vec<u8>> {
    if !hex_input {
        return Ok(raw.to_vec());
    }
    let text: String = std::str::from_utf8(raw)
        .context("hex input is not valid UTF-8")?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(text).context("invalid hex input")
}

/// Render wire bytes for output
pub fn wrap_output(bytes: &[u8], hex_output: bool) -> Vec<u8> {
    if hex_output {
        let mut text = hex::encode(bytes).into_bytes();
        text.push(b'\n');
        text
    } else {
        bytes.to_vec()
    }
}

/// Decode a buffer of wire bytes
pub fn decode_bytes(
    wire: &[u8],
    with_handshake: bool,
    max_chunk_payload: usize,
) -> Result<DecodeReport> {
    let mut report = DecodeReport::default();
    let mut rest = wire;

    if with_handshake {
        if rest.len() < HANDSHAKE_SIZE {
            return Err(WireError::OutOfBounds {
                needed: HANDSHAKE_SIZE,
                available: rest.len(),
            })
            .context("incomplete handshake frame");
        }
        let handshake = Handshake::decode(rest)?;
        handshake.validate()?;
        component_debug!("decode", "handshake token={}", handshake.token);
        report.handshake = Some(handshake);
        rest = &rest[HANDSHAKE_SIZE..];
    }

    let mut buf = BytesMut::from(rest);
    let mut decoder = StructDecoder::with_max_chunk_payload(max_chunk_payload);
    report.records = decoder.decode_all(&mut buf)?;
    report.trailing = buf.len();

    if report.trailing > 0 {
        component_warn!(
            "decode",
            "{} trailing bytes do not form a complete record",
            report.trailing
        );
    }

    Ok(report)
}

/// JSON view of a decoded record, with chunk payloads as hex
pub fn describe(record: &WireStruct) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let WireStruct::Chunk(chunk) = record {
        value["payload"] = Value::String(hex::encode(&chunk.payload));
    }
    Ok(value)
}

/// JSON view of a handshake
pub fn describe_handshake(handshake: &Handshake) -> Value {
    json!({
        "struct": "handshake",
        "version": handshake.version,
        "status": handshake.status,
        "reserved": handshake.reserved,
        "token": handshake.token,
    })
}

/// Encode one message body into parcel and chunk bytes
pub fn encode_message(options: &EncodeOptions, body: Bytes) -> Result<EncodedParcel> {
    let encoded = ParcelBuilder::new(options.parcel_id, options.parcel_type)
        .compression(options.compression)
        .encoding(options.encoding)
        .fragment_size(options.fragment_size)?
        .payload(body)
        .build()?;

    debug!(
        parcel_id = options.parcel_id,
        chunks = encoded.chunks.len(),
        "encoded message"
    );
    Ok(encoded)
}

/// Build a handshake frame
pub fn encode_handshake(restore: bool, token: u32, reserved: u8) -> Result<Bytes> {
    if !restore && token != 0 {
        bail!("a token only makes sense with --restore");
    }
    let status = if restore {
        HandshakeStatus::Restore
    } else {
        HandshakeStatus::New
    };
    Ok(Handshake::new(status, reserved, token).encode())
}
