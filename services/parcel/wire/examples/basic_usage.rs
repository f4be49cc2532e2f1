//! Basic usage example for the parcel wire codecs.

use bytes::{Bytes, BytesMut};
use parcel_wire::{
    read_struct, Chunk, ChunkFlags, Encoding, Handshake, Parcel, ParcelBuilder, ParcelType,
    Reassembler, StructDecoder, WireStruct,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Parcel Wire Protocol Example ===\n");

    // 1. Handshake
    println!("1. Encoding a session-restore handshake...");
    let handshake = Handshake::restore(0xC0FFEE);
    let hs_bytes = handshake.encode();
    println!("   Handshake size: {} bytes", hs_bytes.len());
    let decoded = Handshake::decode(&hs_bytes)?;
    println!("   Decoded token: 0x{:08X}", decoded.token);

    // 2. Single parcel header
    println!("\n2. Encoding a CALL parcel header...");
    let mut parcel = Parcel::new(7, ParcelType::Call, 123);
    parcel.encoding = Encoding::Json;
    let parcel_bytes = parcel.encode()?;
    println!(
        "   Length field: {:?}",
        std::str::from_utf8(&parcel_bytes[8..])?
    );

    // 3. Dispatch by tag
    println!("\n3. Dispatching by struct tag...");
    let chunk = Chunk::new(7, 1, ChunkFlags::STOP, Bytes::from_static(b"hello"))?;
    let chunk_bytes = chunk.encode()?;
    for buf in [&parcel_bytes, &chunk_bytes] {
        match read_struct(buf, buf.len())? {
            WireStruct::Parcel(p) => println!("   parcel {} announces {} bytes", p.parcel_id, p.length),
            WireStruct::Chunk(c) => println!("   chunk {} carries {} bytes", c.chunk_id, c.length),
        }
    }

    // 4. Whole message over a stream
    println!("\n4. Encoding a 5KB message and decoding it from a stream...");
    let body = Bytes::from(vec![0x42u8; 5000]);
    let encoded = ParcelBuilder::new(100, ParcelType::Stream)
        .payload(body.clone())
        .build()?;
    println!("   Split into {} chunks", encoded.chunks.len());

    let mut stream = BytesMut::from(&encoded.concat()[..]);
    let mut decoder = StructDecoder::new();
    let mut reassembler = Reassembler::new();
    let mut reassembled = None;

    while let Some(record) = decoder.decode(&mut stream)? {
        match record {
            WireStruct::Parcel(p) => reassembler.expect(&p)?,
            WireStruct::Chunk(c) => reassembled = reassembler.add_chunk(c)?,
        }
    }

    if let Some(message) = reassembled {
        println!("   Reassembled message size: {} bytes", message.len());
        println!("   Body matches reassembled: {}", message == body);
    }

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
