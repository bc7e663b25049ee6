//! Chunked DEFLATE wrapper: input is split into chunks of up to 65 536
//! bytes, each prefixed by a 5-byte big-endian chunk header (regardless of
//! the SLLZ container's own endianness). See spec §4.4.

use crate::error::{Error, Result};
use flate2::{write::DeflateEncoder, Compression};
use std::io::{self, Write};

const MAX_CHUNK: usize = 65_536;
const UNCOMPRESSED_FLAG: u32 = 0x0080_0000;
const MIN_INPUT_LEN: usize = 27;

fn deflate_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn deflate_decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut decoder = flate2::write::DeflateDecoder::new(Vec::with_capacity(expected_len));
    decoder.write_all(data)?;
    let out = decoder.finish()?;
    if out.len() == expected_len {
        Ok(out)
    } else {
        Err(Error::DecompressionSizeMismatch {
            expected: expected_len,
            actual: out.len(),
        })
    }
}

fn write_chunk_header(out: &mut Vec<u8>, chunk_total: u32, chunk_size_minus_one: u16) {
    out.push(((chunk_total >> 16) & 0xFF) as u8);
    out.push(((chunk_total >> 8) & 0xFF) as u8);
    out.push((chunk_total & 0xFF) as u8);
    out.push((chunk_size_minus_one >> 8) as u8);
    out.push((chunk_size_minus_one & 0xFF) as u8);
}

fn encode_chunk(chunk: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let compressed = deflate_compress(chunk)?;
    #[allow(clippy::cast_possible_truncation)]
    let chunk_size_minus_one = (chunk.len() - 1) as u16;

    if compressed.len() < chunk.len() {
        let chunk_total = (compressed.len() as u32 + 5) & 0x00FF_FFFF;
        write_chunk_header(out, chunk_total, chunk_size_minus_one);
        out.extend_from_slice(&compressed);
    } else {
        write_chunk_header(out, UNCOMPRESSED_FLAG, chunk_size_minus_one);
        out.extend_from_slice(chunk);
    }
    Ok(())
}

pub(crate) fn encode(input: &[u8]) -> Result<Vec<u8>> {
    if input.len() < MIN_INPUT_LEN {
        return Err(Error::TooSmallForSllzV2(input.len()));
    }

    let mut out = Vec::with_capacity(input.len());
    for chunk in input.chunks(MAX_CHUNK) {
        encode_chunk(chunk, &mut out)?;
    }
    Ok(out)
}

pub(crate) fn decode(input: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(decompressed_size);
    let mut pos = 0usize;
    let eof = || Error::Io(io::ErrorKind::UnexpectedEof.into());

    while out.len() < decompressed_size {
        let header = input.get(pos..pos + 5).ok_or_else(eof)?;
        pos += 5;
        let chunk_total = (u32::from(header[0]) << 16) | (u32::from(header[1]) << 8) | u32::from(header[2]);
        let chunk_size = (((u16::from(header[3])) << 8) | u16::from(header[4])) as usize + 1;

        if chunk_total & UNCOMPRESSED_FLAG != 0 {
            let raw = input.get(pos..pos + chunk_size).ok_or_else(eof)?;
            out.extend_from_slice(raw);
            pos += chunk_size;
        } else {
            let payload_len = (chunk_total & 0x00FF_FFFF) as usize - 5;
            let payload = input.get(pos..pos + payload_len).ok_or_else(eof)?;
            pos += payload_len;
            let decoded = deflate_decompress(payload, chunk_size)?;
            out.extend_from_slice(&decoded);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, MAX_CHUNK, MIN_INPUT_LEN};

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut state: u32 = 0x2545_F491;
        for _ in 0..len {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            out.push((state >> 16) as u8);
        }
        out
    }

    #[test]
    fn rejects_tiny_input() {
        let input = vec![0u8; MIN_INPUT_LEN - 1];
        assert!(encode(&input).is_err());
    }

    #[test]
    fn round_trips_compressible_input() {
        let input = vec![b'z'; 10_000];
        let encoded = encode(&input).unwrap();
        assert!(encoded.len() < input.len());
        let decoded = decode(&encoded, input.len()).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn round_trips_incompressible_input() {
        let input = pseudo_random(5000);
        let encoded = encode(&input).unwrap();
        let decoded = decode(&encoded, input.len()).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn wraps_around_at_chunk_boundary() {
        let input = pseudo_random(70_000);
        let encoded = encode(&input).unwrap();
        let decoded = decode(&encoded, input.len()).unwrap();
        assert_eq!(decoded, input);

        // first chunk header: incompressible random data is always stored raw
        let first_total = (u32::from(encoded[0]) << 16) | (u32::from(encoded[1]) << 8) | u32::from(encoded[2]);
        assert_eq!(first_total & 0x0080_0000, 0x0080_0000);
        let first_size = ((u16::from(encoded[3]) << 8) | u16::from(encoded[4])) as usize + 1;
        assert_eq!(first_size, MAX_CHUNK);
    }
}
