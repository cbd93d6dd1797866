//
// rle.rs
// dicom-decompress
//
// RLE Lossless decoder: 64-byte segment header, PackBits segments, one segment per byte plane.
//
// Thales Matheus Mendonça Santos - November 2025

use byteorder::{ByteOrder, LittleEndian};

use super::{byte_planes_to_interleaved, DecodedFrame, DecoderStrategy, ImageShape};
use crate::error::{DecompressError, Result};

const HEADER_LEN: usize = 64;
const MAX_SEGMENTS: usize = 15;
/// A two-byte replicate run yields at most 128 bytes.
const MAX_EXPANSION: usize = 64;

pub struct RleDecoder;

impl DecoderStrategy for RleDecoder {
    fn name(&self) -> &'static str {
        "rle"
    }

    fn decode_frame(&self, data: &[u8], shape: &ImageShape, frame: u32) -> Result<DecodedFrame> {
        if shape.bits_allocated % 8 != 0 {
            return Err(DecompressError::codec(
                frame,
                format!("RLE needs whole bytes per sample, got {} bits", shape.bits_allocated),
            ));
        }
        let samples = usize::from(shape.samples_per_pixel);
        let bytes_per_sample = shape.bytes_per_sample();
        let pixels = shape.pixels_per_frame();

        let offsets = segment_offsets(data, frame)?;
        let expected = samples * bytes_per_sample;
        if offsets.len() != expected {
            return Err(DecompressError::codec(
                frame,
                format!("{} RLE segments, expected {expected}", offsets.len()),
            ));
        }

        let mut planes = Vec::new();
        for (index, &start) in offsets.iter().enumerate() {
            let end = offsets.get(index + 1).copied().unwrap_or(data.len());
            if start > end || end > data.len() {
                return Err(DecompressError::codec(
                    frame,
                    format!("RLE segment {index} spans {start}..{end} past {} bytes", data.len()),
                ));
            }
            let capacity = (end - start + 1).saturating_mul(MAX_EXPANSION);
            if pixels > capacity {
                return Err(DecompressError::codec(
                    frame,
                    format!(
                        "RLE segment {index} of {} bytes cannot hold {pixels} pixels",
                        end - start
                    ),
                ));
            }
            let plane = unpack_bits(&data[start..end], pixels)
                .map_err(|e| DecompressError::codec(frame, format!("segment {index}: {e}")))?;
            planes.extend_from_slice(&plane);
        }

        Ok(DecodedFrame {
            data: byte_planes_to_interleaved(planes, samples, pixels, bytes_per_sample)?,
            photometric_interpretation: None,
        })
    }
}

fn segment_offsets(data: &[u8], frame: u32) -> Result<Vec<usize>> {
    if data.len() < HEADER_LEN {
        return Err(DecompressError::codec(
            frame,
            format!("RLE header needs {HEADER_LEN} bytes, frame has {}", data.len()),
        ));
    }
    let count = LittleEndian::read_u32(&data[0..4]) as usize;
    if count == 0 || count > MAX_SEGMENTS {
        return Err(DecompressError::codec(
            frame,
            format!("invalid RLE segment count {count}"),
        ));
    }
    let offsets: Vec<usize> = (0..count)
        .map(|i| LittleEndian::read_u32(&data[4 + i * 4..8 + i * 4]) as usize)
        .collect();
    if offsets[0] != HEADER_LEN {
        return Err(DecompressError::codec(
            frame,
            format!("first RLE segment starts at {}, expected {HEADER_LEN}", offsets[0]),
        ));
    }
    Ok(offsets)
}

/// Decode one PackBits segment into exactly `expected` bytes.
///
/// Output past `expected` (encoder padding) is dropped; a short segment is an error.
pub fn unpack_bits(segment: &[u8], expected: usize) -> std::result::Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(expected);
    let mut pos = 0;
    while out.len() < expected && pos < segment.len() {
        let header = segment[pos] as i8;
        pos += 1;
        match header {
            0..=127 => {
                let count = header as usize + 1;
                let literal = segment.get(pos..pos + count).ok_or_else(|| {
                    format!("literal run of {count} bytes truncated at offset {pos}")
                })?;
                out.extend_from_slice(literal);
                pos += count;
            }
            -127..=-1 => {
                let byte = *segment
                    .get(pos)
                    .ok_or_else(|| format!("replicate run truncated at offset {pos}"))?;
                let count = (1 - isize::from(header)) as usize;
                out.resize(out.len() + count, byte);
                pos += 1;
            }
            // -128 is a no-op
            _ => {}
        }
    }
    if out.len() < expected {
        return Err(format!("decoded {} bytes, expected {expected}", out.len()));
    }
    out.truncate(expected);
    Ok(out)
}
