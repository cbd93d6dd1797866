//
// jpegls.rs
// dicom-decompress
//
// JPEG-LS lossless and near-lossless decoding through CharLS.
//
// Thales Matheus Mendonça Santos - November 2025

use byteorder::{BigEndian, ByteOrder};
use charls::CharLS;

use super::{native_u16_to_le, planar_to_interleaved, DecodedFrame, DecoderStrategy, ImageShape};
use crate::error::{DecompressError, Result};

const SOI: &[u8] = &[0xFF, 0xD8];
const SOS: u8 = 0xDA;

pub struct JpegLsDecoder;

impl DecoderStrategy for JpegLsDecoder {
    fn name(&self) -> &'static str {
        "jpeg-ls"
    }

    fn frame_marker(&self) -> Option<&'static [u8]> {
        Some(SOI)
    }

    fn decode_frame(&self, data: &[u8], shape: &ImageShape, frame: u32) -> Result<DecodedFrame> {
        let mut pixels = CharLS::default()
            .decode(data)
            .map_err(|e| DecompressError::codec(frame, e))?;
        if pixels.len() != shape.frame_len() {
            return Err(DecompressError::codec(
                frame,
                format!(
                    "decoded {} bytes, image attributes need {}",
                    pixels.len(),
                    shape.frame_len()
                ),
            ));
        }
        if shape.bits_allocated == 16 {
            native_u16_to_le(&mut pixels);
        }

        let samples = usize::from(shape.samples_per_pixel);
        // interleave mode 0 keeps every component in its own plane
        if samples > 1 && interleave_mode(data) == Some(0) {
            pixels = planar_to_interleaved(
                pixels,
                samples,
                shape.pixels_per_frame(),
                shape.bytes_per_sample(),
            )?;
        }

        Ok(DecodedFrame {
            data: pixels,
            photometric_interpretation: None,
        })
    }
}

/// ILV byte of the first start-of-scan segment.
fn interleave_mode(data: &[u8]) -> Option<u8> {
    let mut pos = SOI.len();
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        let length = usize::from(BigEndian::read_u16(&data[pos + 2..pos + 4]));
        if marker == SOS {
            let components = usize::from(*data.get(pos + 4)?);
            // Ls, Ns, (Cs, Tm) per component, NEAR, ILV
            return data.get(pos + 5 + 2 * components + 1).copied();
        }
        pos += 2 + length;
    }
    None
}
