//
// jpeg.rs
// dicom-decompress
//
// JPEG baseline, extended and lossless (processes 1, 2/4 and 14) via jpeg-decoder.
//
// Thales Matheus Mendonça Santos - November 2025

use jpeg_decoder::{Decoder, PixelFormat};

use super::{native_u16_to_le, DecodedFrame, DecoderStrategy, ImageShape};
use crate::error::{DecompressError, Result};

/// JPEG start of image marker.
pub const SOI: &[u8] = &[0xFF, 0xD8];

pub struct JpegDecoder {
    /// Lossy processes come back colour converted from YCbCr to RGB.
    converts_color: bool,
}

impl JpegDecoder {
    pub fn lossy() -> Self {
        JpegDecoder {
            converts_color: true,
        }
    }

    pub fn lossless() -> Self {
        JpegDecoder {
            converts_color: false,
        }
    }
}

impl DecoderStrategy for JpegDecoder {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn frame_marker(&self) -> Option<&'static [u8]> {
        Some(SOI)
    }

    fn decode_frame(&self, data: &[u8], shape: &ImageShape, frame: u32) -> Result<DecodedFrame> {
        let mut decoder = Decoder::new(data);
        // header first, so a mismatched frame is rejected before any pixel buffer exists
        decoder
            .read_info()
            .map_err(|e| DecompressError::codec(frame, e))?;
        let info = decoder
            .info()
            .ok_or_else(|| DecompressError::codec(frame, "no frame header in codestream"))?;

        if info.width != shape.columns || info.height != shape.rows {
            return Err(DecompressError::codec(
                frame,
                format!(
                    "codestream is {}x{}, image attributes say {}x{}",
                    info.width, info.height, shape.columns, shape.rows
                ),
            ));
        }

        let components = match info.pixel_format {
            PixelFormat::L8 | PixelFormat::L16 => 1,
            PixelFormat::RGB24 => 3,
            PixelFormat::CMYK32 => 4,
        };
        if components != shape.samples_per_pixel {
            return Err(DecompressError::codec(
                frame,
                format!(
                    "codestream has {components} component(s), SamplesPerPixel is {}",
                    shape.samples_per_pixel
                ),
            ));
        }

        let mut pixels = decoder
            .decode()
            .map_err(|e| DecompressError::codec(frame, e))?;
        let data = match (info.pixel_format, shape.bits_allocated) {
            (PixelFormat::L16, 16) => {
                native_u16_to_le(&mut pixels);
                pixels
            }
            (PixelFormat::L8 | PixelFormat::RGB24 | PixelFormat::CMYK32, 8) => pixels,
            // 8-bit precision stored in 16-bit words
            (PixelFormat::L8, 16) => pixels.iter().flat_map(|&v| [v, 0]).collect(),
            (format, bits) => {
                return Err(DecompressError::codec(
                    frame,
                    format!("{format:?} output does not fit BitsAllocated {bits}"),
                ))
            }
        };

        let photometric_interpretation = match shape.photometric_interpretation.as_deref() {
            Some(pi)
                if self.converts_color
                    && info.pixel_format == PixelFormat::RGB24
                    && pi.starts_with("YBR") =>
            {
                Some("RGB".to_string())
            }
            _ => None,
        };

        Ok(DecodedFrame {
            data,
            photometric_interpretation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> ImageShape {
        ImageShape {
            rows: 8,
            columns: 8,
            frames: 1,
            samples_per_pixel: 1,
            bits_allocated: 8,
            pixel_representation: 0,
            planar_configuration: 0,
            photometric_interpretation: Some("MONOCHROME2".to_string()),
        }
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let err = JpegDecoder::lossy()
            .decode_frame(&[0xFF, 0xD8, 0x00, 0x01], &shape(), 3)
            .unwrap_err();
        assert!(matches!(err, DecompressError::CodecDecode { frame: 3, .. }));
    }

    /// 2x2 8-bit process 14 (predictor 1) image holding 128, 130 / 128, 126.
    const LOSSLESS_2X2: &[u8] = &[
        0xFF, 0xD8, // SOI
        0xFF, 0xC3, 0x00, 0x0B, 0x08, 0x00, 0x02, 0x00, 0x02, 0x01, 0x01, 0x11, 0x00, // SOF3
        0xFF, 0xC4, 0x00, 0x15, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, // DHT: "0" -> 0, "10" -> 2
        0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x01, 0x00, 0x00, // SOS
        0x52, 0x7F, // diffs 0, +2, 0, -2
        0xFF, 0xD9, // EOI
    ];

    fn small(bits: u16) -> ImageShape {
        ImageShape {
            rows: 2,
            columns: 2,
            bits_allocated: bits,
            ..shape()
        }
    }

    #[test]
    fn decodes_lossless_predictor_one() {
        let decoded = JpegDecoder::lossless()
            .decode_frame(LOSSLESS_2X2, &small(8), 0)
            .unwrap();
        assert_eq!(decoded.data, vec![128, 130, 128, 126]);
        assert_eq!(decoded.photometric_interpretation, None);
    }

    #[test]
    fn eight_bit_precision_widens_into_sixteen_bit_words() {
        let decoded = JpegDecoder::lossless()
            .decode_frame(LOSSLESS_2X2, &small(16), 0)
            .unwrap();
        assert_eq!(decoded.data, vec![128, 0, 130, 0, 128, 0, 126, 0]);
    }

    #[test]
    fn header_dimensions_are_checked_before_decoding() {
        let err = JpegDecoder::lossless()
            .decode_frame(LOSSLESS_2X2, &shape(), 1)
            .unwrap_err();
        assert!(matches!(err, DecompressError::CodecDecode { frame: 1, .. }));
        assert!(err.to_string().contains("2x2"));
    }

    #[test]
    fn splits_on_start_of_image() {
        assert_eq!(JpegDecoder::lossless().frame_marker(), Some(SOI));
    }
}
