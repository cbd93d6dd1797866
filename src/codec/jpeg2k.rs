//
// jpeg2k.rs
// dicom-decompress
//
// JPEG 2000 and HTJ2K decoding through OpenJPEG (jpeg2k crate).
//
// Thales Matheus Mendonça Santos - November 2025

use jpeg2k::Image;
use tracing::warn;

use super::{DecodedFrame, DecoderStrategy, ImageShape, MAX_BITS_ALLOCATED};
use crate::error::{DecompressError, Result};

/// J2K codestream SOC + SIZ markers.
pub const SOC: &[u8] = &[0xFF, 0x4F];

pub struct Jpeg2000Decoder;

impl DecoderStrategy for Jpeg2000Decoder {
    fn name(&self) -> &'static str {
        "jpeg2000"
    }

    fn frame_marker(&self) -> Option<&'static [u8]> {
        Some(SOC)
    }

    fn decode_frame(&self, data: &[u8], shape: &ImageShape, frame: u32) -> Result<DecodedFrame> {
        if shape.bits_allocated % 8 != 0 || shape.bits_allocated > MAX_BITS_ALLOCATED {
            return Err(DecompressError::codec(
                frame,
                format!("BitsAllocated {} is not decodable from JPEG 2000", shape.bits_allocated),
            ));
        }
        let image = Image::from_bytes(data).map_err(|e| DecompressError::codec(frame, e))?;
        let components = image.components();
        let samples = usize::from(shape.samples_per_pixel);
        if components.len() < samples {
            return Err(DecompressError::codec(
                frame,
                format!(
                    "codestream has {} component(s), SamplesPerPixel is {samples}",
                    components.len()
                ),
            ));
        }
        if components.len() > samples {
            warn!(
                frame,
                components = components.len(),
                samples,
                "ignoring extra JPEG 2000 components"
            );
        }

        let bytes_per_sample = shape.bytes_per_sample();
        let pixels = shape.pixels_per_frame();
        let signed = shape.pixel_representation == 1;
        let taken = &components[..samples];
        for (index, component) in taken.iter().enumerate() {
            let (width, height) = (component.width(), component.height());
            if width != u32::from(shape.columns)
                || height != u32::from(shape.rows)
                || component.data().len() != pixels
            {
                return Err(DecompressError::codec(
                    frame,
                    format!(
                        "component {index} is {width}x{height}, image attributes say {}x{}",
                        shape.columns, shape.rows
                    ),
                ));
            }
            let precision = component.precision();
            if precision == 0 || precision > u32::from(shape.bits_allocated) {
                return Err(DecompressError::codec(
                    frame,
                    format!(
                        "component {index} precision {precision} does not fit BitsAllocated {}",
                        shape.bits_allocated
                    ),
                ));
            }
            if component.is_signed() != signed {
                return Err(DecompressError::codec(
                    frame,
                    format!(
                        "component {index} signedness disagrees with PixelRepresentation {}",
                        shape.pixel_representation
                    ),
                ));
            }
        }

        // sized only after every component matched the declared shape
        let mut out = vec![0u8; pixels * samples * bytes_per_sample];
        for (index, component) in taken.iter().enumerate() {
            for (pixel, value) in component.data().iter().enumerate() {
                let at = (pixel * samples + index) * bytes_per_sample;
                out[at..at + bytes_per_sample]
                    .copy_from_slice(&value.to_le_bytes()[..bytes_per_sample]);
            }
        }

        // OpenJPEG reverses the multiple component transform
        let photometric_interpretation = match shape.photometric_interpretation.as_deref() {
            Some("YBR_ICT" | "YBR_RCT") => Some("RGB".to_string()),
            _ => None,
        };

        Ok(DecodedFrame {
            data: out,
            photometric_interpretation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 unsigned 8-bit codestream, one empty packet: every sample decodes to 128.
    const GRAY_2X2_8BIT: &[u8] = &[
        0xFF, 0x4F, // SOC
        0xFF, 0x51, 0x00, 0x29, 0x00, 0x00, // SIZ
        0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x07, 0x01, 0x01,
        0xFF, 0x52, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x04, 0x04, 0x00,
        0x01, // COD: LRCP, 1 layer, no decomposition, 5-3 reversible
        0xFF, 0x5C, 0x00, 0x04, 0x40, 0x40, // QCD
        0xFF, 0x90, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0F, 0x00, 0x01, // SOT
        0xFF, 0x93, 0x00, // SOD + empty packet
        0xFF, 0xD9, // EOC
    ];

    fn shape(bits: u16) -> ImageShape {
        ImageShape {
            rows: 2,
            columns: 2,
            frames: 1,
            samples_per_pixel: 1,
            bits_allocated: bits,
            pixel_representation: 0,
            planar_configuration: 0,
            photometric_interpretation: None,
        }
    }

    #[test]
    fn invalid_codestream_is_a_codec_error() {
        let err = Jpeg2000Decoder
            .decode_frame(&[0xFF, 0x4F, 0xFF, 0x51, 0, 0], &shape(8), 0)
            .unwrap_err();
        assert_eq!(err.kind(), "CodecDecode");
    }

    #[test]
    fn decodes_grayscale_codestream() {
        let decoded = Jpeg2000Decoder
            .decode_frame(GRAY_2X2_8BIT, &shape(8), 0)
            .unwrap();
        assert_eq!(decoded.data, vec![128; 4]);
        assert_eq!(decoded.photometric_interpretation, None);
    }

    #[test]
    fn narrow_precision_widens_into_larger_words() {
        let decoded = Jpeg2000Decoder
            .decode_frame(GRAY_2X2_8BIT, &shape(16), 0)
            .unwrap();
        assert_eq!(decoded.data, [128, 0].repeat(4));
    }

    #[test]
    fn precision_wider_than_bits_allocated_is_rejected() {
        let mut wide = GRAY_2X2_8BIT.to_vec();
        // Ssiz 0x0B: unsigned 12-bit
        wide[42] = 0x0B;
        let err = Jpeg2000Decoder.decode_frame(&wide, &shape(8), 0).unwrap_err();
        assert!(err.to_string().contains("precision 12"));
    }

    #[test]
    fn signedness_must_match_pixel_representation() {
        let signed = ImageShape {
            pixel_representation: 1,
            ..shape(8)
        };
        let err = Jpeg2000Decoder
            .decode_frame(GRAY_2X2_8BIT, &signed, 0)
            .unwrap_err();
        assert!(err.to_string().contains("signedness"));
    }

    #[test]
    fn component_dimensions_must_match_the_image() {
        let larger = ImageShape {
            rows: 4,
            ..shape(8)
        };
        let err = Jpeg2000Decoder
            .decode_frame(GRAY_2X2_8BIT, &larger, 0)
            .unwrap_err();
        assert!(err.to_string().contains("component 0 is 2x2"));
    }

    #[test]
    fn wide_samples_are_rejected_before_decoding_pixels() {
        let err = Jpeg2000Decoder
            .decode_frame(GRAY_2X2_8BIT, &shape(40), 3)
            .unwrap_err();
        assert!(matches!(err, DecompressError::CodecDecode { frame: 3, .. }));
    }
}
