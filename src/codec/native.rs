//
// native.rs
// dicom-decompress
//
// Pass-through strategy for transfer syntaxes whose pixel data is already uncompressed.
//
// Thales Matheus Mendonça Santos - November 2025

use dicom_dictionary_std::tags;

use super::{DecodedFrame, DecodedImage, DecoderStrategy, ImageShape, PixelSource};
use crate::error::{DecompressError, Result};

pub struct NativeDecoder;

impl DecoderStrategy for NativeDecoder {
    fn name(&self) -> &'static str {
        "native"
    }

    fn decode_frame(&self, data: &[u8], _shape: &ImageShape, _frame: u32) -> Result<DecodedFrame> {
        Ok(DecodedFrame {
            data: data.to_vec(),
            photometric_interpretation: None,
        })
    }

    /// Samples are already little endian (the parser swaps big endian words), so the buffer is
    /// handed back as is, keeping its planar configuration.
    fn decode(&self, source: &PixelSource<'_>, shape: &ImageShape) -> Result<DecodedImage> {
        let PixelSource::Native(data) = source else {
            return Err(DecompressError::malformed(
                tags::PIXEL_DATA,
                "encapsulated pixel data under a native transfer syntax",
            ));
        };
        Ok(DecodedImage {
            data: data.to_vec(),
            rows: shape.rows,
            columns: shape.columns,
            frames: shape.frames,
            samples_per_pixel: shape.samples_per_pixel,
            bits_allocated: shape.bits_allocated,
            planar_configuration: shape.planar_configuration,
            photometric_interpretation: shape.photometric_interpretation.clone(),
        })
    }
}
