//
// codec/mod.rs
// dicom-decompress
//
// Transfer-syntax-to-decoder registry: picks a decoding strategy per UID, demultiplexes frames
// and hands back a native, interleaved, little-endian sample buffer.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::HashMap;
use std::sync::Arc;

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use ndarray::{s, Array3};
use tracing::debug;

use crate::element::{DataSet, PixelFragments};
use crate::error::{DecompressError, Result};
use crate::transfer_syntax::{self as ts, TransferSyntax};

pub mod frames;
#[cfg(feature = "jpeg2000")]
pub mod jpeg2k;
pub mod jpeg;
#[cfg(feature = "charls")]
pub mod jpegls;
pub mod native;
pub mod rle;

pub use frames::ExtendedOffsets;

/// Widest sample the decoders hand out (32-bit integers).
pub const MAX_BITS_ALLOCATED: u16 = 32;

/// Image attributes (group 0028) that govern the pixel data layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageShape {
    pub rows: u16,
    pub columns: u16,
    pub frames: u32,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub pixel_representation: u16,
    pub planar_configuration: u16,
    pub photometric_interpretation: Option<String>,
}

impl ImageShape {
    /// Read the image pixel module attributes from a data set.
    pub fn from_data_set(data_set: &DataSet) -> Result<ImageShape> {
        let required = |tag: Tag, name: &str| {
            data_set.u16_value(tag).ok_or_else(|| {
                DecompressError::malformed(tag, format!("{name} is missing or not a US value"))
            })
        };
        let rows = required(tags::ROWS, "Rows")?;
        let columns = required(tags::COLUMNS, "Columns")?;
        let bits_allocated = required(tags::BITS_ALLOCATED, "BitsAllocated")?;
        let samples_per_pixel = data_set.u16_value(tags::SAMPLES_PER_PIXEL).unwrap_or(1);
        let pixel_representation = data_set.u16_value(tags::PIXEL_REPRESENTATION).unwrap_or(0);
        let planar_configuration = data_set.u16_value(tags::PLANAR_CONFIGURATION).unwrap_or(0);
        let frames = match data_set.int_value(tags::NUMBER_OF_FRAMES) {
            Some(n) if n > 0 => u32::try_from(n).map_err(|_| {
                DecompressError::malformed(
                    tags::NUMBER_OF_FRAMES,
                    format!("NumberOfFrames {n} is out of range"),
                )
            })?,
            _ => 1,
        };

        if bits_allocated == 0
            || bits_allocated > MAX_BITS_ALLOCATED
            || (bits_allocated != 1 && bits_allocated % 8 != 0)
        {
            return Err(DecompressError::malformed(
                tags::BITS_ALLOCATED,
                format!("unsupported BitsAllocated {bits_allocated}"),
            ));
        }
        if samples_per_pixel == 0 {
            return Err(DecompressError::malformed(
                tags::SAMPLES_PER_PIXEL,
                "SamplesPerPixel must be at least 1",
            ));
        }

        let shape = ImageShape {
            rows,
            columns,
            frames,
            samples_per_pixel,
            bits_allocated,
            pixel_representation,
            planar_configuration,
            photometric_interpretation: data_set.str_value(tags::PHOTOMETRIC_INTERPRETATION),
        };
        if shape.checked_expected_len().is_none() {
            return Err(DecompressError::malformed(
                tags::PIXEL_DATA,
                format!(
                    "{}x{}x{} samples over {} frames at {} bits overflow the addressable size",
                    columns, rows, samples_per_pixel, frames, bits_allocated
                ),
            ));
        }
        Ok(shape)
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_allocated).div_ceil(8)
    }

    pub fn pixels_per_frame(&self) -> usize {
        usize::from(self.rows) * usize::from(self.columns)
    }

    /// Byte size of one decoded frame (bits allocated of at least 8), saturating.
    pub fn frame_len(&self) -> usize {
        self.checked_frame_len().unwrap_or(usize::MAX)
    }

    /// Byte size of the whole native pixel data before even-length padding, saturating.
    pub fn expected_len(&self) -> usize {
        self.checked_expected_len().unwrap_or(usize::MAX)
    }

    fn checked_frame_len(&self) -> Option<usize> {
        self.pixels_per_frame()
            .checked_mul(usize::from(self.samples_per_pixel))?
            .checked_mul(self.bytes_per_sample())
    }

    fn checked_expected_len(&self) -> Option<usize> {
        let samples = self
            .pixels_per_frame()
            .checked_mul(usize::try_from(self.frames).ok()?)?
            .checked_mul(usize::from(self.samples_per_pixel))?;
        Some(samples.checked_mul(usize::from(self.bits_allocated))?.div_ceil(8))
    }
}

/// The pixel data value as found in the parsed data set.
#[derive(Debug, Clone)]
pub enum PixelSource<'a> {
    Native(&'a [u8]),
    Encapsulated {
        fragments: &'a PixelFragments,
        extended_offsets: Option<ExtendedOffsets>,
    },
}

/// One frame as returned by a codec: interleaved, little endian.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub data: Vec<u8>,
    /// Set when the codec converted the colour space (e.g. YBR to RGB).
    pub photometric_interpretation: Option<String>,
}

/// Uncompressed pixel data plus the layout it is in.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub data: Vec<u8>,
    pub rows: u16,
    pub columns: u16,
    pub frames: u32,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub planar_configuration: u16,
    pub photometric_interpretation: Option<String>,
}

/// A decoder for one family of compressed transfer syntaxes.
pub trait DecoderStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Bytes every frame's first fragment starts with, used to find frame boundaries
    /// when the offset tables are empty.
    fn frame_marker(&self) -> Option<&'static [u8]> {
        None
    }

    /// Decode one compressed frame into interleaved little-endian samples.
    fn decode_frame(&self, data: &[u8], shape: &ImageShape, frame: u32) -> Result<DecodedFrame>;

    /// Decode all frames and concatenate them.
    fn decode(&self, source: &PixelSource<'_>, shape: &ImageShape) -> Result<DecodedImage> {
        let PixelSource::Encapsulated {
            fragments,
            extended_offsets,
        } = source
        else {
            return Err(DecompressError::malformed(
                tags::PIXEL_DATA,
                "native pixel data under a compressed transfer syntax",
            ));
        };

        let frames = frames::split_frames(
            fragments,
            extended_offsets.as_ref(),
            shape.frames,
            self.frame_marker(),
        )?;

        // sized by decoded output, never by the declared shape
        let mut data = Vec::new();
        let mut photometric = None;
        for (index, frame) in frames.iter().enumerate() {
            let decoded = self.decode_frame(frame, shape, index as u32)?;
            debug!(
                codec = self.name(),
                frame = index,
                bytes = decoded.data.len(),
                "decoded frame"
            );
            data.extend_from_slice(&decoded.data);
            if decoded.photometric_interpretation.is_some() {
                photometric = decoded.photometric_interpretation;
            }
        }

        Ok(DecodedImage {
            data,
            rows: shape.rows,
            columns: shape.columns,
            frames: frames.len() as u32,
            samples_per_pixel: shape.samples_per_pixel,
            bits_allocated: shape.bits_allocated,
            planar_configuration: 0,
            photometric_interpretation: photometric
                .or_else(|| shape.photometric_interpretation.clone()),
        })
    }
}

/// Mapping from transfer syntax UID to decoder strategy.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    strategies: HashMap<String, Arc<dyn DecoderStrategy>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        CodecRegistry::default()
    }

    /// Registry with every decoder this build supports.
    pub fn with_defaults() -> Self {
        let mut registry = CodecRegistry::new();

        let native: Arc<dyn DecoderStrategy> = Arc::new(native::NativeDecoder);
        for uid in [
            ts::IMPLICIT_VR_LITTLE_ENDIAN,
            ts::EXPLICIT_VR_LITTLE_ENDIAN,
            ts::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
            ts::EXPLICIT_VR_BIG_ENDIAN,
        ] {
            registry.register(uid, native.clone());
        }

        registry.register(ts::RLE_LOSSLESS, Arc::new(rle::RleDecoder));

        let lossy_jpeg: Arc<dyn DecoderStrategy> = Arc::new(jpeg::JpegDecoder::lossy());
        registry.register(ts::JPEG_BASELINE, lossy_jpeg.clone());
        registry.register(ts::JPEG_EXTENDED, lossy_jpeg);
        let lossless_jpeg: Arc<dyn DecoderStrategy> = Arc::new(jpeg::JpegDecoder::lossless());
        registry.register(ts::JPEG_LOSSLESS, lossless_jpeg.clone());
        registry.register(ts::JPEG_LOSSLESS_SV1, lossless_jpeg);

        #[cfg(feature = "charls")]
        {
            let jpegls: Arc<dyn DecoderStrategy> = Arc::new(jpegls::JpegLsDecoder);
            registry.register(ts::JPEG_LS_LOSSLESS, jpegls.clone());
            registry.register(ts::JPEG_LS_NEAR_LOSSLESS, jpegls);
        }

        #[cfg(feature = "jpeg2000")]
        {
            let j2k: Arc<dyn DecoderStrategy> = Arc::new(jpeg2k::Jpeg2000Decoder);
            for uid in [
                ts::JPEG_2000_LOSSLESS,
                ts::JPEG_2000,
                ts::HTJ2K_LOSSLESS,
                ts::HTJ2K_LOSSLESS_RPCL,
                ts::HTJ2K,
            ] {
                registry.register(uid, j2k.clone());
            }
        }

        registry
    }

    pub fn register(&mut self, uid: &str, strategy: Arc<dyn DecoderStrategy>) {
        self.strategies.insert(uid.to_string(), strategy);
    }

    pub fn get(&self, uid: &str) -> Option<&dyn DecoderStrategy> {
        self.strategies.get(uid).map(|s| s.as_ref())
    }

    pub fn supports(&self, uid: &str) -> bool {
        self.strategies.contains_key(uid)
    }

    /// UIDs with a registered decoder, sorted.
    pub fn uids(&self) -> Vec<&str> {
        let mut uids: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        uids.sort_unstable();
        uids
    }

    /// Decode the pixel data of a data set encoded in `transfer_syntax`.
    pub fn decode(
        &self,
        transfer_syntax: &TransferSyntax,
        source: &PixelSource<'_>,
        shape: &ImageShape,
    ) -> Result<DecodedImage> {
        let strategy = self.get(transfer_syntax.uid()).ok_or_else(|| {
            DecompressError::UnsupportedTransferSyntax(transfer_syntax.uid().to_string())
        })?;
        debug!(codec = strategy.name(), ts = %transfer_syntax, "dispatching pixel data");
        strategy.decode(source, shape)
    }
}

/// Reorder planar samples (all of sample 0, then sample 1, ...) into interleaved pixels.
///
/// `planar` holds `samples` planes of `pixels * bytes_per_sample` bytes each.
pub fn planar_to_interleaved(
    planar: Vec<u8>,
    samples: usize,
    pixels: usize,
    bytes_per_sample: usize,
) -> Result<Vec<u8>> {
    if samples <= 1 {
        return Ok(planar);
    }
    let planes = Array3::from_shape_vec((samples, pixels, bytes_per_sample), planar)
        .map_err(|e| DecompressError::Reencode(format!("planar buffer has the wrong size: {e}")))?;
    Ok(planes.permuted_axes([1, 0, 2]).iter().copied().collect())
}

/// Interleave most-significant-byte-first planes (`samples × bytes_per_sample` planes of `pixels`
/// bytes, as RLE stores them) into little-endian interleaved pixels.
pub fn byte_planes_to_interleaved(
    planes: Vec<u8>,
    samples: usize,
    pixels: usize,
    bytes_per_sample: usize,
) -> Result<Vec<u8>> {
    let planes = Array3::from_shape_vec((samples, bytes_per_sample, pixels), planes)
        .map_err(|e| DecompressError::Reencode(format!("byte planes have the wrong size: {e}")))?;
    // MSB-first to LSB-first, then (pixel, sample, byte)
    let little_endian = planes.slice(s![.., ..;-1, ..]);
    Ok(little_endian
        .permuted_axes([2, 0, 1])
        .iter()
        .copied()
        .collect())
}

/// Convert native-endian 16-bit samples (as handed out by codec libraries) to little endian.
pub fn native_u16_to_le(data: &mut [u8]) {
    if cfg!(target_endian = "big") {
        for word in data.chunks_exact_mut(2) {
            word.swap(0, 1);
        }
    }
}
