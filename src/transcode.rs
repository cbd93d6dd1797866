//
// transcode.rs
// dicom-decompress
//
// Decode → re-encode pipeline turning any supported DICOM file into Explicit VR Little Endian
// with native pixel data.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use dicom_dictionary_std::tags;
use tracing::{debug, info, warn};

use crate::codec::{CodecRegistry, DecodedImage, ExtendedOffsets, ImageShape, PixelSource};
use crate::element::{DataSet, Value};
use crate::encoder;
use crate::error::{DecompressError, Stage, TranscodeError};
use crate::meta::{self, FileMeta};
use crate::models::TranscodeSummary;
use crate::output;
use crate::parser;
use crate::transfer_syntax::{TransferSyntax, EXPLICIT_VR_LITTLE_ENDIAN};

/// Output of a successful transcode.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub bytes: Vec<u8>,
    pub warnings: Vec<String>,
    pub summary: TranscodeSummary,
}

/// A parsed input file: meta, resolved transfer syntax and data set.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub meta: FileMeta,
    pub transfer_syntax: TransferSyntax,
    pub data_set: DataSet,
}

/// Parse a Part 10 file into the element model, inflating deflated data sets.
pub fn parse_file(bytes: &[u8], warnings: &mut Vec<String>) -> Result<ParsedFile, TranscodeError> {
    let parsed = meta::parse_meta(bytes).map_err(at(Stage::ParseMeta))?;
    warnings.extend(parsed.warnings);

    let uid = parsed.meta.transfer_syntax().ok_or_else(|| {
        TranscodeError::new(Stage::ParseMeta, DecompressError::MissingTransferSyntax)
    })?;
    let transfer_syntax = TransferSyntax::from_uid(&uid);
    debug!(ts = %transfer_syntax, "resolved transfer syntax");

    let body = &bytes[parsed.data_set_offset..];
    let data_set = if transfer_syntax.is_deflated() {
        let inflated = parser::inflate_data_set(body).map_err(at(Stage::ParseDataSet))?;
        parser::parse_data_set(&inflated, transfer_syntax.encoding(), warnings)
    } else {
        parser::parse_data_set_at(
            body,
            transfer_syntax.encoding(),
            parsed.data_set_offset,
            warnings,
        )
    };
    let data_set = data_set.map_err(at(Stage::ParseDataSet))?;

    Ok(ParsedFile {
        meta: parsed.meta,
        transfer_syntax,
        data_set,
    })
}

/// Drives one file through the pipeline stages with a given codec registry.
pub struct Transcoder {
    registry: CodecRegistry,
}

impl Default for Transcoder {
    fn default() -> Self {
        Transcoder::new(CodecRegistry::with_defaults())
    }
}

impl Transcoder {
    pub fn new(registry: CodecRegistry) -> Self {
        Transcoder { registry }
    }

    /// Transcode an in-memory Part 10 file.
    pub fn transcode(&self, bytes: &[u8]) -> Result<Transcoded, TranscodeError> {
        let mut warnings = Vec::new();
        let parsed = parse_file(bytes, &mut warnings)?;

        let located = locate_pixel_data(&parsed.data_set, &mut warnings)
            .map_err(at(Stage::LocatePixelData))?;

        let image = match &located {
            Some((source, shape)) => {
                let image = self
                    .registry
                    .decode(&parsed.transfer_syntax, source, shape)
                    .map_err(at(Stage::Decode))?;
                encoder::validate_decoded(&image, shape).map_err(at(Stage::Validate))?;
                Some(image)
            }
            None => None,
        };

        let reencoded = encoder::reencode(
            &parsed.meta,
            &parsed.data_set,
            image.as_ref(),
            &mut warnings,
        )
        .map_err(at(Stage::Reencode))?;

        let bytes = encoder::write_file(&reencoded.meta, &reencoded.data_set, &mut warnings)
            .map_err(at(Stage::WriteOutput))?;

        let summary = summarize(&parsed, image.as_ref(), bytes.len(), &warnings);
        Ok(Transcoded {
            bytes,
            warnings,
            summary,
        })
    }
}

/// Process-wide transcoder with every built-in decoder registered.
pub fn default_transcoder() -> &'static Transcoder {
    static TRANSCODER: OnceLock<Transcoder> = OnceLock::new();
    TRANSCODER.get_or_init(Transcoder::default)
}

/// Transcode an in-memory Part 10 file to Explicit VR Little Endian with native pixel data.
pub fn transcode_to_uncompressed(bytes: &[u8]) -> Result<Transcoded, TranscodeError> {
    default_transcoder().transcode(bytes)
}

/// Read `input`, transcode it and write the result to `output`.
pub fn transcode_file(input: &Path, output: &Path) -> Result<TranscodeSummary, TranscodeError> {
    let bytes = fs::read(input).map_err(|e| TranscodeError::new(Stage::ReadInput, e.into()))?;
    let transcoded = transcode_to_uncompressed(&bytes)?;
    for warning in &transcoded.warnings {
        warn!(input = %input.display(), "{warning}");
    }
    output::write_output(output, &transcoded.bytes)
        .map_err(|e| TranscodeError::new(Stage::WriteOutput, e.into()))?;
    info!(
        input = %input.display(),
        output = %output.display(),
        from = %transcoded.summary.source_transfer_syntax,
        bytes = transcoded.bytes.len(),
        "transcoded"
    );
    Ok(transcoded.summary)
}

fn at(stage: Stage) -> impl Fn(DecompressError) -> TranscodeError {
    move |source| TranscodeError::new(stage, source)
}

fn locate_pixel_data<'a>(
    data_set: &'a DataSet,
    warnings: &mut Vec<String>,
) -> Result<Option<(PixelSource<'a>, ImageShape)>, DecompressError> {
    let Some(element) = data_set.get(tags::PIXEL_DATA) else {
        warnings.push("no Pixel Data (7FE0,0010); re-encoding the data set only".to_string());
        return Ok(None);
    };
    let shape = ImageShape::from_data_set(data_set)?;
    let source = match &element.value {
        Value::Bytes(bytes) => PixelSource::Native(bytes),
        Value::Fragments(fragments) => PixelSource::Encapsulated {
            fragments,
            extended_offsets: ExtendedOffsets::from_data_set(data_set)?,
        },
        Value::Sequence(_) => {
            return Err(DecompressError::malformed(
                tags::PIXEL_DATA,
                "Pixel Data holds a sequence",
            ))
        }
    };
    Ok(Some((source, shape)))
}

fn summarize(
    parsed: &ParsedFile,
    image: Option<&DecodedImage>,
    output_bytes: usize,
    warnings: &[String],
) -> TranscodeSummary {
    TranscodeSummary {
        source_transfer_syntax: parsed.transfer_syntax.uid().to_string(),
        source_transfer_syntax_name: parsed.transfer_syntax.name().to_string(),
        target_transfer_syntax: EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
        has_pixel_data: image.is_some(),
        rows: image.map(|i| i.rows),
        columns: image.map(|i| i.columns),
        number_of_frames: image.map(|i| i.frames),
        samples_per_pixel: image.map(|i| i.samples_per_pixel),
        bits_allocated: image.map(|i| i.bits_allocated),
        pixel_data_bytes: image.map(|i| i.data.len()).unwrap_or(0),
        output_bytes,
        warnings: warnings.to_vec(),
    }
}
