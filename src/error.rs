//
// error.rs
// dicom-decompress
//
// Typed error taxonomy for parsing, decoding and re-encoding DICOM files.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;

use dicom_core::Tag;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything that can go wrong while turning one compressed file into an uncompressed one.
#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("not a DICOM file: {0}")]
    NotADicomFile(String),

    #[error("file meta information has no Transfer Syntax UID (0002,0010)")]
    MissingTransferSyntax,

    #[error("malformed element {}: {message}", format_tag(.tag))]
    MalformedElement { tag: Option<Tag>, message: String },

    #[error("unsupported transfer syntax {0}")]
    UnsupportedTransferSyntax(String),

    #[error("codec failed to decode frame {frame}: {message}")]
    CodecDecode { frame: u32, message: String },

    #[error("cannot re-encode pixel data: {0}")]
    Reencode(String),

    #[error("truncated input at offset {offset}: needed {needed} byte(s), {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DecompressError {
    pub(crate) fn malformed(tag: impl Into<Option<Tag>>, message: impl Into<String>) -> Self {
        DecompressError::MalformedElement {
            tag: tag.into(),
            message: message.into(),
        }
    }

    pub(crate) fn codec(frame: u32, message: impl fmt::Display) -> Self {
        DecompressError::CodecDecode {
            frame,
            message: message.to_string(),
        }
    }

    /// Short machine-friendly name of the error kind, used in batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DecompressError::NotADicomFile(_) => "NotADicomFile",
            DecompressError::MissingTransferSyntax => "MissingTransferSyntax",
            DecompressError::MalformedElement { .. } => "MalformedElement",
            DecompressError::UnsupportedTransferSyntax(_) => "UnsupportedTransferSyntax",
            DecompressError::CodecDecode { .. } => "CodecDecode",
            DecompressError::Reencode(_) => "Reencode",
            DecompressError::TruncatedInput { .. } => "TruncatedInput",
            DecompressError::Io(_) => "Io",
        }
    }
}

fn format_tag(tag: &Option<Tag>) -> String {
    match tag {
        Some(tag) => format!("({:04X},{:04X})", tag.group(), tag.element()),
        None => "(unknown)".to_string(),
    }
}

pub type Result<T, E = DecompressError> = std::result::Result<T, E>;

/// Pipeline state in which a transcode failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    ReadInput,
    ParseMeta,
    ParseDataSet,
    LocatePixelData,
    Decode,
    Validate,
    Reencode,
    WriteOutput,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ReadInput => "read input",
            Stage::ParseMeta => "parse meta",
            Stage::ParseDataSet => "parse data set",
            Stage::LocatePixelData => "locate pixel data",
            Stage::Decode => "decode",
            Stage::Validate => "validate",
            Stage::Reencode => "re-encode",
            Stage::WriteOutput => "write output",
        };
        f.write_str(name)
    }
}

/// A [`DecompressError`] annotated with the pipeline stage it surfaced in.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct TranscodeError {
    pub stage: Stage,
    #[source]
    pub source: DecompressError,
}

impl TranscodeError {
    pub fn new(stage: Stage, source: DecompressError) -> Self {
        TranscodeError { stage, source }
    }

    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }
}
