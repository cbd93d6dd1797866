//
// lib.rs
// dicom-decompress
//
// Exposes the crate's modules and re-exports the transcoding entry points for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Leaf first: byte I/O, element model, parsing, codecs, serialization, then the drivers.
pub mod binary;
pub mod element;
pub mod error;
pub mod transfer_syntax;
pub mod dictionary;
pub mod meta;
pub mod parser;
pub mod codec;
pub mod encoder;
pub mod transcode;
pub mod batch;
pub mod output;
pub mod models;
pub mod metadata;
pub mod dump;
pub mod cli;

pub use batch::{run_batch, run_batch_with, BatchOptions, CancellationToken};
pub use cli::{run as run_cli, Cli, Commands};
pub use error::{DecompressError, Stage, TranscodeError};
pub use output::decompressed_name;
pub use transcode::{transcode_file, transcode_to_uncompressed, Transcoded, Transcoder};
