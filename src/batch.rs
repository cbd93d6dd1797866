//
// batch.rs
// dicom-decompress
//
// Parallel batch driver: bounded rayon pool, cooperative cancellation, results in input order.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::HashSet;
use std::fs;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{DecompressError, Stage, TranscodeError};
use crate::models::{BatchReport, FileOutcome, FileReport};
use crate::output;
use crate::transcode::{default_transcoder, Transcoder};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker threads; 0 lets rayon pick.
    pub jobs: usize,
    pub output_dir: PathBuf,
}

/// Shared flag checked before each file starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Expand directories (recursively, sorted by name) and keep files as given.
pub fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(
                WalkDir::new(input)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path()),
            );
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// Output path per input; clashing names get a `-N` counter.
fn plan_outputs(inputs: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let name = output::decompressed_name(input);
            let mut candidate = name.clone();
            let mut counter = 1;
            while !taken.insert(candidate.clone()) {
                candidate = match name.rsplit_once('.') {
                    Some((stem, ext)) => format!("{stem}-{counter}.{ext}"),
                    None => format!("{name}-{counter}"),
                };
                counter += 1;
            }
            output_dir.join(candidate)
        })
        .collect()
}

/// Transcode every input into `options.output_dir`.
///
/// Per-file failures end up in the report; only an unusable output directory or thread pool
/// fails the whole batch.
pub fn run_batch(
    inputs: &[PathBuf],
    options: &BatchOptions,
    token: &CancellationToken,
) -> Result<BatchReport, DecompressError> {
    run_batch_with(default_transcoder(), inputs, options, token)
}

/// [`run_batch`] with a caller-supplied transcoder.
pub fn run_batch_with(
    transcoder: &Transcoder,
    inputs: &[PathBuf],
    options: &BatchOptions,
    token: &CancellationToken,
) -> Result<BatchReport, DecompressError> {
    let started_at = Local::now().to_rfc3339();
    fs::create_dir_all(&options.output_dir)?;

    let files = collect_inputs(inputs);
    let outputs = plan_outputs(&files, &options.output_dir);
    info!(
        files = files.len(),
        jobs = options.jobs,
        output_dir = %options.output_dir.display(),
        "starting batch"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let reports: Vec<FileReport> = pool.install(|| {
        files
            .par_iter()
            .zip(outputs.par_iter())
            .map(|(input, output)| FileReport {
                input: input.clone(),
                outcome: process_one(transcoder, input, output, token),
            })
            .collect()
    });

    let report = BatchReport::new(
        started_at,
        Local::now().to_rfc3339(),
        options.output_dir.clone(),
        reports,
    );
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        cancelled = report.cancelled,
        "batch finished"
    );
    Ok(report)
}

fn process_one(
    transcoder: &Transcoder,
    input: &Path,
    output: &Path,
    token: &CancellationToken,
) -> FileOutcome {
    if token.is_cancelled() {
        return FileOutcome::Cancelled;
    }
    // a panicking codec takes down its own file only
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        transcode_one(transcoder, input, output)
    }));
    match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            warn!(input = %input.display(), stage = %err.stage, "{}", err.source);
            FileOutcome::Failed {
                stage: err.stage,
                kind: err.kind().to_string(),
                error: err.source.to_string(),
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(input = %input.display(), "decoder panicked: {message}");
            FileOutcome::Failed {
                stage: Stage::Decode,
                kind: "Panic".to_string(),
                error: format!("decoder panicked: {message}"),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn transcode_one(
    transcoder: &Transcoder,
    input: &Path,
    output: &Path,
) -> Result<FileOutcome, TranscodeError> {
    let bytes = fs::read(input).map_err(|e| TranscodeError::new(Stage::ReadInput, e.into()))?;
    let transcoded = transcoder.transcode(&bytes)?;
    let sha256 = output::write_output(output, &transcoded.bytes)
        .map_err(|e| TranscodeError::new(Stage::WriteOutput, e.into()))?;
    for warning in &transcoded.warnings {
        warn!(input = %input.display(), "{warning}");
    }
    info!(input = %input.display(), output = %output.display(), "transcoded");
    Ok(FileOutcome::Success {
        output: output.to_path_buf(),
        sha256,
        summary: transcoded.summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn clashing_output_names_get_a_counter() {
        let inputs = vec![
            PathBuf::from("a/x.dcm"),
            PathBuf::from("b/x.dcm"),
            PathBuf::from("c/y"),
        ];
        let outputs = plan_outputs(&inputs, Path::new("out"));
        assert_eq!(outputs[0], PathBuf::from("out/x-decomp.dcm"));
        assert_eq!(outputs[1], PathBuf::from("out/x-decomp-1.dcm"));
        assert_eq!(outputs[2], PathBuf::from("out/y-decomp.dcm"));
    }

    #[test]
    fn directories_are_expanded_in_name_order() {
        let root = tempdir().expect("tmpdir");
        fs::create_dir_all(root.path().join("sub")).expect("mkdir");
        fs::write(root.path().join("b.dcm"), b"x").expect("write");
        fs::write(root.path().join("sub").join("a.dcm"), b"x").expect("write");
        fs::write(root.path().join("a.dcm"), b"x").expect("write");

        let files = collect_inputs(&[root.path().to_path_buf()]);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.dcm"),
                PathBuf::from("b.dcm"),
                PathBuf::from("sub").join("a.dcm")
            ]
        );
    }

    #[test]
    fn cancelled_batch_starts_nothing() {
        let root = tempdir().expect("tmpdir");
        let input = root.path().join("in.dcm");
        fs::write(&input, b"not dicom").expect("write");
        let token = CancellationToken::new();
        token.cancel();

        let options = BatchOptions {
            jobs: 1,
            output_dir: root.path().join("out"),
        };
        let report = run_batch(&[input], &options, &token).expect("batch");
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.files[0].outcome, FileOutcome::Cancelled);
    }

    #[test]
    fn failures_are_recorded_per_file() {
        let root = tempdir().expect("tmpdir");
        let input = root.path().join("bad.dcm");
        fs::write(&input, b"not dicom").expect("write");
        let missing = root.path().join("missing.dcm");

        let options = BatchOptions {
            jobs: 2,
            output_dir: root.path().join("out"),
        };
        let report = run_batch(&[input, missing], &options, &CancellationToken::new())
            .expect("batch");
        assert_eq!(report.failed, 2);
        match &report.files[0].outcome {
            FileOutcome::Failed { stage, kind, .. } => {
                assert_eq!(*stage, Stage::ParseMeta);
                assert_eq!(kind, "NotADicomFile");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        match &report.files[1].outcome {
            FileOutcome::Failed { stage, kind, .. } => {
                assert_eq!(*stage, Stage::ReadInput);
                assert_eq!(kind, "Io");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
