//
// models.rs
// dicom-decompress
//
// Defines serializable data structures for transcode summaries, per-file batch outcomes and batch reports.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Stage;

/// Summary shown by the `info` verb.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileInfo {
    pub transfer_syntax: String,
    pub transfer_syntax_name: String,
    pub encapsulated: bool,
    pub decoder_available: bool,
    pub media_storage_sop_class_uid: Option<String>,
    pub media_storage_sop_instance_uid: Option<String>,
    pub implementation_class_uid: Option<String>,
    pub implementation_version_name: Option<String>,
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub study_date: Option<String>,
    pub modality: Option<String>,
    pub has_pixel_data: bool,
    pub rows: Option<u16>,
    pub columns: Option<u16>,
    pub number_of_frames: Option<u32>,
    pub samples_per_pixel: Option<u16>,
    pub bits_allocated: Option<u16>,
    pub photometric_interpretation: Option<String>,
    pub fragments: Option<usize>,
    pub element_count: usize,
    pub warnings: Vec<String>,
}

/// What a single transcode did, for CLI lines and JSON reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscodeSummary {
    pub source_transfer_syntax: String,
    pub source_transfer_syntax_name: String,
    pub target_transfer_syntax: String,
    pub has_pixel_data: bool,
    pub rows: Option<u16>,
    pub columns: Option<u16>,
    pub number_of_frames: Option<u32>,
    pub samples_per_pixel: Option<u16>,
    pub bits_allocated: Option<u16>,
    /// Size of the native pixel data written, in bytes.
    pub pixel_data_bytes: usize,
    pub output_bytes: usize,
    pub warnings: Vec<String>,
}

/// Result of one batch input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Success {
        output: PathBuf,
        sha256: String,
        summary: TranscodeSummary,
    },
    Failed {
        stage: Stage,
        kind: String,
        error: String,
    },
    Cancelled,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileReport {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Aggregate of a batch run; `files` follows input order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub started_at: String,
    pub finished_at: String,
    pub output_dir: PathBuf,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn new(
        started_at: String,
        finished_at: String,
        output_dir: PathBuf,
        files: Vec<FileReport>,
    ) -> Self {
        let count = |f: fn(&FileOutcome) -> bool| files.iter().filter(|r| f(&r.outcome)).count();
        let succeeded = count(FileOutcome::is_success);
        let failed = count(|o| matches!(o, FileOutcome::Failed { .. }));
        let cancelled = count(|o| matches!(o, FileOutcome::Cancelled));
        BatchReport {
            started_at,
            finished_at,
            output_dir,
            total: files.len(),
            succeeded,
            failed,
            cancelled,
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_outcomes_and_serializes_with_status() {
        let files = vec![
            FileReport {
                input: PathBuf::from("a.dcm"),
                outcome: FileOutcome::Failed {
                    stage: Stage::ParseMeta,
                    kind: "NotADicomFile".to_string(),
                    error: "not a DICOM file".to_string(),
                },
            },
            FileReport {
                input: PathBuf::from("b.dcm"),
                outcome: FileOutcome::Cancelled,
            },
        ];
        let report = BatchReport::new("t0".into(), "t1".into(), PathBuf::from("out"), files);
        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.cancelled, 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files"][0]["status"], "failed");
        assert_eq!(json["files"][0]["stage"], "ParseMeta");
        assert_eq!(json["files"][1]["status"], "cancelled");
    }
}
