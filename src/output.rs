//
// output.rs
// dicom-decompress
//
// Output naming (`{stem}-decomp{ext}`), filename sanitizing and persisting transcoded files with a digest.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

const SUFFIX: &str = "-decomp";
const DEFAULT_EXTENSION: &str = "dcm";

/// File name of the decompressed counterpart of `input`: `{stem}-decomp{ext}`, `.dcm` when the
/// input has no extension.
pub fn decompressed_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| sanitize_filename(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "dicom".to_string());
    let extension = input
        .extension()
        .map(|e| sanitize_filename(&e.to_string_lossy()))
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("{stem}{SUFFIX}.{extension}")
}

/// Default output for a single-file transcode: next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_file_name(decompressed_name(input))
}

/// Keep only characters that are safe in file names on every platform.
pub fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '^'))
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// Write `bytes` to `path`, creating parent directories; returns the SHA-256 of the content.
pub fn write_output(path: &Path, bytes: &[u8]) -> io::Result<String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(sha256_hex(bytes))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn names_follow_the_decomp_rule() {
        assert_eq!(decompressed_name(Path::new("/data/ct.dcm")), "ct-decomp.dcm");
        assert_eq!(decompressed_name(Path::new("IM0001")), "IM0001-decomp.dcm");
        assert_eq!(decompressed_name(Path::new("scan.DICOM")), "scan-decomp.DICOM");
        assert_eq!(
            default_output_path(Path::new("in/mr.dcm")),
            PathBuf::from("in/mr-decomp.dcm")
        );
    }

    #[test]
    fn sanitize_strips_dangerous_characters() {
        assert_eq!(sanitize_filename("../weird name 123"), "weirdname123");
        assert_eq!(sanitize_filename("patient^file"), "patient^file");
    }

    #[test]
    fn write_output_creates_directories_and_hashes() {
        let root = tempdir().expect("tmpdir");
        let target = root.path().join("nested").join("a-decomp.dcm");
        let digest = write_output(&target, b"abc").expect("write");
        assert_eq!(fs::read(&target).expect("read back"), b"abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
