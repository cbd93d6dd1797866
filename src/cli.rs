//
// cli.rs
// dicom-decompress
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the corresponding modules.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use crate::batch::{self, BatchOptions, CancellationToken};
use crate::models::FileOutcome;
use crate::{dump, metadata, output, transcode};

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "dicom-decompress")]
#[command(about = "Convert compressed DICOM files to Explicit VR Little Endian", long_about = None)]
pub struct Cli {
    /// Log debug details (codec dispatch, per-frame decoding)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decompress one file (default output: `<name>-decomp<ext>` next to the input)
    Transcode {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decompress files and directories into an output directory
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,
        /// Write a JSON report of the batch
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show transfer syntax, file meta and image shape
    Info {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Dump the whole parsed data set
    Dump {
        file: PathBuf,
        #[arg(long, default_value_t = 4)]
        max_depth: usize,
        #[arg(long, default_value_t = 64)]
        max_value_len: usize,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Transcode { input, output } => {
            let output = output.unwrap_or_else(|| output::default_output_path(&input));
            if output == input {
                bail!("Refusing to overwrite the input file {}", input.display());
            }
            let summary = transcode::transcode_file(&input, &output)
                .with_context(|| format!("Failed to decompress {}", input.display()))?;
            println!(
                "Saved: {} ({} -> Explicit VR Little Endian)",
                output.display(),
                summary.source_transfer_syntax_name
            );
            for warning in &summary.warnings {
                println!("  warning: {warning}");
            }
        }
        Commands::Batch {
            inputs,
            output_dir,
            jobs,
            report,
        } => {
            let options = BatchOptions { jobs, output_dir };
            let result = batch::run_batch(&inputs, &options, &CancellationToken::new())
                .context("Failed to run batch")?;

            for file in &result.files {
                match &file.outcome {
                    FileOutcome::Success { output, .. } => {
                        println!("Saved: {}", output.display())
                    }
                    FileOutcome::Failed { stage, error, .. } => eprintln!(
                        "Failed to decompress {}: {} ({})",
                        file.input.display(),
                        error,
                        stage
                    ),
                    FileOutcome::Cancelled => {
                        println!("Skipped: {}", file.input.display())
                    }
                }
            }
            println!(
                "Processed {} file(s): {} decompressed, {} failed, {} skipped.",
                result.total, result.succeeded, result.failed, result.cancelled
            );

            if let Some(report) = report {
                let json = serde_json::to_string_pretty(&result)?;
                fs::write(&report, json)
                    .with_context(|| format!("Failed to write report {}", report.display()))?;
                println!("Report: {}", report.display());
            }
        }
        Commands::Info { file, json } => metadata::print_info(&file, json)?,
        Commands::Dump {
            file,
            max_depth,
            max_value_len,
        } => dump::dump_file(&file, max_depth, max_value_len)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_batch_arguments() {
        let cli = Cli::parse_from([
            "dicom-decompress",
            "-v",
            "batch",
            "a.dcm",
            "dir",
            "-o",
            "out",
            "-j",
            "4",
            "--report",
            "r.json",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Batch {
                inputs,
                output_dir,
                jobs,
                report,
            } => {
                assert_eq!(inputs, vec![PathBuf::from("a.dcm"), PathBuf::from("dir")]);
                assert_eq!(output_dir, PathBuf::from("out"));
                assert_eq!(jobs, 4);
                assert_eq!(report, Some(PathBuf::from("r.json")));
            }
            _ => panic!("expected batch"),
        }
    }
}
