//! `gate snapshot` — build the deterministic audit snapshot.

use clap::Args;
use gatehouse_core::error::ErrorCode;
use gatehouse_snapshot::{SnapshotError, SnapshotOptions, build_snapshot};
use serde::Serialize;

use super::open_project;
use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Opt in to a `generated_at_us` wall-clock field.
    #[arg(long)]
    pub timestamp: bool,

    /// Print the document to stdout instead of writing the snapshot file.
    #[arg(long)]
    pub stdout: bool,
}

#[derive(Debug, Serialize)]
struct SnapshotReport {
    path: String,
    bytes: usize,
}

pub fn run_snapshot(args: &SnapshotArgs, output: OutputMode) -> anyhow::Result<()> {
    let (paths, _config) = open_project(output)?;

    let doc = match build_snapshot(
        &paths,
        SnapshotOptions {
            include_timestamp: args.timestamp,
        },
    ) {
        Ok(doc) => doc,
        Err(err) => {
            let code = snapshot_code(&err);
            let _ = render_error(
                output,
                &CliError::with_details(
                    err.to_string(),
                    code.hint().unwrap_or("See the snapshot input layout"),
                    code.code(),
                ),
            );
            anyhow::bail!("{err}");
        }
    };

    if args.stdout {
        print!("{doc}");
        return Ok(());
    }

    let dest = paths.snapshot_output();
    std::fs::write(&dest, &doc)?;
    let report = SnapshotReport {
        path: dest.display().to_string(),
        bytes: doc.len(),
    };
    render(output, &report, |report, w| {
        writeln!(w, "Snapshot written to {} ({} bytes)", report.path, report.bytes)
    })
}

fn snapshot_code(err: &SnapshotError) -> ErrorCode {
    match err {
        SnapshotError::WhitelistViolation { .. } => ErrorCode::WhitelistViolation,
        SnapshotError::InputMissing { .. } | SnapshotError::Io { .. } => ErrorCode::InputMissing,
        SnapshotError::UnparseablePointer { .. } => ErrorCode::UnparseablePointer,
        SnapshotError::MalformedSubDocument { .. } => ErrorCode::MalformedSubDocument,
        SnapshotError::Nondeterministic => ErrorCode::SnapshotNondeterministic,
    }
}
