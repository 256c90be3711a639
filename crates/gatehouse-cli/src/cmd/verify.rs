//! `gate verify` — run the manifest verifier and registry drift guard
//! against a work item's declared manifest.

use anyhow::Context;
use clap::Args;
use gatehouse_core::config::ProjectConfig;
use gatehouse_core::{GateError, GatehousePaths, WorkItemId};
use gatehouse_verify::registry::{RegistryDoc, check_registry, load_baseline};
use gatehouse_verify::{Findings, GitRepo, VerifyOptions, parse_manifest, verify_manifest};
use serde::Serialize;

use super::{gate_fail, open_project, parse_id};
use crate::output::{CliError, OutputMode, render, render_error};

/// Comparison-range selectors shared by `verify` and `commit`.
#[derive(Args, Debug, Default)]
pub struct RangeArgs {
    /// Explicit comparison range (BASE..HEAD).
    #[arg(long, conflicts_with_all = ["rev", "staged", "worktree"])]
    pub range: Option<String>,

    /// Explicit single revision (compared against its parent).
    #[arg(long, conflicts_with_all = ["staged", "worktree"])]
    pub rev: Option<String>,

    /// Compare HEAD against the index.
    #[arg(long, conflicts_with = "worktree")]
    pub staged: bool,

    /// Compare HEAD against the working tree.
    #[arg(long)]
    pub worktree: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Work item ID.
    pub id: String,

    /// Override the work item document holding the manifest blocks.
    #[arg(long)]
    pub doc: Option<String>,

    #[command(flatten)]
    pub range: RangeArgs,
}

/// Combined verification outcome, serialized for `--json`.
#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub work_item_id: WorkItemId,
    pub range: String,
    pub passed: bool,
    pub findings: Findings,
}

pub fn run_verify(args: &VerifyArgs, output: OutputMode) -> anyhow::Result<()> {
    let (paths, config) = open_project(output)?;
    let id = parse_id(output, &args.id)?;

    let report = run_evidence_gates(&paths, &config, &id, args.doc.as_deref(), &args.range, output)?;
    render_report(&report, output)?;
    if report.passed {
        Ok(())
    } else {
        anyhow::bail!("verification failed with {} error(s)", report.findings.errors().len())
    }
}

/// The shared evidence pipeline: manifest verification plus the registry
/// drift guard. Used directly by `verify` and as the hard pre-commit gate.
pub(crate) fn run_evidence_gates(
    paths: &GatehousePaths,
    config: &ProjectConfig,
    id: &WorkItemId,
    doc_override: Option<&str>,
    range_args: &RangeArgs,
    output: OutputMode,
) -> anyhow::Result<VerifyReport> {
    // The manifest lives in the work item's descriptive document.
    let doc_path = doc_override.map_or_else(|| paths.item_doc(id), |p| paths.project_root().join(p));
    let text = std::fs::read_to_string(&doc_path).map_err(|source| {
        gate_fail(
            output,
            &GateError::ArtifactUnreadable {
                path: doc_path.display().to_string(),
                source,
            },
        )
    })?;
    let manifest = match parse_manifest(&text) {
        Ok(manifest) => manifest,
        Err(err) => {
            let _ = render_error(
                output,
                &CliError::with_details(
                    format!("manifest parse error: {err}"),
                    "Fix the manifest block fields and retry",
                    "E1101",
                ),
            );
            anyhow::bail!("manifest parse error: {err}");
        }
    };

    let repo = GitRepo::open(paths.project_root()).map_err(|e| gate_fail(output, &e))?;
    let range = repo
        .resolve_range(
            range_args.range.as_deref(),
            range_args.rev.as_deref(),
            range_args.staged,
            range_args.worktree,
        )
        .map_err(|e| gate_fail(output, &e))?;

    let mut findings = verify_manifest(
        &repo,
        &range,
        &manifest,
        VerifyOptions {
            allow_waivers: config.manifest.allow_waivers,
        },
    )
    .map_err(|e| gate_fail(output, &e))?;

    // Registry drift guard: independent gate over the published registry.
    let registry_path = paths.registry();
    let current = if registry_path.exists() {
        let text = std::fs::read_to_string(&registry_path)
            .with_context(|| format!("Failed to read {}", registry_path.display()))?;
        match RegistryDoc::parse(&text) {
            Ok(doc) => doc,
            Err(err) => {
                let _ = render_error(
                    output,
                    &CliError::with_details(
                        format!("registry parse error: {err}"),
                        "Fix .gatehouse/registry.toml and retry",
                        "E4004",
                    ),
                );
                anyhow::bail!("registry parse error: {err}");
            }
        }
    } else {
        RegistryDoc::default()
    };
    let baseline = match load_baseline(&repo, &config.registry.baseline_ref) {
        Ok(baseline) => baseline,
        Err(err) => {
            let _ = render_error(output, &CliError::new(format!("baseline registry: {err}")));
            anyhow::bail!("baseline registry: {err}");
        }
    };
    findings.extend(check_registry(baseline.as_ref(), &current));

    Ok(VerifyReport {
        work_item_id: id.clone(),
        range: range.to_string(),
        passed: findings.passed(),
        findings,
    })
}

pub(crate) fn render_report(report: &VerifyReport, output: OutputMode) -> anyhow::Result<()> {
    render(output, report, |report, w| {
        for finding in &report.findings {
            writeln!(w, "{finding}")?;
        }
        let verdict = if report.passed { "PASS" } else { "FAIL" };
        writeln!(
            w,
            "{}: {} ({} error(s), {} warning(s), range {})",
            report.work_item_id,
            verdict,
            report.findings.errors().len(),
            report.findings.warnings().len(),
            report.range,
        )
    })
}
