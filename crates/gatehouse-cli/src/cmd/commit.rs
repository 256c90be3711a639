//! `gate commit` — the final gate.
//!
//! Runs the manifest verifier and registry drift guard as hard gates; only
//! when both pass is the commit event appended to the ledger.

use clap::Args;
use gatehouse_core::{GateType, Gatekeeper, StepOptions};
use gatehouse_verify::{CompareRange, GitRepo};

use super::verify::{RangeArgs, render_report, run_evidence_gates};
use super::{gate_fail, open_project, parse_id, require_actor};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Work item ID.
    pub id: String,

    /// Mark the step machine-inferred (bypasses the momentum interval;
    /// recorded distinctly). Evidence verification still runs.
    #[arg(long)]
    pub machine_inferred: bool,

    /// Override the work item document holding the manifest blocks.
    #[arg(long)]
    pub doc: Option<String>,

    #[command(flatten)]
    pub range: RangeArgs,
}

pub fn run_commit(
    args: &CommitArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<()> {
    let actor = require_actor(output, actor_flag)?;
    let (paths, config) = open_project(output)?;
    let id = parse_id(output, &args.id)?;

    // Hard gates first: nothing is appended on failure.
    let report = run_evidence_gates(&paths, &config, &id, args.doc.as_deref(), &args.range, output)?;
    if !report.passed {
        render_report(&report, output)?;
        anyhow::bail!(
            "commit refused: verification failed with {} error(s)",
            report.findings.errors().len()
        );
    }

    // Pin the revision the evidence was checked against, when one exists.
    let revision = GitRepo::open(paths.project_root())
        .ok()
        .and_then(|repo| match repo.resolve_range(None, None, false, false) {
            Ok(CompareRange::Commits { head, .. }) => Some(head),
            _ => repo.rev_parse("HEAD").ok(),
        });

    let keeper = Gatekeeper::new(paths, config);
    let opts = StepOptions {
        machine_inferred: args.machine_inferred,
        note: None,
        revision,
    };
    let event = keeper
        .record_step(&id, GateType::Commit, &actor, &opts)
        .map_err(|e| gate_fail(output, &e))?;

    render(output, &event, |event, w| {
        for finding in &report.findings {
            writeln!(w, "{finding}")?;
        }
        writeln!(w, "Recorded {} for {}", event.gate_type, event.work_item_id)
    })
}
