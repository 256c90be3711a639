//! `gate reset` — archive a work item's history and return it to `new`.

use clap::Args;
use gatehouse_core::Gatekeeper;

use super::{gate_fail, open_project, parse_id};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Work item ID.
    pub id: String,

    /// Required acknowledgment that history will be archived.
    #[arg(long)]
    pub confirm: bool,
}

pub fn run_reset(args: &ResetArgs, output: OutputMode) -> anyhow::Result<()> {
    let (paths, config) = open_project(output)?;
    let id = parse_id(output, &args.id)?;

    let keeper = Gatekeeper::new(paths, config);
    let report = keeper
        .reset(&id, args.confirm)
        .map_err(|e| gate_fail(output, &e))?;

    render(output, &report, |report, w| {
        writeln!(w, "Reset {} to new", report.work_item_id)?;
        if let Some(path) = &report.archived_ledger {
            writeln!(w, "  archived ledger: {path}")?;
        }
        if let Some(path) = &report.archived_refinement {
            writeln!(w, "  archived refinement: {path}")?;
        }
        Ok(())
    })
}
