//! `gate status` — pure read of a work item's phase and history.

use clap::Args;
use gatehouse_core::{GateData, Gatekeeper};

use super::{gate_fail, open_project, parse_id};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Work item ID.
    pub id: String,
}

pub fn run_status(args: &StatusArgs, output: OutputMode) -> anyhow::Result<()> {
    let (paths, config) = open_project(output)?;
    let id = parse_id(output, &args.id)?;

    let keeper = Gatekeeper::new(paths, config);
    let report = keeper.status(&id).map_err(|e| gate_fail(output, &e))?;

    render(output, &report, |report, w| {
        writeln!(w, "{}: {}", report.work_item_id, report.phase)?;
        for event in &report.events {
            let tag = if event.data.machine_inferred() {
                " [machine-inferred]"
            } else {
                ""
            };
            let extra = match &event.data {
                GateData::Refine(d) => format!(" artifact={}", d.artifact_ref),
                GateData::Sign(d) => format!(" token={}", d.token),
                GateData::Commit(d) => d
                    .revision
                    .as_deref()
                    .map(|rev| format!(" revision={rev}"))
                    .unwrap_or_default(),
                _ => String::new(),
            };
            writeln!(
                w,
                "  {} {} by {}{}{}",
                event.wall_ts_us, event.gate_type, event.actor, extra, tag
            )?;
        }
        if !report.out_of_order.is_empty() {
            let gates: Vec<&str> = report.out_of_order.iter().map(|g| g.as_str()).collect();
            writeln!(w, "  warning: out-of-order timestamps: {}", gates.join(", "))?;
        }
        Ok(())
    })
}
