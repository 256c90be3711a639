//! Shared runner for the post-signature step gates
//! (`prepare`, `append`, `present-report`, `acknowledge`).

use clap::Args;
use gatehouse_core::{GateType, Gatekeeper, StepOptions};

use super::{gate_fail, open_project, parse_id, require_actor};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct StepArgs {
    /// Work item ID.
    pub id: String,

    /// Mark the step machine-inferred: bypasses the momentum interval and
    /// is recorded distinctly for downstream audits.
    #[arg(long)]
    pub machine_inferred: bool,

    /// Optional note stored in the event payload.
    #[arg(long)]
    pub note: Option<String>,
}

pub fn run_step(
    gate_type: GateType,
    args: &StepArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<()> {
    let actor = require_actor(output, actor_flag)?;
    let (paths, config) = open_project(output)?;
    let id = parse_id(output, &args.id)?;

    let keeper = Gatekeeper::new(paths, config);
    let opts = StepOptions {
        machine_inferred: args.machine_inferred,
        note: args.note.clone(),
        revision: None,
    };
    let event = keeper
        .record_step(&id, gate_type, &actor, &opts)
        .map_err(|e| gate_fail(output, &e))?;

    render(output, &event, |event, w| {
        if args.machine_inferred {
            writeln!(
                w,
                "Recorded {} for {} (machine-inferred)",
                event.gate_type, event.work_item_id
            )
        } else {
            writeln!(w, "Recorded {} for {}", event.gate_type, event.work_item_id)
        }
    })
}
