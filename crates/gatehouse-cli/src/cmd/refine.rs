//! `gate refine` — record the refinement gate from a validated artifact.

use clap::Args;
use gatehouse_core::Gatekeeper;

use super::{gate_fail, open_project, parse_id, require_actor};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct RefineArgs {
    /// Work item ID.
    pub id: String,

    /// Project-relative path of the refinement artifact.
    #[arg(long)]
    pub artifact: String,
}

pub fn run_refine(
    args: &RefineArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<()> {
    let actor = require_actor(output, actor_flag)?;
    let (paths, config) = open_project(output)?;
    let id = parse_id(output, &args.id)?;

    let keeper = Gatekeeper::new(paths, config);
    let event = keeper
        .record_refinement(&id, &args.artifact, &actor)
        .map_err(|e| gate_fail(output, &e))?;

    render(output, &event, |event, w| {
        writeln!(
            w,
            "Recorded {} for {} (artifact {})",
            event.gate_type, event.work_item_id, args.artifact
        )
    })
}
