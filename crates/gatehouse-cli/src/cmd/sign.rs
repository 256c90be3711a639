//! `gate sign` — record the signature gate, consuming a one-time token.

use clap::Args;
use gatehouse_core::Gatekeeper;

use super::{gate_fail, open_project, parse_id, require_actor};
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Work item ID.
    pub id: String,

    /// One-time signature token ({actor}{DDMMYYYYHHMM}).
    #[arg(long)]
    pub token: String,
}

pub fn run_sign(
    args: &SignArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<()> {
    let actor = require_actor(output, actor_flag)?;
    let (paths, config) = open_project(output)?;
    let id = parse_id(output, &args.id)?;

    let keeper = Gatekeeper::new(paths, config);
    let event = keeper
        .record_signature(&id, &args.token, &actor)
        .map_err(|e| gate_fail(output, &e))?;

    render(output, &event, |event, w| {
        writeln!(w, "Recorded {} for {}", event.gate_type, event.work_item_id)
    })
}
