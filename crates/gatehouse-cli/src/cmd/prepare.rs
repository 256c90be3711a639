//! `gate prepare` — record the implementation-preparation gate.

use gatehouse_core::GateType;

use super::step::{StepArgs, run_step};
use crate::output::OutputMode;

pub fn run_prepare(
    args: &StepArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<()> {
    run_step(GateType::Prepare, args, actor_flag, output)
}
