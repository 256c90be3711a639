//! `gate append` — record the implementation-appended gate.

use gatehouse_core::GateType;

use super::step::{StepArgs, run_step};
use crate::output::OutputMode;

pub fn run_append(
    args: &StepArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<()> {
    run_step(GateType::Append, args, actor_flag, output)
}
