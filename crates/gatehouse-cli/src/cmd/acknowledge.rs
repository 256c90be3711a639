//! `gate acknowledge` — record the report-acknowledgment gate.

use gatehouse_core::GateType;

use super::step::{StepArgs, run_step};
use crate::output::OutputMode;

pub fn run_acknowledge(
    args: &StepArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<()> {
    run_step(GateType::Acknowledge, args, actor_flag, output)
}
