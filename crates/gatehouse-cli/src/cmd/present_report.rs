//! `gate present-report` — record the report-presentation gate.

use gatehouse_core::GateType;

use super::step::{StepArgs, run_step};
use crate::output::OutputMode;

pub fn run_present_report(
    args: &StepArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<()> {
    run_step(GateType::Report, args, actor_flag, output)
}
