//! Command handlers, one module per `gate` action.

pub mod acknowledge;
pub mod append;
pub mod commit;
pub mod completions;
pub mod init;
pub mod prepare;
pub mod present_report;
pub mod refine;
pub mod registry_check;
pub mod reset;
pub mod sign;
pub mod snapshot;
pub mod status;
pub mod step;
pub mod verify;

use anyhow::Context;
use gatehouse_core::config::{ProjectConfig, load_project_config};
use gatehouse_core::{GateError, GatehousePaths, WorkItemId};

use crate::output::{CliError, OutputMode, render_error};

/// Discover the project and load its config.
pub(crate) fn open_project(output: OutputMode) -> anyhow::Result<(GatehousePaths, ProjectConfig)> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let paths = match GatehousePaths::discover(&cwd) {
        Ok(paths) => paths,
        Err(err) => return Err(gate_fail(output, &err)),
    };
    let config = load_project_config(&paths)?;
    Ok((paths, config))
}

/// Render a structured gate error and produce the bail error for main.
pub(crate) fn gate_fail(output: OutputMode, err: &GateError) -> anyhow::Error {
    let _ = render_error(output, &CliError::from_gate_error(err));
    anyhow::anyhow!("{err}")
}

/// Parse and validate the positional work item id argument.
pub(crate) fn parse_id(output: OutputMode, raw: &str) -> anyhow::Result<WorkItemId> {
    WorkItemId::parse(raw).map_err(|err| gate_fail(output, &err))
}

/// Resolve the required actor identity or fail with a structured error.
pub(crate) fn require_actor(
    output: OutputMode,
    actor_flag: Option<&str>,
) -> anyhow::Result<String> {
    crate::actor::require_actor(actor_flag).map_err(|e| {
        let _ = render_error(
            output,
            &CliError::with_details(&e.message, "Set --actor, GATEHOUSE_ACTOR, or ACTOR", e.code),
        );
        anyhow::anyhow!("{}", e.message)
    })
}
