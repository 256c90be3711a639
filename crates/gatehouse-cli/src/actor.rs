//! Actor identity resolution for CLI commands.
//!
//! The resolution chain: `--actor` flag > `GATEHOUSE_ACTOR` env > `ACTOR`
//! env > `USER` env (TTY only). Mutating commands require an actor
//! identity; read-only commands work without one.

use std::env;

/// Errors from actor resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorResolutionError {
    /// Human-readable description.
    pub message: String,
    /// Machine error code.
    pub code: &'static str,
}

impl std::fmt::Display for ActorResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActorResolutionError {}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn stdin_is_tty() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}

/// Resolve the actor identity following the 4-step chain:
///
/// 1. `--actor` CLI flag (passed as `cli_flag`)
/// 2. `GATEHOUSE_ACTOR` environment variable
/// 3. `ACTOR` environment variable
/// 4. `USER` environment variable (only if running in a TTY)
///
/// Returns `None` if no identity could be resolved.
#[must_use]
pub fn resolve_actor(cli_flag: Option<&str>) -> Option<String> {
    if let Some(actor) = cli_flag {
        if !actor.is_empty() {
            return Some(actor.to_string());
        }
    }
    if let Some(val) = env_var("GATEHOUSE_ACTOR") {
        return Some(val);
    }
    if let Some(val) = env_var("ACTOR") {
        return Some(val);
    }
    if stdin_is_tty() {
        if let Some(val) = env_var("USER") {
            return Some(val);
        }
    }
    None
}

/// Resolve actor identity, returning an error if not found.
///
/// Use this for gate-recording commands that require an actor.
pub fn require_actor(cli_flag: Option<&str>) -> Result<String, ActorResolutionError> {
    resolve_actor(cli_flag).ok_or_else(|| ActorResolutionError {
        message: "Actor identity required for this command. \
                  Set --actor, GATEHOUSE_ACTOR, or ACTOR environment variable."
            .to_string(),
        code: "missing_actor",
    })
}
