//! `gate init` — scaffold the `.gatehouse` state directory.

use anyhow::{Context, Result};
use clap::Args;
use gatehouse_core::GatehousePaths;
use std::path::Path;

use crate::output::{OutputMode, render_success};

#[derive(Args, Debug)]
pub struct InitArgs {}

/// Default project config written at init.
const DEFAULT_CONFIG: &str = "\
[gates]
min_interval_secs = 10

[manifest]
allow_waivers = true

[registry]
baseline_ref = \"HEAD\"
";

/// Starter policy document; the snapshot pointer names it.
const DEFAULT_POLICY: &str = "\
# Gatehouse policy

Changes advance through refine, sign, prepare, append, present-report,
acknowledge, and commit. Evidence is verified mechanically before commit.
";

const DEFAULT_REGISTRY: &str = "schema_version = 1\n";

pub fn run_init(_args: &InitArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let paths = GatehousePaths::new(cwd);
    if paths.state_dir().exists() {
        render_success(output, "Already initialized")?;
        return Ok(());
    }

    for dir in [
        paths.state_dir(),
        paths.ledger_dir(),
        paths.refinements_dir(),
        paths.archive_dir(),
        paths.items_dir(),
    ] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let files = [
        (paths.config_file(), DEFAULT_CONFIG),
        (
            paths.tokens_log(),
            "# gatehouse consumed tokens v1\n# fields: token \\t wall_ts_us \\t work_item_id\n",
        ),
        (paths.registry(), DEFAULT_REGISTRY),
        (paths.state_dir().join("POLICY.md"), DEFAULT_POLICY),
        (paths.policy_pointer(), ".gatehouse/POLICY.md\n"),
    ];
    for (path, content) in files {
        if !path.exists() {
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    render_success(output, "Initialized gatehouse project in .gatehouse/")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&InitArgs {}, OutputMode::Human, dir.path()).expect("init");

        let paths = GatehousePaths::new(dir.path());
        assert!(paths.ledger_dir().is_dir());
        assert!(paths.tokens_log().is_file());
        assert!(paths.registry().is_file());
        assert!(paths.policy_pointer().is_file());
        assert!(paths.config_file().is_file());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        run_init(&InitArgs {}, OutputMode::Human, dir.path()).expect("first");
        run_init(&InitArgs {}, OutputMode::Human, dir.path()).expect("second");
    }
}
