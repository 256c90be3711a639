//! `gate registry-check` — the registry drift guard, standalone.

use anyhow::Context;
use clap::Args;
use gatehouse_verify::GitRepo;
use gatehouse_verify::registry::{RegistryDoc, check_registry, load_baseline};
use serde::Serialize;

use super::{gate_fail, open_project};
use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Args, Debug)]
pub struct RegistryCheckArgs {
    /// Reference revision providing the drift baseline
    /// (defaults to `[registry] baseline_ref` in config).
    #[arg(long)]
    pub baseline_ref: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegistryReport {
    baseline_ref: String,
    baseline_present: bool,
    passed: bool,
    findings: gatehouse_verify::Findings,
}

pub fn run_registry_check(args: &RegistryCheckArgs, output: OutputMode) -> anyhow::Result<()> {
    let (paths, config) = open_project(output)?;
    let baseline_ref = args
        .baseline_ref
        .clone()
        .unwrap_or(config.registry.baseline_ref);

    let registry_path = paths.registry();
    let current = if registry_path.exists() {
        let text = std::fs::read_to_string(&registry_path)
            .with_context(|| format!("Failed to read {}", registry_path.display()))?;
        match RegistryDoc::parse(&text) {
            Ok(doc) => doc,
            Err(err) => {
                let _ = render_error(
                    output,
                    &CliError::with_details(
                        format!("registry parse error: {err}"),
                        "Fix .gatehouse/registry.toml and retry",
                        "E4004",
                    ),
                );
                anyhow::bail!("registry parse error: {err}");
            }
        }
    } else {
        RegistryDoc::default()
    };

    let repo = GitRepo::open(paths.project_root()).map_err(|e| gate_fail(output, &e))?;
    let baseline = match load_baseline(&repo, &baseline_ref) {
        Ok(baseline) => baseline,
        Err(err) => {
            let _ = render_error(output, &CliError::new(format!("baseline registry: {err}")));
            anyhow::bail!("baseline registry: {err}");
        }
    };

    let findings = check_registry(baseline.as_ref(), &current);
    let report = RegistryReport {
        baseline_ref,
        baseline_present: baseline.is_some(),
        passed: findings.passed(),
        findings,
    };

    render(output, &report, |report, w| {
        for finding in &report.findings {
            writeln!(w, "{finding}")?;
        }
        let verdict = if report.passed { "PASS" } else { "FAIL" };
        let baseline_note = if report.baseline_present {
            ""
        } else {
            " (baseline absent; treated as empty)"
        };
        writeln!(
            w,
            "registry vs {}: {verdict}{baseline_note}",
            report.baseline_ref
        )
    })?;

    if report.passed {
        Ok(())
    } else {
        anyhow::bail!(
            "registry drift: {} error(s)",
            report.findings.errors().len()
        )
    }
}
