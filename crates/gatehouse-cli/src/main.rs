#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "gate: evidence-gated review sequencing for agent-authored changes",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Override actor identity (skips env resolution).
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags and environment.
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.json, user_output().as_deref())
    }

    /// Get the actor flag as an Option<&str> for resolution.
    fn actor_flag(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

/// User-config output preference; failures fall back to defaults silently.
fn user_output() -> Option<String> {
    gatehouse_core::config::load_user_config()
        .ok()
        .and_then(|cfg| cfg.output)
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Project",
        about = "Initialize a gatehouse project",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    gate init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Gates",
        about = "Record the refinement gate",
        long_about = "Validate a refinement artifact and append gate.refine.",
        after_help = "EXAMPLES:\n    # Record a refinement\n    gate refine WP-42 --artifact notes/WP-42.md"
    )]
    Refine(cmd::refine::RefineArgs),

    #[command(
        next_help_heading = "Gates",
        about = "Record the signature gate",
        long_about = "Consume a one-time token ({actor}{DDMMYYYYHHMM}) and append gate.sign.",
        after_help = "EXAMPLES:\n    # Sign a refined work item\n    gate sign WP-42 --token rik080820251015"
    )]
    Sign(cmd::sign::SignArgs),

    #[command(
        next_help_heading = "Gates",
        about = "Record the preparation gate",
        after_help = "EXAMPLES:\n    gate prepare WP-42\n    gate prepare WP-42 --machine-inferred"
    )]
    Prepare(cmd::step::StepArgs),

    #[command(
        next_help_heading = "Gates",
        about = "Record the implementation-appended gate",
        after_help = "EXAMPLES:\n    gate append WP-42 --note \"impl landed\""
    )]
    Append(cmd::step::StepArgs),

    #[command(
        name = "present-report",
        next_help_heading = "Gates",
        about = "Record the report-presentation gate",
        after_help = "EXAMPLES:\n    gate present-report WP-42"
    )]
    PresentReport(cmd::step::StepArgs),

    #[command(
        next_help_heading = "Gates",
        about = "Record the acknowledgment gate",
        after_help = "EXAMPLES:\n    gate acknowledge WP-42"
    )]
    Acknowledge(cmd::step::StepArgs),

    #[command(
        next_help_heading = "Gates",
        about = "Verify evidence and record the commit gate",
        long_about = "Run the manifest verifier and registry drift guard; append \
                      gate.commit only when both pass.",
        after_help = "EXAMPLES:\n    gate commit WP-42\n    gate commit WP-42 --range main..topic"
    )]
    Commit(cmd::commit::CommitArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show a work item's phase and gate history",
        after_help = "EXAMPLES:\n    gate status WP-42\n    gate status WP-42 --json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Gates",
        about = "Archive a work item's history and return it to new",
        after_help = "EXAMPLES:\n    gate reset WP-42 --confirm"
    )]
    Reset(cmd::reset::ResetArgs),

    #[command(
        next_help_heading = "Verification",
        about = "Verify a work item's edit manifest against the repository",
        after_help = "EXAMPLES:\n    gate verify WP-42\n    gate verify WP-42 --staged\n    gate verify WP-42 --range main..topic"
    )]
    Verify(cmd::verify::VerifyArgs),

    #[command(
        next_help_heading = "Verification",
        about = "Build the deterministic audit snapshot",
        after_help = "EXAMPLES:\n    gate snapshot\n    gate snapshot --timestamp\n    gate snapshot --stdout"
    )]
    Snapshot(cmd::snapshot::SnapshotArgs),

    #[command(
        name = "registry-check",
        next_help_heading = "Verification",
        about = "Check the capability registry for drift against a baseline",
        after_help = "EXAMPLES:\n    gate registry-check\n    gate registry-check --baseline-ref origin/main"
    )]
    RegistryCheck(cmd::registry_check::RegistryCheckArgs),

    #[command(
        next_help_heading = "Project",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    gate completions bash\n    gate completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GATEHOUSE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "gatehouse=debug,info"
        } else {
            "gatehouse=info,warn"
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => {
            let cwd = std::env::current_dir()?;
            cmd::init::run_init(args, output, &cwd)
        }
        Commands::Refine(ref args) => cmd::refine::run_refine(args, cli.actor_flag(), output),
        Commands::Sign(ref args) => cmd::sign::run_sign(args, cli.actor_flag(), output),
        Commands::Prepare(ref args) => cmd::prepare::run_prepare(args, cli.actor_flag(), output),
        Commands::Append(ref args) => cmd::append::run_append(args, cli.actor_flag(), output),
        Commands::PresentReport(ref args) => {
            cmd::present_report::run_present_report(args, cli.actor_flag(), output)
        }
        Commands::Acknowledge(ref args) => {
            cmd::acknowledge::run_acknowledge(args, cli.actor_flag(), output)
        }
        Commands::Commit(ref args) => cmd::commit::run_commit(args, cli.actor_flag(), output),
        Commands::Status(ref args) => cmd::status::run_status(args, output),
        Commands::Reset(ref args) => cmd::reset::run_reset(args, output),
        Commands::Verify(ref args) => cmd::verify::run_verify(args, output),
        Commands::Snapshot(ref args) => cmd::snapshot::run_snapshot(args, output),
        Commands::RegistryCheck(ref args) => {
            cmd::registry_check::run_registry_check(args, output)
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_sets_output_mode() {
        let cli = Cli::parse_from(["gate", "--json", "status", "WP-42"]);
        assert!(cli.json);
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["gate", "status", "WP-42", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn actor_flag_is_global() {
        let cli = Cli::parse_from(["gate", "sign", "WP-42", "--token", "t", "--actor", "rik"]);
        assert_eq!(cli.actor_flag(), Some("rik"));
    }

    #[test]
    fn all_gate_actions_parse() {
        for action in [
            "refine", "sign", "prepare", "append", "present-report", "acknowledge", "commit",
            "status", "reset",
        ] {
            let args: Vec<&str> = match action {
                "refine" => vec!["gate", action, "WP-1", "--artifact", "a.md"],
                "sign" => vec!["gate", action, "WP-1", "--token", "rik080820251015"],
                _ => vec!["gate", action, "WP-1"],
            };
            assert!(
                Cli::try_parse_from(&args).is_ok(),
                "action {action} should parse"
            );
        }
    }

    #[test]
    fn cli_help_does_not_panic() {
        Cli::command().debug_assert();
    }
}
