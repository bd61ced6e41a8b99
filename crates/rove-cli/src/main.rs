//! Rove CLI - single-agent tool loop over a repository
//!
//! Usage:
//!   rove run <path> <prompt...>   Work on a task inside the repository at <path>
//!
//! Configuration comes from `<path>/.rove/config.toml` and the environment
//! (`LLM_ENDPOINT`, `LLM_API_KEY`, `LLM_MODEL`, `MAX_TURNS`, ...).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rove_core::RoveConfig;
use rove_orchestrator::{AgentLoop, TaskOutcome, TaskReport};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const USAGE: &str = "Usage: rove run <repository_path> <prompt words...>";

#[derive(Parser)]
#[command(name = "rove")]
#[command(author, version, about = "Single-agent LLM tool loop for a repository")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task against a repository
    Run {
        /// Repository to work in
        path: PathBuf,

        /// Task description (remaining words are joined with spaces)
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        prompt: Vec<String>,

        /// Override the configured turn budget
        #[arg(long, value_name = "N")]
        max_turns: Option<usize>,

        /// Print the full report as JSON when finished
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            eprintln!("{}", e.render());
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
        Err(e) => {
            // --help and --version
            let _ = e.print();
            return;
        }
    };

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Run {
            path,
            prompt,
            max_turns,
            json,
        } => cmd_run(path, prompt, max_turns, json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// INFO by default, DEBUG with `--verbose`; `RUST_LOG` wins when set
///
/// Logs go to stderr so stdout carries only the task output.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn cmd_run(
    path: PathBuf,
    prompt: Vec<String>,
    max_turns: Option<usize>,
    json: bool,
) -> Result<()> {
    let repo = match resolve_repository(&path) {
        Ok(repo) => repo,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };
    let request = prompt.join(" ");

    let mut config = RoveConfig::load(&repo).context("Failed to load configuration")?;
    if let Some(max_turns) = max_turns {
        config.agent.max_turns = max_turns;
    }

    info!("Repository: {}", repo.display());
    info!("Model: {}", config.llm.model);

    let agent = AgentLoop::from_config(&config).context("Failed to set up agent loop")?;
    let report = agent
        .run(&repo, &request)
        .await
        .context("Task aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

/// Canonicalize `path` and require an existing directory
fn resolve_repository(path: &Path) -> Result<PathBuf> {
    let repo = path
        .canonicalize()
        .with_context(|| format!("Repository path {} does not exist", path.display()))?;
    if !repo.is_dir() {
        bail!("{} is not a directory", repo.display());
    }
    Ok(repo)
}

fn print_summary(report: &TaskReport) {
    println!();
    println!("Run {}", report.run_id);
    println!("  Outcome:  {}", report.outcome);
    println!("  Turns:    {}", report.turns);
    println!(
        "  Duration: {:.1}s",
        report.duration().num_milliseconds() as f64 / 1000.0
    );

    match &report.outcome {
        TaskOutcome::Completed { summary } => {
            println!();
            println!("{}", summary);
        }
        TaskOutcome::IdleExit { reply: Some(reply) } => {
            println!();
            println!("{}", reply);
        }
        TaskOutcome::IdleExit { reply: None } => {}
        TaskOutcome::Exhausted => {
            println!();
            println!("Turn budget exhausted before the task was marked done.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_joins_prompt_words() {
        let cli = Cli::try_parse_from(["rove", "run", ".", "fix", "the", "build"]).unwrap();
        let Commands::Run { path, prompt, .. } = cli.command;
        assert_eq!(path, PathBuf::from("."));
        assert_eq!(prompt.join(" "), "fix the build");
    }

    #[test]
    fn test_run_requires_prompt() {
        assert!(Cli::try_parse_from(["rove", "run", "."]).is_err());
        assert!(Cli::try_parse_from(["rove"]).is_err());
    }

    #[test]
    fn test_max_turns_flag() {
        let cli =
            Cli::try_parse_from(["rove", "run", "--max-turns", "5", ".", "go"]).unwrap();
        let Commands::Run { max_turns, .. } = cli.command;
        assert_eq!(max_turns, Some(5));
    }

    #[test]
    fn test_resolve_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_repository(dir.path()).is_ok());

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(resolve_repository(&file).is_err());
        assert!(resolve_repository(&dir.path().join("missing")).is_err());
    }
}
