use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crucible_common::config::EngineConfig;
use crucible_common::types::{Challenge, Submission};
use crucible_engine::Engine;

#[derive(Parser)]
#[command(name = "crucible-cli")]
#[command(about = "Crucible CLI - Grade C submissions against challenge definitions", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile, run, and grade one submission, printing the verdict as JSON
    Run {
        /// Path to the learner's C source file
        #[arg(short, long)]
        source: PathBuf,

        /// Path to the challenge definition (JSON)
        #[arg(short = 'l', long)]
        challenge: PathBuf,

        /// Pretty-print the verdict JSON
        #[arg(long, default_value = "false")]
        pretty: bool,
    },

    /// Print the generated test harness for a function-body challenge
    /// without compiling or running it
    Harness {
        /// Path to the learner's C source file
        #[arg(short, long)]
        source: PathBuf,

        /// Path to the challenge definition (JSON)
        #[arg(short = 'l', long)]
        challenge: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).map_err(anyhow::Error::msg)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            source,
            challenge,
            pretty,
        } => run_submission(config, &source, &challenge, pretty).await,
        Commands::Harness { source, challenge } => print_harness(&source, &challenge),
    }
}

async fn run_submission(
    config: EngineConfig,
    source: &Path,
    challenge: &Path,
    pretty: bool,
) -> Result<()> {
    let (source, challenge) = load_inputs(source, challenge)?;
    let submission = Submission::new(source, challenge);

    info!(submission_id = %submission.id, "grading submission");

    let engine = Engine::new(config);
    let verdict = engine.submit(&submission).await;

    let json = if pretty {
        serde_json::to_string_pretty(&verdict)?
    } else {
        serde_json::to_string(&verdict)?
    };
    println!("{}", json);

    // Shell-scriptable: nonzero exit mirrors a failed verdict
    if !verdict.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_harness(source: &Path, challenge: &Path) -> Result<()> {
    let (source, challenge) = load_inputs(source, challenge)?;

    match &challenge {
        Challenge::FunctionBody {
            signature,
            test_cases,
            ..
        } => {
            let harness = crucible_engine::harness::generate(&source, signature, test_cases)
                .context("challenge definition rejected by harness generator")?;
            println!("{}", harness);
            Ok(())
        }
        Challenge::RawProgram { .. } => {
            anyhow::bail!("raw-program challenges have no harness; the source runs as-is")
        }
    }
}

fn load_inputs(source: &Path, challenge: &Path) -> Result<(String, Challenge)> {
    let source = std::fs::read_to_string(source)
        .with_context(|| format!("failed to read source file {}", source.display()))?;
    let challenge_text = std::fs::read_to_string(challenge)
        .with_context(|| format!("failed to read challenge file {}", challenge.display()))?;
    let challenge: Challenge = serde_json::from_str(&challenge_text)
        .with_context(|| format!("failed to parse challenge file {}", challenge.display()))?;
    Ok((source, challenge))
}
