use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use storybatch::cli::{Cli, Command};
use storybatch::config::{ConfigFile, ProcessingConfig};
use storybatch::simulate::{SimulatedAnalyzer, demo_jobs};
use storybatch::summary::BatchSummary;
use storybatch::ui::{BatchProgress, print_presets, print_summary};
use storybatch::{Job, load_jobs, logging, process_and_assess};

/// Exit code for a batch that ran but failed the quality gate.
const EXIT_FLAGGED: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    let jobs = match &cli.command {
        Command::Presets => {
            print_presets();
            return Ok(ExitCode::SUCCESS);
        }
        Command::Run { file } => {
            load_jobs(file).with_context(|| format!("failed to load jobs from {}", file.display()))?
        }
        Command::Demo { jobs } => demo_jobs(*jobs),
    };

    let config = resolve_config(&cli)?;
    run_batch(&jobs, config, cli.json).await
}

fn resolve_config(cli: &Cli) -> Result<ProcessingConfig> {
    let mut file = ConfigFile::load(&cli.config)
        .with_context(|| format!("failed to read {}", cli.config.display()))?;
    if cli.preset.is_some() {
        file.preset = cli.preset;
    }
    let mut config = file.resolve()?;

    // The command line wins over both the file and the environment.
    if let Some(n) = cli.max_concurrency {
        config.max_concurrency = n;
        config.validate()?;
    }
    Ok(config)
}

async fn run_batch(jobs: &[Job], config: ProcessingConfig, json: bool) -> Result<ExitCode> {
    info!(jobs = jobs.len(), "loaded jobs");

    let analyzer = SimulatedAnalyzer::default();
    let progress = BatchProgress::start(jobs.len());
    let run = process_and_assess(jobs, config, &analyzer, &progress).await;
    progress.finish();
    let run = run?;

    let summary = BatchSummary::from_run(&run);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if run.assessment.acceptable {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_FLAGGED))
    }
}
