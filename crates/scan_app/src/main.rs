mod app;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scan_core::{
    CandidateFile, Controller, HttpPredictionClient, ImageDimensionReader, PredictionOutcome,
    ValidationOutcome,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "mri-scan", version = env!("MRI_SCAN_VERSION"), about = "Analyze an MRI scan with a remote classifier")]
struct Cli {
    /// Config file (defaults to the per-user config.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Prediction endpoint, overriding config and environment.
    #[arg(long, global = true)]
    endpoint: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate an image and run a diagnosis on it.
    Diagnose { image: PathBuf },
    /// Only check that an image meets the minimum resolution.
    Check { image: PathBuf },
    /// Ask the prediction service whether it is up.
    Ping,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("mri-scan stopped with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let default_path = app::settings::default_config_path();
    let config = app::settings::load_settings(
        cli.config.as_deref(),
        default_path.as_deref(),
        cli.endpoint.as_deref(),
    )?;
    let client = HttpPredictionClient::new(&config).context("cannot build prediction client")?;

    match cli.command {
        Command::Ping => {
            let message = client
                .health()
                .await
                .with_context(|| format!("service at {} is not reachable", client.endpoint()))?;
            println!("{}: {message}", client.endpoint());
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { image } => {
            let controller = Controller::new(Arc::new(ImageDimensionReader), Arc::new(client));
            let accepted = submit(&controller, image).await?;
            println!("{}", app::view::render(&controller.snapshot()).join("\n"));
            Ok(if accepted {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Diagnose { image } => {
            let controller = Controller::new(Arc::new(ImageDimensionReader), Arc::new(client));
            let watcher = app::follow_state(controller.subscribe());

            let mut code = ExitCode::FAILURE;
            if submit(&controller, image).await?
                && let Some(task) = controller.run_diagnosis()
            {
                let outcome = task.await.context("diagnosis task failed")?;
                if let Some(PredictionOutcome::Success { .. }) = outcome {
                    code = ExitCode::SUCCESS;
                }
            }

            drop(controller);
            let _ = watcher.await;
            Ok(code)
        }
    }
}

/// Submits the file at `path`; true when it was accepted.
async fn submit(controller: &Controller, path: PathBuf) -> Result<bool> {
    let candidate = CandidateFile::from_path(&path)?;
    let outcome = controller
        .submit_candidate(candidate)
        .await
        .context("validation task failed")?;
    Ok(matches!(outcome, Some(ValidationOutcome::Accepted { .. })))
}
