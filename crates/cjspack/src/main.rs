use std::{env, process::ExitCode};

use anyhow::{Context, Result};
use cjspack::{config::Config, orchestrator::BundleOrchestrator, writer::FsWriter};
use log::{error, info};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let project_dir = env::current_dir().context("Failed to determine the working directory")?;
    let config = Config::load(&project_dir).context("Failed to load configuration")?;

    let orchestrator = BundleOrchestrator::new(project_dir, config);
    let summary = orchestrator
        .bundle_to(&FsWriter)
        .with_context(|| format!("Failed to bundle {}", orchestrator.entry_path().display()))?;

    info!(
        "Bundled {} module(s) into {} ({} bytes)",
        summary.modules,
        summary.output.display(),
        summary.bytes
    );
    Ok(())
}
