// Entrypoint for the bulk scheduler.
// - Usage: `tiktok-bulk-scheduler [CONFIG_PATH]`.
// - Configuration and input errors are fatal and exit with status 1;
//   failures of individual videos only show up in the summary.

use anyhow::Context;
use std::path::PathBuf;
use tiktok_bulk_scheduler::{load_jobs, logging, ApiClient, BatchRunner, Config};
use tracing::info;

fn main() -> anyhow::Result<()> {
    logging::init().context("Failed to initialize logging")?;

    // An in-flight request cannot be interrupted cleanly, so just leave.
    ctrlc::set_handler(|| {
        println!("\n\nOperation cancelled by user");
        std::process::exit(0);
    })
    .context("Failed to install Ctrl-C handler")?;

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    let api = ApiClient::new(&config)?;
    info!(base_url = api.base_url(), "client ready");

    println!("Loading videos from: {}", config.input_file.display());
    let jobs = load_jobs(&config.input_file, &config.schedule_offset)?;
    println!("Found {} video(s) to schedule", jobs.len());

    let summary = BatchRunner::new(&api)
        .with_delay(config.job_delay)
        .run(&jobs)?;
    println!("\n{}", summary);
    Ok(())
}
