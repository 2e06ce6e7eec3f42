// Library root
// -----------
// The binary (`main.rs`) is a thin shell over these modules.
//
// Module responsibilities:
// - `config`: loads credentials and run settings from `config.json`.
// - `jobs`: parses the CSV/JSON batch file into upload jobs.
// - `chunk`: byte-range arithmetic for chunked uploads.
// - `api`: the three HTTP calls of the Content Posting API.
// - `runner`: sequences the calls per job and tallies the results.
// - `error`: the shared error type.
// - `logging`: tracing subscriber setup for the binary.
pub mod api;
pub mod chunk;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod runner;

pub use api::{ApiClient, UploadSession};
pub use config::Config;
pub use error::{Result, SchedulerError};
pub use jobs::{load_jobs, UploadJob};
pub use runner::{BatchRunner, BatchSummary, JobFailure, JobStage};
