// Batch runner: drives each job through initialize → chunk uploads → publish,
// one job at a time. A failing job is counted and skipped; only fatal errors
// stop the batch.

use crate::api::ApiClient;
use crate::chunk::ChunkPlan;
use crate::error::{Result, SchedulerError};
use crate::jobs::UploadJob;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{error, info, info_span};

pub const DEFAULT_JOB_DELAY: Duration = Duration::from_secs(5);

/// Where a job is in its lifecycle. Failures are reported with the stage
/// they happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Pending,
    Uploading,
    Publishing,
    Done,
    Failed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStage::Pending => "pending",
            JobStage::Uploading => "uploading",
            JobStage::Publishing => "publishing",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.successful + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "{}", rule)?;
        writeln!(f, "Bulk scheduling complete!")?;
        writeln!(f, "Successful: {}", self.successful)?;
        writeln!(f, "Failed: {}", self.failed)?;
        write!(f, "{}", rule)
    }
}

/// A job that did not finish. `failed_at` is the stage that raised `error`;
/// the job itself ends in [`JobStage::Failed`].
#[derive(Debug, thiserror::Error)]
#[error("{error} (while {failed_at})")]
pub struct JobFailure {
    pub failed_at: JobStage,
    #[source]
    pub error: SchedulerError,
}

pub struct BatchRunner<'a> {
    client: &'a ApiClient,
    delay: Duration,
    show_progress: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        BatchRunner {
            client,
            delay: DEFAULT_JOB_DELAY,
            show_progress: true,
        }
    }

    /// Pause inserted between consecutive jobs.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Disable the per-job chunk progress bar.
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Process every job in order and return the tally. Per-job errors are
    /// logged and counted; a fatal error aborts the batch.
    pub fn run(&self, jobs: &[UploadJob]) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let total = jobs.len();

        for (i, job) in jobs.iter().enumerate() {
            let _span = info_span!("job", index = i + 1, video = %job.video_path.display()).entered();
            println!("\n[{}/{}] Processing video...", i + 1, total);

            let mut stage = JobStage::Pending;
            match self.process_job(job, &mut stage) {
                Ok(()) => {
                    summary.successful += 1;
                    println!("✓ Successfully scheduled video");
                }
                Err(f) if f.error.is_fatal() => {
                    error!(stage = %f.failed_at, error = %f.error, "aborting batch");
                    return Err(f.error);
                }
                Err(f) => {
                    error!(stage = %f.failed_at, error = %f.error, "job failed");
                    println!("✗ Error: {}", f.error);
                    summary.failed += 1;
                }
            }

            if i + 1 < total && !self.delay.is_zero() {
                println!("Waiting {:?} before next upload...", self.delay);
                thread::sleep(self.delay);
            }
        }

        info!(successful = summary.successful, failed = summary.failed, "batch finished");
        Ok(summary)
    }

    /// Upload and publish a single job. `stage` ends as `Done` or `Failed`;
    /// on failure the error carries the stage the job had reached.
    pub fn process_job(
        &self,
        job: &UploadJob,
        stage: &mut JobStage,
    ) -> std::result::Result<(), JobFailure> {
        *stage = JobStage::Pending;
        let result = self.upload_and_publish(job, stage);
        let failed_at = *stage;
        match result {
            Ok(()) => {
                *stage = JobStage::Done;
                Ok(())
            }
            Err(error) => {
                *stage = JobStage::Failed;
                Err(JobFailure { failed_at, error })
            }
        }
    }

    fn upload_and_publish(&self, job: &UploadJob, stage: &mut JobStage) -> Result<()> {
        let name = job
            .video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.video_path.display().to_string());
        println!("Processing video: {}", name);
        println!(
            "Scheduled for: {}",
            job.schedule_time.format("%Y-%m-%d %H:%M:%S UTC")
        );

        *stage = JobStage::Uploading;
        println!("Initializing upload for: {}", job.video_path.display());
        let session = self.client.initialize_upload(&job.video_path)?;

        let chunk_size = self.client.chunk_size();
        let file_size = crate::api::video_size(&job.video_path)?;
        let total_chunks = ChunkPlan::new(file_size, chunk_size).total_chunks();
        println!("Uploading {} chunk(s)...", total_chunks);

        let bar = self.progress_bar(total_chunks);
        for index in 0..total_chunks {
            self.client
                .upload_chunk(&session.upload_url, &job.video_path, index, chunk_size)?;
            bar.inc(1);
        }
        bar.finish_and_clear();

        *stage = JobStage::Publishing;
        self.client.publish(
            &session.session_id,
            &job.caption,
            &job.privacy_level,
            Some(job.schedule_time),
        )?;
        Ok(())
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}/{len} chunks {msg}") {
            bar.set_style(style);
        }
        bar
    }
}
