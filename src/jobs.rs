// Job loader: turns a CSV or JSON batch file into an ordered list of upload
// jobs. CSV is forgiving (incomplete rows are skipped with a warning); JSON is
// strict (a missing required field fails the whole file). A bad schedule time
// fails the load for both formats.

use crate::error::{Result, SchedulerError};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_PRIVACY_LEVEL: &str = "PUBLIC_TO_EVERYONE";

const SCHEDULE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// One video to upload and schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub video_path: PathBuf,
    pub caption: String,
    pub schedule_time: DateTime<Utc>,
    pub privacy_level: String,
}

/// JSON record. Fields are optional so that missing ones are reported as
/// input format errors naming the field.
#[derive(Deserialize, Debug)]
struct JsonRecord {
    video_path: Option<String>,
    caption: Option<String>,
    schedule_time: Option<String>,
    privacy_level: Option<String>,
}

/// Load jobs from `path`, picking the parser from the file extension.
/// Naive schedule times are interpreted in `offset`.
pub fn load_jobs(path: &Path, offset: &FixedOffset) -> Result<Vec<UploadJob>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let jobs = match ext.as_deref() {
        Some("csv") => load_csv(path, offset)?,
        Some("json") => load_json(path, offset)?,
        _ => {
            return Err(SchedulerError::input_format(
                "Input file must be CSV or JSON format",
            ))
        }
    };
    debug!(count = jobs.len(), path = %path.display(), "loaded upload jobs");
    Ok(jobs)
}

pub fn load_csv(path: &Path, offset: &FixedOffset) -> Result<Vec<UploadJob>> {
    let file = open_input(path, "CSV")?;
    parse_csv(file, offset)
}

pub fn load_json(path: &Path, offset: &FixedOffset) -> Result<Vec<UploadJob>> {
    let file = open_input(path, "JSON")?;
    let records: Vec<JsonRecord> = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| {
            SchedulerError::input_format(format!("Invalid JSON in {}: {}", path.display(), e))
        })?;
    jobs_from_json(records, offset)
}

fn open_input(path: &Path, kind: &str) -> Result<std::fs::File> {
    if !path.exists() {
        return Err(SchedulerError::input_format(format!(
            "{} file not found: {}",
            kind,
            path.display()
        )));
    }
    std::fs::File::open(path).map_err(|e| {
        SchedulerError::input_format(format!("Failed to open {}: {}", path.display(), e))
    })
}

/// Parse CSV with a header row. Column order is free; `privacy_level` may be
/// absent entirely.
pub fn parse_csv<R: std::io::Read>(reader: R, offset: &FixedOffset) -> Result<Vec<UploadJob>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| SchedulerError::input_format(format!("Invalid CSV header: {}", e)))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (path_col, caption_col, time_col, privacy_col) = (
        column("video_path"),
        column("caption"),
        column("schedule_time"),
        column("privacy_level"),
    );

    let mut jobs = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| {
            SchedulerError::input_format(format!("Invalid CSV row {}: {}", line + 2, e))
        })?;
        let field = |col: Option<usize>| {
            col.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let (video_path, caption, schedule) =
            match (field(path_col), field(caption_col), field(time_col)) {
                (Some(p), Some(c), Some(t)) => (p, c, t),
                _ => {
                    warn!(row = ?record.iter().collect::<Vec<_>>(), "Skipping incomplete row");
                    continue;
                }
            };

        jobs.push(UploadJob {
            video_path: PathBuf::from(video_path),
            caption: caption.to_string(),
            schedule_time: parse_schedule_time(schedule, offset)?,
            privacy_level: field(privacy_col)
                .unwrap_or(DEFAULT_PRIVACY_LEVEL)
                .to_string(),
        });
    }
    Ok(jobs)
}

/// Parse a JSON array of job objects.
pub fn parse_json(text: &str, offset: &FixedOffset) -> Result<Vec<UploadJob>> {
    let records: Vec<JsonRecord> = serde_json::from_str(text)
        .map_err(|e| SchedulerError::input_format(format!("Invalid JSON: {}", e)))?;
    jobs_from_json(records, offset)
}

fn jobs_from_json(records: Vec<JsonRecord>, offset: &FixedOffset) -> Result<Vec<UploadJob>> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, rec)| {
            let video_path = required(rec.video_path, "video_path", i)?;
            let caption = required(rec.caption, "caption", i)?;
            let schedule = rec.schedule_time.unwrap_or_default();
            Ok(UploadJob {
                video_path: PathBuf::from(video_path),
                caption,
                schedule_time: parse_schedule_time(schedule.trim(), offset)?,
                privacy_level: rec
                    .privacy_level
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_PRIVACY_LEVEL.to_string()),
            })
        })
        .collect()
}

fn required(value: Option<String>, name: &str, index: usize) -> Result<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            SchedulerError::input_format(format!(
                "Missing required field '{}' in entry {}",
                name, index
            ))
        })
}

/// Parse `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD HH:MM` in the given offset.
pub fn parse_schedule_time(value: &str, offset: &FixedOffset) -> Result<DateTime<Utc>> {
    let naive = SCHEDULE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| {
            SchedulerError::input_format(format!(
                "Invalid schedule_time format: {}. Use 'YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD HH:MM'",
                value
            ))
        })?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            SchedulerError::input_format(format!("Ambiguous schedule_time: {}", value))
        })
}
