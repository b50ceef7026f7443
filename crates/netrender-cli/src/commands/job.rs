//! Job management commands.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use netrender_core::error::NetError;
use netrender_core::types::JobId;
use netrender_model::{
    signature, CreateJob, FrameStatus, JobSubType, JobType, RenderFile, RenderFrame, RenderJob,
    Resolution,
};

use super::CommandContext;
use crate::output::{print_kv, print_list, print_success, OutputFormat};

#[derive(Debug, Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommands,
}

#[derive(Debug, Subcommand)]
pub enum JobCommands {
    /// Submit a render job to the master
    Submit {
        /// Root scene file (.blend)
        file: PathBuf,
        /// Frames to render, e.g. "1-250" or "1-5,8,20-24"
        #[arg(short, long)]
        frames: String,
        /// Job name; defaults to the file name
        #[arg(short, long)]
        name: Option<String>,
        /// Render engine
        #[arg(long, default_value = "CYCLES")]
        engine: String,
        /// Additional input files the scene depends on
        #[arg(long = "with", value_name = "FILE")]
        extra_files: Vec<PathBuf>,
        /// Submit as a baking job instead of a render job
        #[arg(long)]
        baking: bool,
    },
    /// List jobs known to the master
    List,
    /// Show one job's frame status breakdown
    Status {
        /// Job id
        id: String,
    },
    /// Cancel one job
    Cancel {
        /// Job id
        id: String,
        /// Also clear the job's files from slaves
        #[arg(long)]
        clear: bool,
    },
    /// Cancel every job on the master
    CancelAll {
        /// Also clear job files from slaves
        #[arg(long)]
        clear: bool,
    },
}

pub async fn execute(args: &JobArgs, config_path: &str, format: OutputFormat) -> Result<(), NetError> {
    let mut ctx = CommandContext::open(config_path)?;

    match &args.command {
        JobCommands::Submit {
            file,
            frames,
            name,
            engine,
            extra_files,
            baking,
        } => {
            let job = build_job(file, extra_files, frames, name.as_deref(), engine)?;
            let job_name = job.name.clone();
            let id = if *baking {
                netrender_client::operators::send_job_baking(&ctx.client, &mut ctx.session, job)
                    .await?
            } else {
                netrender_client::operators::send_job(&ctx.client, &mut ctx.session, job).await?
            };
            ctx.save_session()?;
            print_success(&format!("Job '{job_name}' submitted (id: {id})"));
        }
        JobCommands::List => {
            let jobs = ctx.client.list_jobs().await?;
            let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
            print_list(&rows, format);
        }
        JobCommands::Status { id } => {
            let job = ctx.client.job_status(&JobId::from(id.as_str())).await?;
            print_status(&job);
        }
        JobCommands::Cancel { id, clear } => {
            let job_id = JobId::from(id.as_str());
            netrender_client::operators::cancel_job(&ctx.client, &mut ctx.session, &job_id, *clear)
                .await?;
            ctx.save_session()?;
            print_success(&format!("Job {job_id} cancelled"));
        }
        JobCommands::CancelAll { clear } => {
            netrender_client::operators::cancel_all_jobs(&ctx.client, &mut ctx.session, *clear)
                .await?;
            ctx.save_session()?;
            print_success("All jobs cancelled");
        }
    }
    Ok(())
}

/// Assemble a [`CreateJob`] from the command line: hash every input file
/// and expand the frame expression into queued frames.
fn build_job(
    file: &Path,
    extra_files: &[PathBuf],
    frames: &str,
    name: Option<&str>,
    engine: &str,
) -> Result<CreateJob, NetError> {
    let mut files = vec![signed_file(file)?];
    for extra in extra_files {
        files.push(signed_file(extra)?);
    }

    let frame_numbers = parse_frames(frames)?;
    let frames = frame_numbers.into_iter().map(RenderFrame::new).collect();

    let name = name
        .map(str::to_string)
        .or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "untitled".to_string());

    Ok(CreateJob {
        name,
        job_type: JobType::Blender,
        subtype: JobSubType::None,
        files,
        frames,
        engine: engine.to_string(),
        resolution: Resolution::default(),
    })
}

fn signed_file(path: &Path) -> Result<RenderFile, NetError> {
    let signature = signature::file_signature(path).map_err(|e| {
        NetError::validation(format!("Cannot read input file {}: {e}", path.display()))
    })?;
    Ok(RenderFile::new(path.to_string_lossy(), signature))
}

/// Parse a frame expression such as `1-5,8,20-24` into sorted, deduplicated
/// frame numbers.
fn parse_frames(expr: &str) -> Result<Vec<i64>, NetError> {
    let mut numbers = Vec::new();
    for part in expr.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('-') {
            Some((first, last)) => {
                let first: i64 = parse_frame_number(first)?;
                let last: i64 = parse_frame_number(last)?;
                if last < first {
                    return Err(NetError::validation(format!(
                        "Invalid frame range '{part}': end before start"
                    )));
                }
                numbers.extend(first..=last);
            }
            None => numbers.push(parse_frame_number(part)?),
        }
    }
    if numbers.is_empty() {
        return Err(NetError::validation("Frame expression is empty"));
    }
    numbers.sort_unstable();
    numbers.dedup();
    Ok(numbers)
}

fn parse_frame_number(text: &str) -> Result<i64, NetError> {
    text.trim()
        .parse()
        .map_err(|_| NetError::validation(format!("Invalid frame number '{}'", text.trim())))
}

#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    job_type: String,
    #[tabled(rename = "Frames")]
    frames: usize,
    #[tabled(rename = "Done")]
    done: usize,
    #[tabled(rename = "Errors")]
    errors: usize,
}

impl From<&RenderJob> for JobRow {
    fn from(job: &RenderJob) -> Self {
        Self {
            id: job.id.to_string(),
            name: job.name.clone(),
            job_type: job.job_type.to_string(),
            frames: job.frames.len(),
            done: job.frames_with_status(FrameStatus::Done).len(),
            errors: job.frames_with_status(FrameStatus::Error).len(),
        }
    }
}

fn print_status(job: &RenderJob) {
    println!("Job {}", job.id);
    print_kv("Name", &job.name);
    print_kv("Type", &job.job_type.to_string());
    print_kv("Engine", &job.engine);
    print_kv("Frames", &job.frames.len().to_string());
    print_kv(
        "Done",
        &job.frames_with_status(FrameStatus::Done).len().to_string(),
    );
    print_kv(
        "Errors",
        &job.frames_with_status(FrameStatus::Error).len().to_string(),
    );
    print_kv(
        "Queued",
        &job.frames_with_status(FrameStatus::Queued)
            .len()
            .to_string(),
    );
}
