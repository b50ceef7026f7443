//! Result collection commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use netrender_core::error::NetError;
use netrender_core::types::JobId;

use super::CommandContext;
use crate::output::{print_success, print_warning};

#[derive(Debug, Args)]
pub struct ResultsArgs {
    #[command(subcommand)]
    pub command: ResultsCommands,
}

#[derive(Debug, Subcommand)]
pub enum ResultsCommands {
    /// Download the finished frames of a job as one archive
    Download {
        /// Job id
        id: String,
        /// Output directory; defaults to the configured results directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

pub async fn execute(args: &ResultsArgs, config_path: &str) -> Result<(), NetError> {
    let ctx = CommandContext::open(config_path)?;

    match &args.command {
        ResultsCommands::Download { id, out } => {
            let job_id = JobId::from(id.as_str());
            let out_dir = out
                .clone()
                .unwrap_or_else(|| PathBuf::from(&ctx.config.client.output_dir));
            let report =
                netrender_client::operators::download_results(&ctx.client, &job_id, &out_dir)
                    .await?;
            if report.skipped_error > 0 || report.skipped_missing > 0 {
                print_warning(&report.message());
            } else {
                print_success(&report.message());
            }
            if let Some(path) = &report.archive_path {
                println!("  {}", path.display());
            }
        }
    }
    Ok(())
}
