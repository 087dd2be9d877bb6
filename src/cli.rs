//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Asynchronous guideline ingestion: summary, checklist and diagram from one job.
#[derive(Debug, Parser)]
#[command(name = "guideline-ingest", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Model used for every stage, overriding the config file.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Directory holding job records, overriding the config file.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to the config file.
    #[arg(long, global = true, default_value = crate::config::CONFIG_FILE)]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API and run the worker pool.
    Serve {
        /// Address to listen on.
        #[arg(long)]
        bind: Option<String>,

        /// Number of workers draining the queue.
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Create a job. Without --inline the job is only recorded as pending.
    Submit {
        /// Run the pipeline in this process before returning.
        #[arg(long)]
        inline: bool,
    },

    /// Print the status of a job as JSON.
    Status {
        id: Uuid,
    },

    /// Run the pipeline for an existing job id.
    Process {
        id: Uuid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_serve_subcommand() {
        let cli = Cli::parse_from(["guideline-ingest", "serve", "--bind", "0.0.0.0:9000"]);
        match cli.command {
            Command::Serve { bind, workers } => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0:9000"));
                assert!(workers.is_none());
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "guideline-ingest",
            "--model",
            "gpt-4o-mini",
            "--data-dir",
            "/tmp/jobs",
            "--verbose",
            "submit",
            "--inline",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/jobs")));
        assert!(matches!(cli.command, Command::Submit { inline: true }));
    }

    #[test]
    fn cli_rejects_malformed_job_id() {
        let result = Cli::try_parse_from(["guideline-ingest", "status", "not-a-uuid"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
