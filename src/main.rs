use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use stagehand::commands::{advance, checkpoint, goto_stage, init, run, status, validate};
use stagehand::commands::find_project_root;
use stagehand::models::PipelineError;
use stagehand::validation::{clap_description_validator, clap_id_validator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Stage pipeline driver with quality gates and checkpoint rollback", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize .work/ from a plan document
    Init {
        /// Path to the plan file
        plan_path: PathBuf,

        /// Remove an existing .work/ directory first
        #[arg(long)]
        clean: bool,
    },

    /// Advance to the next stage (gated unless forced)
    Advance {
        /// Advance even if the quality gate has not passed
        #[arg(short, long)]
        force: bool,

        /// Skip the gate check without overriding a blocked stage
        #[arg(long)]
        skip_gate_check: bool,

        /// Reason recorded in the transition history
        #[arg(long, value_parser = clap_description_validator)]
        reason: Option<String>,
    },

    /// Loop back to an arbitrary stage (corrective, no gate required)
    Goto {
        /// Target stage id (alphanumeric, dash, underscore; max 128 chars)
        #[arg(value_parser = clap_id_validator)]
        stage_id: String,

        /// Reason recorded in the transition history
        #[arg(long, value_parser = clap_description_validator)]
        reason: String,
    },

    /// Produce and validate the current stage (bounded retries)
    Run {
        /// Override the configured retry budget
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Evaluate a stage's quality gate
    Validate {
        /// Stage to validate (defaults to the current stage)
        #[arg(short, long, value_parser = clap_id_validator)]
        stage: Option<String>,
    },

    /// Show pipeline position, stage statuses, and recent transitions
    Status,

    /// Manage checkpoints
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
}

#[derive(Subcommand)]
enum CheckpointCommands {
    /// Snapshot the current pipeline state
    Create {
        #[arg(long, value_parser = clap_description_validator)]
        description: Option<String>,

        /// Protect this checkpoint from automatic cleanup
        #[arg(long)]
        milestone: bool,
    },

    /// List checkpoints, newest first
    List,

    /// Restore a checkpoint (full, or only the named files)
    Restore {
        id: String,

        /// Manifest-relative files to restore instead of everything
        #[arg(long, num_args = 1..)]
        partial: Vec<String>,
    },

    /// Delete old checkpoints beyond the retention count
    Cleanup {
        /// Override the configured retention count
        #[arg(long)]
        retain: Option<usize>,
    },

    /// Delete a single checkpoint
    Delete {
        id: String,

        /// Allow deleting a milestone checkpoint
        #[arg(short, long)]
        force: bool,
    },
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { plan_path, clean } => {
            let root = std::env::current_dir()?;
            init::execute(&root, &plan_path, clean)
        }
        Commands::Advance {
            force,
            skip_gate_check,
            reason,
        } => advance::execute(&find_project_root()?, force, skip_gate_check, reason),
        Commands::Goto { stage_id, reason } => {
            goto_stage::execute(&find_project_root()?, &stage_id, &reason)
        }
        Commands::Run { max_attempts } => run::execute(&find_project_root()?, max_attempts),
        Commands::Validate { stage } => validate::execute(&find_project_root()?, stage),
        Commands::Status => status::execute(&find_project_root()?),
        Commands::Checkpoint { command } => {
            let root = find_project_root()?;
            match command {
                CheckpointCommands::Create {
                    description,
                    milestone,
                } => checkpoint::create(&root, description, milestone),
                CheckpointCommands::List => checkpoint::list(&root),
                CheckpointCommands::Restore { id, partial } => {
                    checkpoint::restore(&root, &id, partial)
                }
                CheckpointCommands::Cleanup { retain } => checkpoint::cleanup(&root, retain),
                CheckpointCommands::Delete { id, force } => checkpoint::delete(&root, &id, force),
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("STAGEHAND_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = dispatch(cli) {
        eprintln!("{} {err:#}", "✗".red().bold());
        let code = err
            .downcast_ref::<PipelineError>()
            .map(PipelineError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
