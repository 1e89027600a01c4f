//! state-sync - maintenance commands for state storage.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use state_config_and_utils::{init_logging, Config, Paths};

/// state-sync command-line interface.
#[derive(Parser)]
#[command(name = "state-sync")]
#[command(about = "Maintenance commands for state-sync storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, database and logs. Defaults to ~/.state-sync
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove expired state records
    Sweep {
        /// Also remove every record of this session
        #[arg(long)]
        session: Option<String>,
    },
    /// Print one stored state
    Inspect {
        #[arg(long)]
        session: String,
        #[arg(long)]
        state: String,
        /// Backend to read from
        #[arg(long, value_enum, default_value_t = Backend::Database)]
        backend: Backend,
    },
    /// Validate a state declaration manifest and list its states
    Manifest {
        /// Manifest file. Defaults to `descriptors_file` from the config
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Session,
    Database,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, Some(paths.log_file()));

    match cli.command {
        Commands::Sweep { session } => {
            commands::sweep(&config, &paths, session.as_deref()).await?;
        }
        Commands::Inspect {
            session,
            state,
            backend,
        } => {
            commands::inspect(&config, &paths, &session, &state, backend).await?;
        }
        Commands::Manifest { file } => {
            let Some(file) = file.or_else(|| config.descriptors_file.clone()) else {
                anyhow::bail!("no manifest file given and no descriptors_file configured");
            };
            commands::manifest(&file)?;
        }
    }

    Ok(())
}
