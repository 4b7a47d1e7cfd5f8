mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use warden_core::config::get_data_dir;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Foreground app blocker daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the blocker daemon in the background
    Start {
        /// File or fifo the event feed is read from
        #[arg(short, long)]
        input: PathBuf,
    },
    /// (Internal) Run the daemon process
    #[command(hide = true)]
    DaemonInternalStart {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Stop the blocker daemon
    Stop,
    /// Show daemon status
    Status,
    /// Run the daemon in the foreground
    Run {
        /// Read the event feed from a file or fifo instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Log usage samples instead of storing them
        #[arg(long)]
        ephemeral: bool,
    },
    /// Report that the overlay was dismissed
    Dismiss,
    /// Manage the block list
    Block {
        #[command(subcommand)]
        action: BlockAction,
    },
    /// Turn monitoring on or off
    Monitor {
        #[command(subcommand)]
        action: MonitorAction,
    },
    /// Show recorded foreground usage
    Usage {
        /// Time period: today, week, month, or all
        #[arg(default_value = "today")]
        period: String,
    },
    /// Run a recorded feed through the engine without waiting
    Replay {
        /// JSON-lines feed file
        file: PathBuf,
        /// Blocked package for this run; defaults to the saved block list
        #[arg(short, long = "block")]
        blocked: Vec<String>,
        /// Print one JSON object per output line
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum BlockAction {
    /// Add packages to the block list
    Add { packages: Vec<String> },
    /// Remove packages from the block list
    Remove { packages: Vec<String> },
    /// Replace the block list
    Set { packages: Vec<String> },
    /// List blocked packages
    List,
}

#[derive(Subcommand, Debug)]
enum MonitorAction {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::DaemonInternalStart { .. }) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init();
    }

    let data_dir = get_data_dir()?;

    match cli.command {
        Commands::Start { input } => commands::daemon::start_daemon(&data_dir, &input),
        Commands::DaemonInternalStart { input } => {
            commands::daemon::run_daemon_process(&data_dir, &input).await
        }
        Commands::Stop => commands::daemon::stop_daemon(&data_dir).await,
        Commands::Status => commands::daemon::show_status(&data_dir).await,
        Commands::Run { input, ephemeral } => {
            commands::daemon::run_foreground(&data_dir, input, ephemeral).await
        }
        Commands::Dismiss => commands::daemon::dismiss(&data_dir).await,
        Commands::Block { action } => match action {
            BlockAction::Add { packages } => commands::block::add(&data_dir, &packages).await,
            BlockAction::Remove { packages } => {
                commands::block::remove(&data_dir, &packages).await
            }
            BlockAction::Set { packages } => commands::block::set(&data_dir, &packages).await,
            BlockAction::List => commands::block::list(&data_dir).await,
        },
        Commands::Monitor { action } => {
            let enabled = matches!(action, MonitorAction::On);
            commands::monitor::set_monitoring(&data_dir, enabled).await
        }
        Commands::Usage { period } => commands::usage::handle_usage_command(&data_dir, &period),
        Commands::Replay {
            file,
            blocked,
            json,
        } => commands::replay::handle_replay_command(&data_dir, &file, blocked, json),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(),
            ConfigAction::Path => commands::config::path(),
            ConfigAction::Init { force } => commands::config::init(force),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_requires_feed_path() {
        assert!(Cli::try_parse_from(["warden", "start"]).is_err());

        let cli = Cli::try_parse_from(["warden", "start", "--input", "/tmp/feed"]).unwrap();
        assert!(matches!(cli.command, Commands::Start { input } if input == PathBuf::from("/tmp/feed")));
    }

    #[test]
    fn test_run_reads_stdin_by_default() {
        let cli = Cli::try_parse_from(["warden", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { input: None, ephemeral: false }));
    }
}
