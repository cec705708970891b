//! Main entry point for the Parley chat CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Parley CLI
#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Command-line client for the Parley realtime chat", long_about = None)]
pub(crate) struct Cli {
    /// Path to the configuration file (optional)
    #[arg(
        long,
        short,
        global = true,
        help = "Path to the configuration file (e.g., config.yaml or config.json). If not provided, defaults and PARLEY_* variables are used."
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Parley CLI
#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session credential
    Login(commands::session::LoginArgs),

    /// Create a new account
    Signup(commands::session::SignupArgs),

    /// Forget the stored credential
    Logout,

    /// Join the chat room: live messages, presence and sending
    Chat,

    /// Show or edit user profiles
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileCommand,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: clap_complete::Shell,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml or json). Defaults to yaml.
        #[arg(
            long,
            short,
            help = "Format of the configuration file to generate (yaml or json). Defaults to yaml."
        )]
        format: Option<String>,
    },
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("PARLEY_LOG").unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .parse_lossy(default_level)
    });
    // Logs go to stderr so chat output on stdout stays clean.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Completion { shell } => commands::completion::generate_completion(shell),
        Commands::Config { format } => {
            let format = format.unwrap_or_else(|| "yaml".to_string());
            commands::config::generate_config(&format)?;
        }
        command => {
            let config = commands::load_config(cli.config)?;
            init_tracing(&config.log_level);
            match command {
                Commands::Login(args) => commands::session::login(&config, args).await?,
                Commands::Signup(args) => commands::session::signup(&config, args).await?,
                Commands::Logout => commands::session::logout()?,
                Commands::Chat => commands::chat::run(&config).await?,
                Commands::Profile { action } => commands::profile::handle(&config, action).await?,
                Commands::Completion { .. } | Commands::Config { .. } => {}
            }
        }
    }

    Ok(())
}
