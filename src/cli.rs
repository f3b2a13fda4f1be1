//! CLI definitions for fireauto.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fireauto_config::DEFAULT_SETTINGS_PATH;
use fireauto_daemon::Verb;

/// fireauto CLI.
#[derive(Parser)]
#[command(name = "fireauto")]
#[command(about = "Install, supervise and remove the 24Fire automation service")]
#[command(version)]
pub(crate) struct Cli {
    /// Settings file path
    #[arg(
        long,
        env = "FIREAUTO_SETTINGS",
        default_value = DEFAULT_SETTINGS_PATH,
        global = true
    )]
    pub settings: PathBuf,

    /// Never prompt, even with a terminal attached
    #[arg(long, global = true)]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub(crate) enum Commands {
    /// Start the service
    Start,
    /// Stop the service
    Stop,
    /// Stop the service, then start it again
    Restart,
    /// Show whether the service is running
    Status,
    /// Follow the service output (Ctrl-C to quit)
    Logs,
    /// Start the service at boot
    Enable,
    /// Do not start the service at boot
    Disable,
    /// Edit the configuration in $VISUAL / $EDITOR
    Config,
    /// Check dependencies and configuration
    Test,
    /// Show the web interface address
    Web,

    /// Install the service on this host
    Install {
        /// Do not install system or Python packages
        #[arg(long)]
        skip_packages: bool,

        /// Do not start the service when done
        #[arg(long)]
        no_start: bool,

        /// Directory with application files to copy into the app directory
        #[arg(long)]
        source_dir: Option<PathBuf>,
    },

    /// Remove the service and its files from this host
    Uninstall {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage automations on the running service
    Automations {
        #[command(subcommand)]
        action: AutomationCommand,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Show host statistics reported by the running service
    Stats {
        #[command(flatten)]
        api: ApiArgs,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub(crate) enum AutomationCommand {
    /// List configured automations
    List,
    /// Create an automation from a JSON definition ("-" reads stdin)
    Create { file: PathBuf },
    /// Run an automation's action now
    Execute { id: String },
    /// Delete an automation
    Delete { id: String },
}

#[derive(Args, Debug, Default, PartialEq, Eq)]
pub(crate) struct ApiArgs {
    /// API address; defaults to the host and port in the configuration record
    #[arg(long, env = "FIREAUTO_API_URL")]
    pub url: Option<String>,
}

impl Commands {
    /// Controller verb for this command, if it is one.
    pub fn verb(&self) -> Option<Verb> {
        match self {
            Commands::Start => Some(Verb::Start),
            Commands::Stop => Some(Verb::Stop),
            Commands::Restart => Some(Verb::Restart),
            Commands::Status => Some(Verb::Status),
            Commands::Logs => Some(Verb::Logs),
            Commands::Enable => Some(Verb::Enable),
            Commands::Disable => Some(Verb::Disable),
            Commands::Config => Some(Verb::Config),
            Commands::Test => Some(Verb::Test),
            Commands::Web => Some(Verb::Web),
            Commands::Install { .. }
            | Commands::Uninstall { .. }
            | Commands::Automations { .. }
            | Commands::Stats { .. } => None,
        }
    }

    /// Install and uninstall narrate their progress; controller verbs stay quiet.
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Commands::Install { .. } | Commands::Uninstall { .. } => "info",
            _ => "warn",
        }
    }
}
