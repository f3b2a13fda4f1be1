//! fireauto - 24Fire Automation Service
//!
//! `fireauto install` / `fireauto uninstall` set the service up and tear
//! it down. The lifecycle verbs control the installed service, and
//! `automations` / `stats` talk to it over its HTTP API.

mod cli;
mod cmd_api;
mod cmd_control;
mod cmd_setup;

use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing::{error, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use fireauto_config::SettingsLoader;

use crate::cli::{Cli, Commands};

/// Install stderr logging, plus a daily log file under `log_dir` when given.
fn init_tracing(default_level: &str, log_dir: Option<&Path>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("install")
            .filename_suffix("log")
            .max_log_files(30)
            .build(dir)
            .ok()?;
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        // Flushes on drop, so it has to outlive main.
        static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
            std::sync::OnceLock::new();
        let _ = GUARD.set(guard);

        Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();
}

fn exit_with(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Parse `args` and run the command, returning the process exit code.
async fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { 1 } else { 0 };
        }
    };

    let Some(command) = cli.command else {
        eprintln!("{}", Cli::command().render_long_help());
        return 1;
    };

    let settings = SettingsLoader::load_or_default(&cli.settings).map(|mut settings| {
        settings.paths.settings_file = cli.settings.clone();
        settings
    });

    let log_dir = match (&command, &settings) {
        (Commands::Install { .. }, Ok(settings)) => Some(settings.paths.log_dir.as_path()),
        _ => None,
    };
    init_tracing(command.default_log_level(), log_dir);

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings from {}: {}", cli.settings.display(), e);
            return 1;
        }
    };

    let interactive = std::io::stdin().is_terminal() && !cli.non_interactive;
    if !interactive {
        tracing::debug!("Running non-interactively");
    }

    let code = match command {
        Commands::Install {
            skip_packages,
            no_start,
            source_dir,
        } => {
            let options = fireauto_setup::InstallOptions {
                skip_packages,
                start: !no_start,
                source_dir,
                executable: None,
            };
            cmd_setup::run_install(settings, options, interactive).await
        }
        Commands::Uninstall { yes } => cmd_setup::run_uninstall(settings, yes, interactive).await,
        Commands::Automations { action, api } => {
            cmd_api::run_automations(action, settings, api).await
        }
        Commands::Stats { api } => cmd_api::run_stats(settings, api).await,
        other => match other.verb() {
            Some(verb) => cmd_control::run_verb(verb, settings, interactive).await,
            None => {
                warn!("Unhandled command {:?}", other);
                1
            }
        },
    };

    code
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    exit_with(run(std::env::args_os()).await)
}
