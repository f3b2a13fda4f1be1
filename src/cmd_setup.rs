//! Install and uninstall handlers.

use tracing::error;

use fireauto_config::Settings;
use fireauto_setup::{
    InstallOptions, Installer, NonInteractivePrompter, Prompter, TerminalPrompter,
    UninstallOptions, Uninstaller,
};

fn prompter(interactive: bool) -> Box<dyn Prompter> {
    if interactive {
        Box::new(TerminalPrompter)
    } else {
        Box::new(NonInteractivePrompter)
    }
}

/// Install the service on this host.
pub(crate) async fn run_install(
    settings: Settings,
    options: InstallOptions,
    interactive: bool,
) -> i32 {
    let mut installer = Installer::from_host(settings, prompter(interactive), options);

    match installer.run().await {
        Ok(report) => {
            for line in report.summary(installer.settings()) {
                println!("{}", line);
            }
            0
        }
        Err(e) => {
            error!("Installation failed: {}", e);
            e.exit_code()
        }
    }
}

/// Remove the service and everything the installer created.
pub(crate) async fn run_uninstall(settings: Settings, assume_yes: bool, interactive: bool) -> i32 {
    let options = UninstallOptions { assume_yes };
    let mut uninstaller = Uninstaller::from_host(settings, prompter(interactive), options);

    match uninstaller.run().await {
        Ok(report) => {
            for line in report.lines() {
                println!("{}", line);
            }
            report.exit_code()
        }
        Err(e) => {
            error!("Uninstall failed: {}", e);
            e.exit_code()
        }
    }
}
