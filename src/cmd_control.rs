//! Lifecycle controller verbs.

use tracing::debug;

use fireauto_config::Settings;
use fireauto_daemon::{Controller, Verb};

/// Run one controller verb and return the process exit status.
pub(crate) async fn run_verb(verb: Verb, settings: Settings, interactive: bool) -> i32 {
    let controller = Controller::from_host(settings, interactive);
    debug!(
        "Host {} with {} supervision",
        controller.profile().os_family,
        controller.kind()
    );

    match controller.dispatch(verb).await {
        Ok(report) => {
            for line in &report.lines {
                println!("{}", line);
            }
            report.exit_code
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}
