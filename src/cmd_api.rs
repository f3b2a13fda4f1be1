//! Automation API verbs.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use fireauto_client::{ApiClient, Automation, ClientError, automation_lines, stats_lines};
use fireauto_config::{ConfigurationRecord, Settings};

use crate::cli::{ApiArgs, AutomationCommand};

/// Client for `--url`, or for the address in the installed configuration record.
fn client(settings: &Settings, api: &ApiArgs) -> Result<ApiClient, ClientError> {
    if let Some(url) = &api.url {
        return ApiClient::new(url);
    }

    let path = settings.config_path();
    let record = match ConfigurationRecord::load(&path) {
        Ok(record) => record,
        Err(e) => {
            debug!("Using default API address ({})", e);
            ConfigurationRecord::default()
        }
    };
    ApiClient::from_record(&record)
}

fn read_definition(file: &Path) -> Result<Automation, ClientError> {
    let content = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| ClientError::InvalidDefinition(format!("stdin: {}", e)))?;
        buf
    } else {
        std::fs::read_to_string(file)
            .map_err(|e| ClientError::InvalidDefinition(format!("{}: {}", file.display(), e)))?
    };
    Automation::from_json(&content)
}

async fn automations(
    action: AutomationCommand,
    settings: &Settings,
    api: &ApiArgs,
) -> Result<Vec<String>, ClientError> {
    let client = client(settings, api)?;
    debug!("Automation API at {}", client.base_url());

    let line = match action {
        AutomationCommand::List => return Ok(automation_lines(&client.list_automations().await?)),
        AutomationCommand::Create { file } => {
            let automation = read_definition(&file)?;
            client.create_automation(&automation).await?
        }
        AutomationCommand::Execute { id } => client.execute_automation(&id).await?,
        AutomationCommand::Delete { id } => client.delete_automation(&id).await?,
    };
    Ok(vec![line])
}

fn print_lines(result: Result<Vec<String>, ClientError>) -> i32 {
    match result {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

pub(crate) async fn run_automations(
    action: AutomationCommand,
    settings: Settings,
    api: ApiArgs,
) -> i32 {
    print_lines(automations(action, &settings, &api).await)
}

pub(crate) async fn run_stats(settings: Settings, api: ApiArgs) -> i32 {
    let result = match client(&settings, &api) {
        Ok(client) => client.stats().await.map(|stats| stats_lines(&stats)),
        Err(e) => Err(e),
    };
    print_lines(result)
}
