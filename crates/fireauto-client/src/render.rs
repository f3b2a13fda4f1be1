//! Operator-facing text for API results.

use serde_json::{Map, Value};

use crate::types::{Automation, SystemStats};

const SEPARATOR_WIDTH: usize = 50;

pub fn automation_lines(automations: &[Automation]) -> Vec<String> {
    if automations.is_empty() {
        return vec!["No automations configured".to_string()];
    }

    let separator = "-".repeat(SEPARATOR_WIDTH);
    let mut lines = vec!["Configured automations:".to_string(), separator.clone()];
    for automation in automations {
        lines.push(format!("ID: {}", automation.id));
        lines.push(format!("Name: {}", automation.name));
        lines.push(format!(
            "Trigger: {} {}",
            automation.trigger_type,
            compact(&automation.trigger_config)
        ));
        lines.push(format!("Action: {}", automation.action_type));
        lines.push(format!(
            "Status: {}",
            if automation.enabled { "enabled" } else { "disabled" }
        ));
        lines.push(separator.clone());
    }
    lines
}

pub fn stats_lines(stats: &SystemStats) -> Vec<String> {
    vec![
        format!("CPU usage: {:.1}%", stats.cpu_percent),
        format!("Memory usage: {:.1}%", stats.memory_percent),
        format!("Disk usage: {:.1}%", stats.disk_percent),
        format!("Active automations: {}", stats.active_automations),
        format!("Total automations: {}", stats.total_automations),
        format!(
            "Scheduler: {}",
            if stats.scheduler_running { "running" } else { "stopped" }
        ),
    ]
}

fn compact(config: &Map<String, Value>) -> String {
    if config.is_empty() {
        return String::new();
    }
    Value::Object(config.clone()).to_string()
}
