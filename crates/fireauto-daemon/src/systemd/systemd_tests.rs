use super::*;
use std::path::PathBuf;
use std::sync::Arc;

use fireauto_config::{RestartPolicy, Settings};
use tempfile::TempDir;

use crate::error::DaemonError;
use crate::runner::CommandOutput;
use crate::supervisor::{Outcome, SupervisionKind, Supervisor};
use crate::testing::ScriptedRunner;

fn settings_in(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.paths.unit_dir = Some(dir.path().join("units"));
    settings.paths.app_dir = PathBuf::from("/opt/fireauto");
    settings.service.entry_command = "/opt/fireauto/venv/bin/python main.py".to_string();
    settings.service.run_as_user = "fire".to_string();
    settings
}

fn supervisor(
    settings: &Settings,
    runner: ScriptedRunner,
) -> (SystemdSupervisor, Arc<ScriptedRunner>) {
    let runner = Arc::new(runner);
    (SystemdSupervisor::from_settings(settings, runner.clone()), runner)
}

#[test]
fn test_generate_unit() {
    let dir = TempDir::new().unwrap();
    let (service, _) = supervisor(&settings_in(&dir), ScriptedRunner::new());
    let unit = service.generate_unit();

    assert!(unit.contains("[Unit]"));
    assert!(unit.contains("[Service]"));
    assert!(unit.contains("[Install]"));
    assert!(unit.contains("Description=24Fire Automation Service"));
    assert!(unit.contains("ExecStart=/opt/fireauto/venv/bin/python main.py"));
    assert!(unit.contains("WorkingDirectory=/opt/fireauto"));
    assert!(unit.contains("User=fire"));
    assert!(unit.contains("Restart=always"));
    assert!(unit.contains("RestartSec=10"));
    assert!(unit.contains("SyslogIdentifier=fireauto"));
    assert!(unit.contains("WantedBy=multi-user.target"));
}

#[test]
fn test_generate_unit_never_restart() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_in(&dir);
    settings.service.restart_policy = RestartPolicy::Never;
    let (service, _) = supervisor(&settings, ScriptedRunner::new());
    let unit = service.generate_unit();

    assert!(unit.contains("Restart=no"));
    assert!(!unit.contains("RestartSec="));
}

#[test]
fn test_generate_unit_user_mode() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_in(&dir);
    settings.service.user_mode = true;
    let (service, _) = supervisor(&settings, ScriptedRunner::new());
    let unit = service.generate_unit();

    assert!(!unit.contains("User="));
    assert!(unit.contains("WantedBy=default.target"));
}

#[test]
fn test_exec_start_unresolvable_program() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_in(&dir);
    settings.service.entry_command = "fireauto-no-such-interpreter main.py".to_string();
    let (service, _) = supervisor(&settings, ScriptedRunner::new());

    assert_eq!(
        service.exec_start(),
        "/usr/bin/env fireauto-no-such-interpreter main.py"
    );
}

#[tokio::test]
async fn test_install_writes_unit_and_reloads() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let (service, runner) = supervisor(&settings, ScriptedRunner::new());

    service.install().await.unwrap();

    assert!(service.is_installed());
    assert_eq!(service.unit_path(), dir.path().join("units/fireauto.service"));
    assert!(runner.ran("systemctl daemon-reload"));
}

#[tokio::test]
async fn test_uninstall_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (service, _) = supervisor(&settings_in(&dir), ScriptedRunner::new());

    service.install().await.unwrap();
    assert!(service.uninstall().await.unwrap());
    assert!(!service.is_installed());
    assert!(!service.uninstall().await.unwrap());
}

#[tokio::test]
async fn test_start_delegates() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new().respond(
        "systemctl show fireauto",
        CommandOutput::with_code(0, "4242\n"),
    );
    let (service, runner) = supervisor(&settings_in(&dir), runner);

    let outcome = service.start().await.unwrap();
    assert_eq!(outcome, Outcome::Started { pid: Some(4242) });
    assert!(runner.ran("systemctl start fireauto"));
}

#[tokio::test]
async fn test_start_failure_propagates_exit_code() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new().respond(
        "systemctl start",
        CommandOutput {
            code: 5,
            stdout: String::new(),
            stderr: "Failed to start fireauto.service: Unit fireauto.service not found.\n"
                .to_string(),
        },
    );
    let (service, _) = supervisor(&settings_in(&dir), runner);

    let err = service.start().await.unwrap_err();
    assert_eq!(err.exit_code(), 5);
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_user_mode_passes_user_flag() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_in(&dir);
    settings.service.user_mode = true;
    let (service, runner) = supervisor(&settings, ScriptedRunner::new());

    service.stop().await.unwrap();
    service.logs().await.unwrap();
    assert!(runner.ran("systemctl --user stop fireauto"));
    assert!(runner.ran("journalctl --user -u fireauto -f"));
}

#[tokio::test]
async fn test_restart_waits_for_active() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new()
        .respond("systemctl is-active", CommandOutput::with_code(3, "activating\n"))
        .respond("systemctl is-active", CommandOutput::with_code(0, "active\n"))
        .respond("systemctl show", CommandOutput::with_code(0, "777\n"));
    let (service, runner) = supervisor(&settings_in(&dir), runner);

    let outcome = service.restart().await.unwrap();
    assert_eq!(outcome, Outcome::Restarted { pid: Some(777) });

    let calls = runner.calls();
    let restart_at = calls.iter().position(|c| c == "systemctl restart fireauto").unwrap();
    let active_checks = calls
        .iter()
        .skip(restart_at)
        .filter(|c| c.starts_with("systemctl is-active"))
        .count();
    assert_eq!(active_checks, 2);
}

#[tokio::test]
async fn test_restart_reports_failed_unit() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new()
        .respond("systemctl is-active", CommandOutput::with_code(3, "failed\n"));
    let (service, _) = supervisor(&settings_in(&dir), runner);

    let err = service.restart().await.unwrap_err();
    assert!(matches!(err, DaemonError::NotActive { ref state, .. } if state == "failed"));
}

#[tokio::test]
async fn test_restart_times_out() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_in(&dir);
    settings.supervision.active_timeout_secs = 0;
    let runner = ScriptedRunner::new()
        .respond("systemctl is-active", CommandOutput::with_code(3, "activating\n"));
    let (service, _) = supervisor(&settings, runner);

    let err = service.restart().await.unwrap_err();
    assert!(matches!(err, DaemonError::NotActive { .. }));
}

#[tokio::test]
async fn test_status_passes_output_through() {
    let dir = TempDir::new().unwrap();
    let verbatim = "● fireauto.service - 24Fire Automation Service\n     Active: active (running)\n";
    let runner = ScriptedRunner::new()
        .respond("systemctl status", CommandOutput::with_code(0, verbatim))
        .respond("systemctl is-active", CommandOutput::with_code(0, "active\n"))
        .respond("systemctl show", CommandOutput::with_code(0, "1001\n"));
    let (service, _) = supervisor(&settings_in(&dir), runner);

    let report = service.status().await.unwrap();
    assert_eq!(report.kind, SupervisionKind::Managed);
    assert!(report.running);
    assert_eq!(report.pid, Some(1001));
    assert_eq!(report.detail, verbatim);
}

#[tokio::test]
async fn test_status_inactive_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new()
        .respond("systemctl status", CommandOutput::with_code(3, "Active: inactive (dead)\n"));
    let (service, _) = supervisor(&settings_in(&dir), runner);

    let report = service.status().await.unwrap();
    assert!(!report.running);
    assert_eq!(report.pid, None);
}

#[tokio::test]
async fn test_status_unknown_unit_fails() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new().respond("systemctl status", CommandOutput::with_code(4, ""));
    let (service, _) = supervisor(&settings_in(&dir), runner);

    assert_eq!(service.status().await.unwrap_err().exit_code(), 4);
}

#[tokio::test]
async fn test_enable_disable_delegate() {
    let dir = TempDir::new().unwrap();
    let (service, runner) = supervisor(&settings_in(&dir), ScriptedRunner::new());

    assert_eq!(service.enable().await.unwrap(), Outcome::Enabled);
    assert_eq!(service.disable().await.unwrap(), Outcome::Disabled);
    assert!(runner.ran("systemctl enable fireauto"));
    assert!(runner.ran("systemctl disable fireauto"));
}

#[tokio::test]
async fn test_logs_error_exit() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new().respond("journalctl", CommandOutput::with_code(1, ""));
    let (service, _) = supervisor(&settings_in(&dir), runner);

    assert!(service.logs().await.is_err());
}
