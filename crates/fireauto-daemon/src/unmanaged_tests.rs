use super::*;
use std::sync::Arc;

use fireauto_config::Settings;
use tempfile::TempDir;

use crate::testing::ScriptedRunner;

fn settings_in(dir: &TempDir, entry_command: &str) -> Settings {
    let mut settings = Settings::default();
    settings.service.entry_command = entry_command.to_string();
    settings.service.run_as_user = "root".to_string();
    settings.paths.app_dir = dir.path().to_path_buf();
    settings.paths.pid_file = dir.path().join("fireauto.pid");
    settings.paths.log_file = dir.path().join("fireauto.log");
    settings.supervision.settle_delay_secs = 0;
    settings.supervision.stop_timeout_secs = 5;
    settings.supervision.start_grace_millis = 200;
    settings
}

fn supervisor_with(settings: &Settings, runner: Arc<ScriptedRunner>) -> UnmanagedSupervisor {
    UnmanagedSupervisor::new(
        ServiceDescriptor::from_settings(settings),
        settings.paths.pid_file.clone(),
        settings.paths.log_file.clone(),
        settings.supervision.clone(),
        runner,
    )
}

fn supervisor(settings: &Settings) -> UnmanagedSupervisor {
    supervisor_with(settings, Arc::new(ScriptedRunner::new()))
}

fn started_pid(outcome: Outcome) -> u32 {
    match outcome {
        Outcome::Started { pid: Some(pid) } | Outcome::Restarted { pid: Some(pid) } => pid,
        other => panic!("expected a started process, got {:?}", other),
    }
}

fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

#[tokio::test]
async fn test_start_status_stop() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir, "sleep 30");
    let service = supervisor(&settings);

    let pid = started_pid(service.start().await.unwrap());
    assert!(PidFile::is_process_running(pid));
    assert_eq!(service.pid_file().read_pid().unwrap(), Some(pid));

    let report = service.status().await.unwrap();
    assert_eq!(report.kind, SupervisionKind::Unmanaged);
    assert!(report.running);
    assert_eq!(report.pid, Some(pid));

    assert_eq!(service.stop().await.unwrap(), Outcome::Stopped);
    assert!(!PidFile::is_process_running(pid));
    assert!(!service.pid_file().exists());
}

#[tokio::test]
async fn test_double_start_keeps_one_process() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir, "sleep 30");
    let service = supervisor(&settings);

    let pid = started_pid(service.start().await.unwrap());
    assert_eq!(
        service.start().await.unwrap(),
        Outcome::AlreadyRunning { pid: Some(pid) }
    );
    assert_eq!(service.pid_file().read_pid().unwrap(), Some(pid));

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_stale_pid_file() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir, "sleep 30");
    let service = supervisor(&settings);
    let stale = dead_pid();
    service.pid_file().write_pid(stale).unwrap();

    let report = service.status().await.unwrap();
    assert!(!report.running);
    assert_eq!(report.pid, None);
    assert!(report.detail.contains("stale"));
    // Status never mutates the file.
    assert!(service.pid_file().exists());

    let pid = started_pid(service.start().await.unwrap());
    assert_ne!(pid, stale);
    assert_eq!(service.pid_file().read_pid().unwrap(), Some(pid));

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_when_not_running() {
    let dir = TempDir::new().unwrap();
    let service = supervisor(&settings_in(&dir, "sleep 30"));

    assert_eq!(service.stop().await.unwrap(), Outcome::NotRunning);

    service.pid_file().write_pid(dead_pid()).unwrap();
    assert_eq!(service.stop().await.unwrap(), Outcome::NotRunning);
    assert!(!service.pid_file().exists());
}

#[tokio::test]
async fn test_restart_replaces_process() {
    let dir = TempDir::new().unwrap();
    let service = supervisor(&settings_in(&dir, "sleep 30"));

    let first = started_pid(service.start().await.unwrap());
    let second = started_pid(service.restart().await.unwrap());

    assert_ne!(first, second);
    assert!(!PidFile::is_process_running(first));
    assert!(PidFile::is_process_running(second));
    assert_eq!(service.pid_file().read_pid().unwrap(), Some(second));

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_restart_from_stopped_starts() {
    let dir = TempDir::new().unwrap();
    let service = supervisor(&settings_in(&dir, "sleep 30"));

    let pid = started_pid(service.restart().await.unwrap());
    assert!(PidFile::is_process_running(pid));

    service.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_escalates_to_sigkill() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_in(&dir, "sh -c 'trap \"\" TERM; sleep 30'");
    settings.supervision.stop_timeout_secs = 1;
    let service = supervisor(&settings);

    let pid = started_pid(service.start().await.unwrap());
    assert_eq!(service.stop().await.unwrap(), Outcome::Stopped);
    assert!(!PidFile::is_process_running(pid));
}

#[tokio::test]
async fn test_immediate_exit_is_spawn_error() {
    let dir = TempDir::new().unwrap();
    let service = supervisor(&settings_in(&dir, "sh -c 'echo missing token >&2; exit 3'"));

    match service.start().await {
        Err(DaemonError::Spawn { reason, .. }) => {
            assert!(reason.contains("exit code 3"));
            assert!(reason.contains("missing token"));
        }
        other => panic!("expected spawn error, got {:?}", other),
    }
    assert!(!service.pid_file().exists());
}

#[tokio::test]
async fn test_output_goes_to_log_file() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir, "sh -c 'echo automation online; sleep 30'");
    let service = supervisor(&settings);

    service.start().await.unwrap();
    service.stop().await.unwrap();

    let log = std::fs::read_to_string(&settings.paths.log_file).unwrap();
    assert!(log.contains("automation online"));
}

#[tokio::test]
async fn test_logs_without_file() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir, "sleep 30");
    let runner = Arc::new(ScriptedRunner::new());
    let service = supervisor_with(&settings, runner.clone());

    assert_eq!(
        service.logs().await.unwrap(),
        Outcome::NoLogs {
            path: settings.paths.log_file.clone()
        }
    );
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_logs_follows_file() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir, "sleep 30");
    std::fs::write(&settings.paths.log_file, "line\n").unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let service = supervisor_with(&settings, runner.clone());

    assert_eq!(service.logs().await.unwrap(), Outcome::LogsClosed);
    assert!(runner.ran("tail -n 50 -F"));
}

#[tokio::test]
async fn test_enable_disable_unsupported() {
    let dir = TempDir::new().unwrap();
    let service = supervisor(&settings_in(&dir, "sleep 30"));

    assert_eq!(
        service.enable().await.unwrap(),
        Outcome::Unsupported { action: "enable" }
    );
    assert_eq!(
        service.disable().await.unwrap(),
        Outcome::Unsupported { action: "disable" }
    );
    assert!(!service.pid_file().exists());
}
