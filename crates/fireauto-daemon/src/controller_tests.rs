use super::*;

use fireauto_config::ConfigurationRecord;
use tempfile::TempDir;

use crate::runner::CommandOutput;
use crate::testing::ScriptedRunner;

const MANAGED: HostProfile = HostProfile {
    os_family: OsFamily::Debian,
    has_native_service_manager: true,
};

const UNMANAGED: HostProfile = HostProfile {
    os_family: OsFamily::GenericLinux,
    has_native_service_manager: false,
};

fn settings_in(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.paths.app_dir = dir.path().join("app");
    settings.paths.unit_dir = Some(dir.path().join("units"));
    settings.paths.pid_file = dir.path().join("fireauto.pid");
    settings.paths.log_file = dir.path().join("fireauto.log");
    settings.provision.verify_imports = vec!["fastapi".to_string(), "psutil".to_string()];
    settings
}

fn controller(profile: HostProfile, settings: Settings, runner: Arc<ScriptedRunner>) -> Controller {
    Controller::new(profile, settings, runner, false)
}

#[test]
fn test_verb_parse() {
    for verb in Verb::ALL {
        assert_eq!(verb.as_str().parse::<Verb>().unwrap(), verb);
    }
    assert!("bogus".parse::<Verb>().is_err());
    assert!("".parse::<Verb>().is_err());
}

#[tokio::test]
async fn test_managed_start_delegates() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new().respond("systemctl show", CommandOutput::with_code(0, "812\n")),
    );
    let control = controller(MANAGED, settings_in(&dir), runner.clone());

    let report = control.dispatch(Verb::Start).await.unwrap();
    assert_eq!(report.exit_code, 0);
    assert_eq!(report.lines, vec!["Started fireauto (PID 812)".to_string()]);
    assert!(runner.ran("systemctl start fireauto"));
}

#[tokio::test]
async fn test_managed_failure_keeps_tool_exit_code() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new().respond("systemctl stop", CommandOutput::with_code(5, "")),
    );
    let control = controller(MANAGED, settings_in(&dir), runner);

    let err = control.dispatch(Verb::Stop).await.unwrap_err();
    assert_eq!(err.exit_code(), 5);
}

#[tokio::test]
async fn test_managed_status_prints_verbatim() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::new().respond(
        "systemctl status",
        CommandOutput::with_code(3, "○ fireauto.service\n     Active: inactive (dead)\n"),
    ));
    let control = controller(MANAGED, settings_in(&dir), runner);

    let report = control.dispatch(Verb::Status).await.unwrap();
    assert_eq!(report.exit_code, 0);
    assert_eq!(
        report.lines,
        vec![
            "○ fireauto.service".to_string(),
            "     Active: inactive (dead)".to_string()
        ]
    );
}

#[tokio::test]
async fn test_unmanaged_status_not_running() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let control = controller(UNMANAGED, settings_in(&dir), runner.clone());

    let report = control.dispatch(Verb::Status).await.unwrap();
    assert_eq!(report.exit_code, 0);
    assert!(report.lines.iter().any(|l| l.contains("Not running")));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_unmanaged_enable_reports_unsupported() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let control = controller(UNMANAGED, settings_in(&dir), runner.clone());

    for verb in [Verb::Enable, Verb::Disable] {
        let report = control.dispatch(verb).await.unwrap();
        assert_eq!(report.exit_code, 0);
        assert!(report.lines[0].contains("not supported"));
    }
    assert!(!runner.ran("systemctl"));
}

#[tokio::test]
async fn test_web_reports_configured_address() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let record = ConfigurationRecord {
        host: "0.0.0.0".to_string(),
        port: 62599,
        ..Default::default()
    };
    record.save(&settings.config_path()).unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let control = controller(UNMANAGED, settings, runner.clone());

    let report = control.dispatch(Verb::Web).await.unwrap();
    assert_eq!(report.exit_code, 0);
    assert_eq!(report.lines, vec!["Web interface: http://0.0.0.0:62599".to_string()]);
    // Non-interactive runs never launch a browser.
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_web_custom_port() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let record = ConfigurationRecord {
        host: "10.0.0.5".to_string(),
        port: 8088,
        ..Default::default()
    };
    record.save(&settings.config_path()).unwrap();
    let control = controller(MANAGED, settings, Arc::new(ScriptedRunner::new()));

    let report = control.dispatch(Verb::Web).await.unwrap();
    assert_eq!(report.lines[0], "Web interface: http://10.0.0.5:8088");
}

#[tokio::test]
async fn test_config_opens_editor_and_mirrors_exit() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let config_path = settings.config_path();
    let runner = Arc::new(ScriptedRunner::new().respond("", CommandOutput::with_code(2, "")));
    let control = controller(MANAGED, settings, runner.clone());

    let report = control.dispatch(Verb::Config).await.unwrap();
    assert_eq!(report.exit_code, 2);

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].ends_with(&config_path.display().to_string()));
}

#[test]
fn test_editor_selection() {
    assert_eq!(
        editor_command(Some("code -w".to_string()), Some("vim".to_string()), true),
        "code -w"
    );
    assert_eq!(editor_command(None, Some("vim".to_string()), true), "vim");
    assert_eq!(editor_command(Some("  ".to_string()), None, true), "nano");
    assert_eq!(editor_command(None, None, false), "vi");
}

fn write_artifacts(settings: &Settings) {
    ConfigurationRecord::default()
        .save(&settings.config_path())
        .unwrap();
    std::fs::write(settings.automations_path(), "[]\n").unwrap();
    let unit = settings.unit_path();
    std::fs::create_dir_all(unit.parent().unwrap()).unwrap();
    std::fs::write(unit, "[Unit]\n").unwrap();
}

#[tokio::test]
async fn test_self_check_passes() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    write_artifacts(&settings);
    let runner = Arc::new(
        ScriptedRunner::new()
            .respond("python3 --version", CommandOutput::with_code(0, "Python 3.11.2\n")),
    );
    let control = controller(MANAGED, settings, runner.clone());

    let report = control.dispatch(Verb::Test).await.unwrap();
    assert_eq!(report.exit_code, 0, "{:?}", report.lines);
    assert!(report.lines.iter().any(|l| l.contains("Python 3.11.2")));
    assert!(runner.ran("python3 -c import fastapi"));
    assert!(runner.ran("python3 -c import psutil"));
    assert!(report.lines.iter().all(|l| !l.starts_with("[FAIL]")));
}

#[tokio::test]
async fn test_self_check_reports_missing_module() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    write_artifacts(&settings);
    let runner = Arc::new(ScriptedRunner::new().respond(
        "python3 -c import psutil",
        CommandOutput {
            code: 1,
            stdout: String::new(),
            stderr: "Traceback (most recent call last):\nModuleNotFoundError: No module named 'psutil'\n"
                .to_string(),
        },
    ));
    let control = controller(MANAGED, settings, runner);

    let report = control.dispatch(Verb::Test).await.unwrap();
    assert_eq!(report.exit_code, 1);
    assert!(
        report
            .lines
            .iter()
            .any(|l| l.starts_with("[FAIL]") && l.contains("No module named 'psutil'"))
    );
}

#[tokio::test]
async fn test_self_check_missing_artifacts() {
    let dir = TempDir::new().unwrap();
    let control = controller(MANAGED, settings_in(&dir), Arc::new(ScriptedRunner::new()));

    let report = control.dispatch(Verb::Test).await.unwrap();
    assert_eq!(report.exit_code, 1);
    let failures = report.lines.iter().filter(|l| l.starts_with("[FAIL]")).count();
    // Configuration, automations and unit file.
    assert_eq!(failures, 3);
}

#[tokio::test]
async fn test_self_check_unmanaged_needs_no_unit() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    ConfigurationRecord::default()
        .save(&settings.config_path())
        .unwrap();
    std::fs::write(settings.automations_path(), "[]\n").unwrap();
    let control = controller(UNMANAGED, settings, Arc::new(ScriptedRunner::new()));

    let report = control.dispatch(Verb::Test).await.unwrap();
    assert_eq!(report.exit_code, 0, "{:?}", report.lines);
}
