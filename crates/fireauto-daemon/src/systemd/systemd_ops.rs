//! SystemdSupervisor operational methods (start, stop, restart, status, logs).

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::SystemdSupervisor;
use crate::error::DaemonError;
use crate::runner::CommandOutput;
use crate::supervisor::{Outcome, StatusReport, SupervisionKind, Supervisor};

const ACTIVE_POLL_INTERVAL: Duration = Duration::from_millis(500);

impl SystemdSupervisor {
    /// Get systemctl command arguments for user/system mode.
    fn systemctl_args<'a>(&'a self, verb: &'a str) -> Vec<&'a str> {
        let mut args = Vec::with_capacity(3);
        if self.descriptor.user_mode {
            args.push("--user");
        }
        args.push(verb);
        args.push(self.descriptor.name.as_str());
        args
    }

    async fn systemctl(&self, verb: &str, extra: &[&str]) -> Result<CommandOutput, DaemonError> {
        let mut args = self.systemctl_args(verb);
        args.extend_from_slice(extra);
        self.runner.capture("systemctl", &args).await
    }

    /// Run `systemctl <verb> <name>` and fail with its exit status.
    async fn delegate(&self, verb: &str) -> Result<(), DaemonError> {
        self.systemctl(verb, &[])
            .await?
            .into_result(format!("systemctl {} {}", verb, self.descriptor.name))?;
        tracing::info!("systemctl {} {}", verb, self.descriptor.name);
        Ok(())
    }

    /// Reload systemd daemon configuration.
    pub async fn daemon_reload(&self) -> Result<(), DaemonError> {
        let mut args = Vec::new();
        if self.descriptor.user_mode {
            args.push("--user");
        }
        args.push("daemon-reload");

        self.runner
            .capture("systemctl", &args)
            .await?
            .into_result("systemctl daemon-reload")?;

        tracing::debug!("Reloaded systemd daemon");
        Ok(())
    }

    /// Current `ActiveState` as printed by `systemctl is-active`.
    pub async fn active_state(&self) -> Result<String, DaemonError> {
        let out = self.systemctl("is-active", &[]).await?;
        Ok(out.stdout.trim().to_string())
    }

    /// Main process ID, if the service has one.
    async fn main_pid(&self) -> Option<u32> {
        let out = self
            .systemctl("show", &["--property=MainPID", "--value"])
            .await
            .ok()?;
        match out.stdout.trim().parse::<u32>() {
            Ok(0) | Err(_) => None,
            Ok(pid) => Some(pid),
        }
    }

    /// Poll until systemd reports the unit `active`.
    async fn wait_active(&self) -> Result<(), DaemonError> {
        let timeout = self.timing.active_timeout();
        let deadline = Instant::now() + timeout;

        loop {
            let state = self.active_state().await?;
            if state == "active" {
                return Ok(());
            }
            if state == "failed" || Instant::now() >= deadline {
                return Err(DaemonError::NotActive {
                    name: self.descriptor.name.clone(),
                    secs: timeout.as_secs(),
                    state,
                });
            }
            tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Supervisor for SystemdSupervisor {
    fn kind(&self) -> SupervisionKind {
        SupervisionKind::Managed
    }

    async fn start(&self) -> Result<Outcome, DaemonError> {
        self.delegate("start").await?;
        Ok(Outcome::Started {
            pid: self.main_pid().await,
        })
    }

    async fn stop(&self) -> Result<Outcome, DaemonError> {
        self.delegate("stop").await?;
        Ok(Outcome::Stopped)
    }

    async fn restart(&self) -> Result<Outcome, DaemonError> {
        self.delegate("restart").await?;
        self.wait_active().await?;
        Ok(Outcome::Restarted {
            pid: self.main_pid().await,
        })
    }

    async fn status(&self) -> Result<StatusReport, DaemonError> {
        let out = self.systemctl("status", &["--no-pager"]).await?;

        // 0 = active, 3 = inactive/failed; anything else means the query failed.
        if out.code != 0 && out.code != 3 {
            return Err(DaemonError::Supervision {
                tool: format!("systemctl status {}", self.descriptor.name),
                code: out.code,
                message: out.stderr.trim().to_string(),
            });
        }

        let running = out.code == 0 && self.active_state().await? == "active";
        let pid = if running { self.main_pid().await } else { None };

        Ok(StatusReport {
            kind: SupervisionKind::Managed,
            running,
            pid,
            detail: out.stdout,
        })
    }

    async fn logs(&self) -> Result<Outcome, DaemonError> {
        let mut args = Vec::new();
        if self.descriptor.user_mode {
            args.push("--user");
        }
        args.extend_from_slice(&["-u", self.descriptor.name.as_str(), "-f", "-n", "50"]);

        let code = self.runner.attach("journalctl", &args).await?;
        if code != 0 {
            return Err(DaemonError::Supervision {
                tool: format!("journalctl -u {}", self.descriptor.name),
                code,
                message: "journal follow ended with an error".to_string(),
            });
        }
        Ok(Outcome::LogsClosed)
    }

    async fn enable(&self) -> Result<Outcome, DaemonError> {
        self.delegate("enable").await?;
        Ok(Outcome::Enabled)
    }

    async fn disable(&self) -> Result<Outcome, DaemonError> {
        self.delegate("disable").await?;
        Ok(Outcome::Disabled)
    }
}
