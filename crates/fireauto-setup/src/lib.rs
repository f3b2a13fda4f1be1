//! # fireauto Setup
//!
//! One-time installation and removal of the 24Fire automation service.
//!
//! The [`Installer`] walks a fixed sequence of stages: host detection,
//! package provisioning, import verification, artifact creation, service
//! registration, controller installation, optional interactive
//! configuration and finally enabling and starting the service. Every
//! artifact step reuses what already exists, so the installer can be
//! re-run safely.
//!
//! The [`Uninstaller`] reverses it. Each removal treats an absent target
//! as success and failures never stop later steps, so a partial install
//! can always be cleaned up by running it again.

pub mod artifacts;
pub mod error;
pub mod installer;
pub mod prompt;
pub mod provision;
pub mod uninstaller;

pub use artifacts::{ArtifactStatus, InstalledArtifactSet};
pub use error::SetupError;
pub use installer::{InstallOptions, InstallReport, InstallStage, Installer};
pub use prompt::{NonInteractivePrompter, Prompter, TerminalPrompter};
pub use provision::{PackageManager, Provisioner};
pub use uninstaller::{UninstallOptions, UninstallReport, Uninstaller};
