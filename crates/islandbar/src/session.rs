//! Commands that act on the desktop session rather than on bar state: switching workspaces, the
//! power menu and the launcher buttons.
//!
//! All of them start an external program and return without waiting for it.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{
    config::BarConfig,
    probe::{ProbeError, SystemProbe},
    workspaces::WORKSPACE_COUNT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    Shutdown,
    Reboot,
    Suspend,
    Lock,
    Logout,
}

impl PowerAction {
    /// In the order the power menu lists them.
    pub const ALL: [PowerAction; 5] =
        [PowerAction::Shutdown, PowerAction::Reboot, PowerAction::Suspend, PowerAction::Lock, PowerAction::Logout];

    pub fn label(self) -> &'static str {
        match self {
            PowerAction::Shutdown => "Shutdown",
            PowerAction::Reboot => "Reboot",
            PowerAction::Suspend => "Suspend",
            PowerAction::Lock => "Lock",
            PowerAction::Logout => "Logout",
        }
    }

    /// Nerd font glyph.
    pub fn icon(self) -> &'static str {
        match self {
            PowerAction::Shutdown => "\u{f011}",
            PowerAction::Reboot => "\u{f0709}",
            PowerAction::Suspend => "\u{f0904}",
            PowerAction::Lock => "\u{f023}",
            PowerAction::Logout => "\u{f0343}",
        }
    }

    pub fn command(self) -> &'static [&'static str] {
        match self {
            PowerAction::Shutdown => &["systemctl", "poweroff"],
            PowerAction::Reboot => &["systemctl", "reboot"],
            PowerAction::Suspend => &["systemctl", "suspend"],
            PowerAction::Lock => &["hyprlock"],
            PowerAction::Logout => &["hyprctl", "dispatch", "exit"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PowerMenuEntry {
    pub action: PowerAction,
    pub label: &'static str,
    pub icon: &'static str,
}

pub fn power_menu() -> Vec<PowerMenuEntry> {
    PowerAction::ALL.into_iter().map(|action| PowerMenuEntry { action, label: action.label(), icon: action.icon() }).collect()
}

/// Buttons of the bar that open another program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Launcher {
    /// The application launcher
    Apps,
    /// Audio settings
    Audio,
    /// Bluetooth settings
    Bluetooth,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Workspace {0} is not one of the numbered workspaces 1 to 10")]
    NoSuchWorkspace(u8),
    #[error("No command configured for the {0:?} launcher")]
    NoLauncherCommand(Launcher),
    #[error(transparent)]
    Spawn(#[from] ProbeError),
}

pub struct SessionCommands {
    probe: Rc<dyn SystemProbe>,
    app_launcher: Vec<String>,
    audio_settings: Vec<String>,
    bluetooth_settings: Vec<String>,
}

impl SessionCommands {
    pub fn new(probe: Rc<dyn SystemProbe>, config: &BarConfig) -> Self {
        SessionCommands {
            probe,
            app_launcher: config.app_launcher.clone(),
            audio_settings: config.audio_settings.clone(),
            bluetooth_settings: config.bluetooth_settings.clone(),
        }
    }

    pub fn switch_workspace(&self, id: u8) -> Result<(), SessionError> {
        if !(1..=WORKSPACE_COUNT).contains(&id) {
            return Err(SessionError::NoSuchWorkspace(id));
        }
        let id = id.to_string();
        self.spawn(&["hyprctl", "dispatch", "workspace", id.as_str()])
    }

    pub fn power(&self, action: PowerAction) -> Result<(), SessionError> {
        log::info!("Running power action {:?}", action);
        self.spawn(action.command())
    }

    pub fn launch(&self, launcher: Launcher) -> Result<(), SessionError> {
        let command = match launcher {
            Launcher::Apps => &self.app_launcher,
            Launcher::Audio => &self.audio_settings,
            Launcher::Bluetooth => &self.bluetooth_settings,
        };
        if command.is_empty() {
            return Err(SessionError::NoLauncherCommand(launcher));
        }
        let command: Vec<&str> = command.iter().map(String::as_str).collect();
        self.spawn(&command)
    }

    fn spawn(&self, command: &[&str]) -> Result<(), SessionError> {
        let Some((program, args)) = command.split_first() else { return Ok(()) };
        log::debug!("Starting {} {:?}", program, args);
        Ok(self.probe.spawn_detached(program, args)?)
    }
}
