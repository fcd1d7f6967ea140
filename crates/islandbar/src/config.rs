use std::{path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CLOCK_FORMAT: &str = "%a %-d %b %-I:%M%p";

/// Contents of `islandbar.toml`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarConfig {
    /// How often CPU, memory, disk and temperature are sampled.
    pub stats_interval_ms: u64,
    pub clock_interval_ms: u64,
    /// strftime-style format of the clock, see [`chrono::format::strftime`].
    pub clock_format: String,
    /// `temp` file of the thermal zone to report. If it doesn't exist, a CPU zone is looked for.
    pub thermal_zone: PathBuf,
    /// Preferred size of tray icons sent as pixmaps.
    pub tray_icon_size: i32,
    /// Upper bound for helper programs such as `busctl`.
    pub probe_timeout_ms: u64,
    /// Command lines of the launcher buttons, as program followed by its arguments. An empty list
    /// disables the button.
    pub app_launcher: Vec<String>,
    pub audio_settings: Vec<String>,
    pub bluetooth_settings: Vec<String>,
}

impl Default for BarConfig {
    fn default() -> Self {
        BarConfig {
            stats_interval_ms: 2000,
            clock_interval_ms: 1000,
            clock_format: DEFAULT_CLOCK_FORMAT.to_owned(),
            thermal_zone: PathBuf::from("/sys/class/thermal/thermal_zone3/temp"),
            tray_icon_size: 16,
            probe_timeout_ms: 1000,
            app_launcher: vec!["rofi".to_owned(), "-show".to_owned(), "drun".to_owned()],
            audio_settings: vec!["pwvucontrol".to_owned()],
            bluetooth_settings: vec!["overskride".to_owned()],
        }
    }
}

impl BarConfig {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms.max(1))
    }

    pub fn clock_interval(&self) -> Duration {
        Duration::from_millis(self.clock_interval_ms.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }
}

/// Read the config file. A missing file is not an error and yields the default configuration.
pub fn read_from_file(path: &Path) -> Result<BarConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No config file at {}, using defaults", path.display());
            return Ok(BarConfig::default());
        }
        Err(err) => return Err(err).with_context(|| format!("Failed to read config file {}", path.display())),
    };
    parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse(content: &str) -> Result<BarConfig> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse("").unwrap(), BarConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = parse("stats_interval_ms = 500\nclock_format = \"%H:%M\"\n").unwrap();
        assert_eq!(config, BarConfig { stats_interval_ms: 500, clock_format: "%H:%M".to_owned(), ..BarConfig::default() });
    }

    #[test]
    fn test_launcher_commands() {
        let config = parse("app_launcher = [\"wofi\", \"--show\", \"drun\"]\nbluetooth_settings = []\n").unwrap();
        assert_eq!(config.app_launcher, vec!["wofi", "--show", "drun"]);
        assert!(config.bluetooth_settings.is_empty());
        assert_eq!(config.audio_settings, vec!["pwvucontrol"]);
    }

    #[test]
    fn test_invalid_config() {
        assert!(parse("stats_interval_ms = \"often\"").is_err());
        assert!(parse("no_such_option = 1").is_err());
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let config = BarConfig { stats_interval_ms: 0, clock_interval_ms: 0, ..BarConfig::default() };
        assert_eq!(config.stats_interval(), Duration::from_millis(1));
        assert_eq!(config.clock_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = read_from_file(Path::new("/nonexistent/islandbar/islandbar.toml")).unwrap();
        assert_eq!(config, BarConfig::default());
    }
}
