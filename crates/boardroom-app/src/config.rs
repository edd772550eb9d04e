use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use boardroom_core::Settings;
use boardroom_core::recurrence::MAX_CYCLES;
use serde::Deserialize;

const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration loaded from `<data-dir>/config.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    /// `[recurrence]` section.
    #[serde(default)]
    pub recurrence: RecurrenceConfig,
    /// `[defaults]` section.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl ProjectConfig {
    /// Load configuration from the data directory; a missing file yields defaults.
    pub fn from_data_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
        let config_path = data_dir.as_ref().join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.recurrence.ensure_cycles_in_range()?;
        self.defaults.ensure_timezone_present()
    }
}

/// How far repeating tasks are expanded when created.
#[derive(Debug, Clone, Deserialize)]
pub struct RecurrenceConfig {
    #[serde(default = "RecurrenceConfig::builtin_cycles")]
    default_cycles: u32,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            default_cycles: Self::builtin_cycles(),
        }
    }
}

impl RecurrenceConfig {
    const fn builtin_cycles() -> u32 {
        6
    }

    /// Number of future instances generated for a repeating task.
    pub const fn default_cycles(&self) -> u32 {
        self.default_cycles
    }

    fn ensure_cycles_in_range(&self) -> Result<()> {
        if !(1..=MAX_CYCLES).contains(&self.default_cycles) {
            bail!(
                "recurrence.default_cycles must be between 1 and {MAX_CYCLES}, got {}",
                self.default_cycles
            );
        }
        Ok(())
    }
}

/// Settings used the first time the application runs.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultsConfig {
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    decision_sla_days: Option<u32>,
    #[serde(default)]
    default_meeting_minutes: Option<u32>,
    #[serde(default)]
    default_decision_owner: Option<String>,
    #[serde(default)]
    default_compliance_owner: Option<String>,
    #[serde(default)]
    include_attendees: Option<bool>,
}

impl DefaultsConfig {
    /// Built-in settings overridden by whatever the config file names.
    pub fn seed_settings(&self) -> Settings {
        let builtin = Settings::default();
        Settings {
            timezone: self.timezone.clone().unwrap_or(builtin.timezone),
            decision_sla_days: self.decision_sla_days.unwrap_or(builtin.decision_sla_days),
            default_meeting_minutes: self
                .default_meeting_minutes
                .unwrap_or(builtin.default_meeting_minutes),
            default_decision_owner: self
                .default_decision_owner
                .clone()
                .unwrap_or(builtin.default_decision_owner),
            default_compliance_owner: self
                .default_compliance_owner
                .clone()
                .unwrap_or(builtin.default_compliance_owner),
            include_attendees: self.include_attendees.unwrap_or(builtin.include_attendees),
        }
    }

    fn ensure_timezone_present(&self) -> Result<()> {
        if self.timezone.as_deref().is_some_and(|tz| tz.trim().is_empty()) {
            bail!("defaults.timezone must not be empty");
        }
        Ok(())
    }
}
