use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::AnalyticsOptions;
use crate::domain::contract::Priority;
use crate::flows::states::ApprovalPolicy;
use crate::intake::IntakeDefaults;

pub const DEFAULT_CONFIG_FILE: &str = "contractflow.toml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub approval: ApprovalConfig,
    pub analytics: AnalyticsConfig,
    pub intake: IntakeConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalConfig {
    pub enforce_sequential_order: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalyticsConfig {
    pub expiring_soon_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntakeConfig {
    pub default_currency: String,
    pub default_priority: Priority,
    pub expiry_reminder_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub enforce_sequential_order: Option<bool>,
    pub expiring_soon_days: Option<u32>,
    pub default_currency: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            approval: ApprovalConfig { enforce_sequential_order: true },
            analytics: AnalyticsConfig { expiring_soon_days: 30 },
            intake: IntakeConfig {
                default_currency: "VND".to_string(),
                default_priority: Priority::Medium,
                expiry_reminder_days: 14,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy { enforce_sequential_order: self.approval.enforce_sequential_order }
    }

    pub fn intake_defaults(&self) -> IntakeDefaults {
        IntakeDefaults {
            currency: self.intake.default_currency.clone(),
            priority: self.intake.default_priority,
        }
    }

    pub fn analytics_options(&self) -> AnalyticsOptions {
        AnalyticsOptions { expiring_soon_days: self.analytics.expiring_soon_days }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(approval) = patch.approval {
            if let Some(enforce_sequential_order) = approval.enforce_sequential_order {
                self.approval.enforce_sequential_order = enforce_sequential_order;
            }
        }

        if let Some(analytics) = patch.analytics {
            if let Some(expiring_soon_days) = analytics.expiring_soon_days {
                self.analytics.expiring_soon_days = expiring_soon_days;
            }
        }

        if let Some(intake) = patch.intake {
            if let Some(default_currency) = intake.default_currency {
                self.intake.default_currency = default_currency;
            }
            if let Some(default_priority) = intake.default_priority {
                self.intake.default_priority = default_priority;
            }
            if let Some(expiry_reminder_days) = intake.expiry_reminder_days {
                self.intake.expiry_reminder_days = expiry_reminder_days;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CONTRACTFLOW_APPROVAL_ENFORCE_SEQUENTIAL_ORDER") {
            self.approval.enforce_sequential_order =
                parse_bool("CONTRACTFLOW_APPROVAL_ENFORCE_SEQUENTIAL_ORDER", &value)?;
        }

        if let Some(value) = read_env("CONTRACTFLOW_ANALYTICS_EXPIRING_SOON_DAYS") {
            self.analytics.expiring_soon_days =
                parse_u32("CONTRACTFLOW_ANALYTICS_EXPIRING_SOON_DAYS", &value)?;
        }

        if let Some(value) = read_env("CONTRACTFLOW_INTAKE_DEFAULT_CURRENCY") {
            self.intake.default_currency = value;
        }
        if let Some(value) = read_env("CONTRACTFLOW_INTAKE_DEFAULT_PRIORITY") {
            self.intake.default_priority = value.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "CONTRACTFLOW_INTAKE_DEFAULT_PRIORITY".to_string(),
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = read_env("CONTRACTFLOW_INTAKE_EXPIRY_REMINDER_DAYS") {
            self.intake.expiry_reminder_days =
                parse_u32("CONTRACTFLOW_INTAKE_EXPIRY_REMINDER_DAYS", &value)?;
        }

        let log_level = read_env("CONTRACTFLOW_LOGGING_LEVEL")
            .or_else(|| read_env("CONTRACTFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("CONTRACTFLOW_LOGGING_FORMAT")
            .or_else(|| read_env("CONTRACTFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(enforce_sequential_order) = overrides.enforce_sequential_order {
            self.approval.enforce_sequential_order = enforce_sequential_order;
        }
        if let Some(expiring_soon_days) = overrides.expiring_soon_days {
            self.analytics.expiring_soon_days = expiring_soon_days;
        }
        if let Some(default_currency) = overrides.default_currency {
            self.intake.default_currency = default_currency;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_analytics(&self.analytics)?;
        validate_intake(&self.intake)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_analytics(analytics: &AnalyticsConfig) -> Result<(), ConfigError> {
    if analytics.expiring_soon_days == 0 || analytics.expiring_soon_days > 366 {
        return Err(ConfigError::Validation(
            "analytics.expiring_soon_days must be in range 1..=366".to_string(),
        ));
    }
    Ok(())
}

fn validate_intake(intake: &IntakeConfig) -> Result<(), ConfigError> {
    let currency = intake.default_currency.trim();
    let iso_like = currency.len() == 3 && currency.chars().all(|ch| ch.is_ascii_uppercase());
    if !iso_like {
        return Err(ConfigError::Validation(format!(
            "intake.default_currency must be a three-letter uppercase code (got `{currency}`)"
        )));
    }

    if intake.expiry_reminder_days == 0 {
        return Err(ConfigError::Validation(
            "intake.expiry_reminder_days must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    approval: Option<ApprovalPatch>,
    analytics: Option<AnalyticsPatch>,
    intake: Option<IntakePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalPatch {
    enforce_sequential_order: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsPatch {
    expiring_soon_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct IntakePatch {
    default_currency: Option<String>,
    default_priority: Option<Priority>,
    expiry_reminder_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
