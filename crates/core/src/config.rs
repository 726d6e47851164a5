use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rfm::aggregate::WalkInPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub segmentation: SegmentationConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SegmentationConfig {
    pub walk_in_policy: WalkInPolicy,
    pub walk_in_name: String,
    /// RFC 3339 instant to freeze "now" at. Parsed when a run starts.
    pub reference_time: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ReportConfig {
    pub date_format: String,
}

#[derive(Clone, Debug)]
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
    pub walk_in_policy: Option<WalkInPolicy>,
    pub walk_in_name: Option<String>,
    pub reference_time: Option<String>,
    pub date_format: Option<String>,
    pub log_level: Option<String>,
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
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig {
                walk_in_policy: WalkInPolicy::Merge,
                walk_in_name: "Walk-in Customer".to_string(),
                reference_time: None,
            },
            report: ReportConfig { date_format: "%b %-d, %Y".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for WalkInPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "exclude" => Ok(Self::Exclude),
            other => Err(ConfigError::Validation(format!(
                "unsupported walk-in policy `{other}` (expected merge|exclude)"
            ))),
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("storefront.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(segmentation) = patch.segmentation {
            if let Some(walk_in_policy) = segmentation.walk_in_policy {
                self.segmentation.walk_in_policy = walk_in_policy;
            }
            if let Some(walk_in_name) = segmentation.walk_in_name {
                self.segmentation.walk_in_name = walk_in_name;
            }
            if let Some(reference_time) = segmentation.reference_time {
                self.segmentation.reference_time = Some(reference_time);
            }
        }

        if let Some(report) = patch.report {
            if let Some(date_format) = report.date_format {
                self.report.date_format = date_format;
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
        if let Some(value) = read_env("STOREFRONT_SEGMENTATION_WALK_IN_POLICY") {
            self.segmentation.walk_in_policy = value.parse()?;
        }
        if let Some(value) = read_env("STOREFRONT_SEGMENTATION_WALK_IN_NAME") {
            self.segmentation.walk_in_name = value;
        }
        if let Some(value) = read_env("STOREFRONT_SEGMENTATION_REFERENCE_TIME") {
            self.segmentation.reference_time = Some(value);
        }

        if let Some(value) = read_env("STOREFRONT_REPORT_DATE_FORMAT") {
            self.report.date_format = value;
        }

        let log_level =
            read_env("STOREFRONT_LOGGING_LEVEL").or_else(|| read_env("STOREFRONT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STOREFRONT_LOGGING_FORMAT").or_else(|| read_env("STOREFRONT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(walk_in_policy) = overrides.walk_in_policy {
            self.segmentation.walk_in_policy = walk_in_policy;
        }
        if let Some(walk_in_name) = overrides.walk_in_name {
            self.segmentation.walk_in_name = walk_in_name;
        }
        if let Some(reference_time) = overrides.reference_time {
            self.segmentation.reference_time = Some(reference_time);
        }
        if let Some(date_format) = overrides.date_format {
            self.report.date_format = date_format;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_segmentation(&self.segmentation)?;
        validate_report(&self.report)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("storefront.toml"), PathBuf::from("config/storefront.toml")]
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

fn validate_segmentation(segmentation: &SegmentationConfig) -> Result<(), ConfigError> {
    if segmentation.walk_in_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "segmentation.walk_in_name must not be empty".to_string(),
        ));
    }

    if let Some(reference_time) = &segmentation.reference_time {
        if reference_time.trim().is_empty() {
            return Err(ConfigError::Validation(
                "segmentation.reference_time must be omitted or an RFC 3339 timestamp".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_report(report: &ReportConfig) -> Result<(), ConfigError> {
    if report.date_format.trim().is_empty() {
        return Err(ConfigError::Validation("report.date_format must not be empty".to_string()));
    }

    let invalid = StrftimeItems::new(&report.date_format).any(|item| matches!(item, Item::Error));
    if invalid {
        return Err(ConfigError::Validation(format!(
            "report.date_format `{}` is not a valid strftime pattern",
            report.date_format
        )));
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    segmentation: Option<SegmentationPatch>,
    report: Option<ReportPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SegmentationPatch {
    walk_in_policy: Option<WalkInPolicy>,
    walk_in_name: Option<String>,
    reference_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportPatch {
    date_format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
