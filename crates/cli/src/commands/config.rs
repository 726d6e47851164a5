use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use storefront_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "segmentation.walk_in_policy",
        &format!("{:?}", config.segmentation.walk_in_policy),
        source("segmentation.walk_in_policy", &["STOREFRONT_SEGMENTATION_WALK_IN_POLICY"]),
    ));
    lines.push(render_line(
        "segmentation.walk_in_name",
        &config.segmentation.walk_in_name,
        source("segmentation.walk_in_name", &["STOREFRONT_SEGMENTATION_WALK_IN_NAME"]),
    ));
    lines.push(render_line(
        "segmentation.reference_time",
        config.segmentation.reference_time.as_deref().unwrap_or("<unset: wall clock>"),
        source("segmentation.reference_time", &["STOREFRONT_SEGMENTATION_REFERENCE_TIME"]),
    ));

    lines.push(render_line(
        "report.date_format",
        &config.report.date_format,
        source("report.date_format", &["STOREFRONT_REPORT_DATE_FORMAT"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["STOREFRONT_LOGGING_LEVEL", "STOREFRONT_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["STOREFRONT_LOGGING_FORMAT", "STOREFRONT_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("storefront.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/storefront.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env_value_is_set(key)) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

/// Blank values are ignored by the config loader, so they are not a source either.
fn env_value_is_set(key: &str) -> bool {
    env::var(key).is_ok_and(|value| !value.trim().is_empty())
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::contains_path;

    #[test]
    fn resolves_nested_key_paths() {
        let doc: Value = "[report]\ndate_format = \"%Y\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "report.date_format"));
        assert!(!contains_path(&doc, "report.walk_in_name"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
