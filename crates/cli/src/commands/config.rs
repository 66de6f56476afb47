use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use contractflow_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use toml::Value;

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key_path: "approval.enforce_sequential_order",
            env_keys: &["CONTRACTFLOW_APPROVAL_ENFORCE_SEQUENTIAL_ORDER"],
            value: config.approval.enforce_sequential_order.to_string(),
        },
        Field {
            key_path: "analytics.expiring_soon_days",
            env_keys: &["CONTRACTFLOW_ANALYTICS_EXPIRING_SOON_DAYS"],
            value: config.analytics.expiring_soon_days.to_string(),
        },
        Field {
            key_path: "intake.default_currency",
            env_keys: &["CONTRACTFLOW_INTAKE_DEFAULT_CURRENCY"],
            value: config.intake.default_currency.clone(),
        },
        Field {
            key_path: "intake.default_priority",
            env_keys: &["CONTRACTFLOW_INTAKE_DEFAULT_PRIORITY"],
            value: config.intake.default_priority.as_str().to_string(),
        },
        Field {
            key_path: "intake.expiry_reminder_days",
            env_keys: &["CONTRACTFLOW_INTAKE_EXPIRY_REMINDER_DAYS"],
            value: config.intake.expiry_reminder_days.to_string(),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["CONTRACTFLOW_LOGGING_LEVEL", "CONTRACTFLOW_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["CONTRACTFLOW_LOGGING_FORMAT", "CONTRACTFLOW_LOG_FORMAT"],
            value: config.logging.format.as_str().to_string(),
        },
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from(DEFAULT_CONFIG_FILE);
    if root.exists() {
        return Some(root);
    }

    let nested = Path::new("config").join(DEFAULT_CONFIG_FILE);
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
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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
