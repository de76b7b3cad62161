use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hyperbot_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{load_config, CommandResult};

struct ConfigLine {
    key: &'static str,
    value: String,
    env_key: &'static str,
}

impl ConfigLine {
    fn new(key: &'static str, value: impl Into<String>, env_key: &'static str) -> Self {
        Self { key, value: value.into(), env_key }
    }
}

pub fn run(options: &LoadOptions) -> CommandResult {
    match load_config("config", options) {
        Ok(config) => CommandResult { exit_code: 0, output: render(&config, options) },
        Err(failure) => failure,
    }
}

fn render(config: &AppConfig, options: &LoadOptions) -> String {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for line in effective_lines(config) {
        let source = field_source(
            line.key,
            line.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", line.key, line.value));
    }

    lines.join("\n")
}

fn effective_lines(config: &AppConfig) -> Vec<ConfigLine> {
    let processes = &config.uipath.processes;
    vec![
        ConfigLine::new("server.host", &config.server.host, "HYPERBOT_SERVER_HOST"),
        ConfigLine::new("server.port", config.server.port.to_string(), "HYPERBOT_SERVER_PORT"),
        ConfigLine::new("database.url", &config.database.url, "HYPERBOT_DATABASE_URL"),
        ConfigLine::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            "HYPERBOT_DATABASE_MAX_CONNECTIONS",
        ),
        ConfigLine::new(
            "auth.access_token_secret",
            redact_secret(&config.auth.access_token_secret),
            "HYPERBOT_AUTH_ACCESS_TOKEN_SECRET",
        ),
        ConfigLine::new(
            "auth.refresh_token_secret",
            redact_secret(&config.auth.refresh_token_secret),
            "HYPERBOT_AUTH_REFRESH_TOKEN_SECRET",
        ),
        ConfigLine::new(
            "slack.app_token",
            redact_token(config.slack.app_token.expose_secret()),
            "HYPERBOT_SLACK_APP_TOKEN",
        ),
        ConfigLine::new(
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            "HYPERBOT_SLACK_BOT_TOKEN",
        ),
        ConfigLine::new(
            "slack.signing_secret",
            redact_secret(&config.slack.signing_secret),
            "HYPERBOT_SLACK_SIGNING_SECRET",
        ),
        ConfigLine::new(
            "slack.default_channel",
            &config.slack.default_channel,
            "HYPERBOT_SLACK_DEFAULT_CHANNEL",
        ),
        ConfigLine::new(
            "azure_openai.endpoint",
            or_unset(&config.azure_openai.endpoint),
            "HYPERBOT_AZURE_OPENAI_ENDPOINT",
        ),
        ConfigLine::new(
            "azure_openai.api_key",
            redact_secret(&config.azure_openai.api_key),
            "HYPERBOT_AZURE_OPENAI_API_KEY",
        ),
        ConfigLine::new(
            "azure_openai.assistant_id_detect_action",
            or_unset(&config.azure_openai.assistant_id_detect_action),
            "HYPERBOT_AZURE_OPENAI_ASSISTANT_ID_DETECT_ACTION",
        ),
        ConfigLine::new(
            "google.credentials_file",
            config
                .google
                .credentials_file
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<unset>".to_string()),
            "HYPERBOT_GOOGLE_CREDENTIALS_FILE",
        ),
        ConfigLine::new(
            "google.shared_drive_folder_id",
            or_unset(&config.google.shared_drive_folder_id),
            "HYPERBOT_GOOGLE_SHARED_DRIVE_FOLDER_ID",
        ),
        ConfigLine::new("uipath.host", or_unset(&config.uipath.host), "HYPERBOT_UIPATH_HOST"),
        ConfigLine::new(
            "uipath.api_key",
            redact_secret(&config.uipath.api_key),
            "HYPERBOT_UIPATH_API_KEY",
        ),
        ConfigLine::new(
            "uipath.processes.greeting_new_employee",
            or_unset(&processes.greeting_new_employee),
            "HYPERBOT_UIPATH_PROCESS_GREETING_NEW_EMPLOYEE",
        ),
        ConfigLine::new(
            "uipath.processes.fill_buddy",
            or_unset(&processes.fill_buddy),
            "HYPERBOT_UIPATH_PROCESS_FILL_BUDDY",
        ),
        ConfigLine::new(
            "uipath.processes.create_leave_request",
            or_unset(&processes.create_leave_request),
            "HYPERBOT_UIPATH_PROCESS_CREATE_LEAVE_REQUEST",
        ),
        ConfigLine::new(
            "uipath.processes.create_integrate_training",
            or_unset(&processes.create_integrate_training),
            "HYPERBOT_UIPATH_PROCESS_CREATE_INTEGRATE_TRAINING",
        ),
        ConfigLine::new(
            "uipath.processes.pre_onboard_email",
            or_unset(&processes.pre_onboard_email),
            "HYPERBOT_UIPATH_PROCESS_PRE_ONBOARD_EMAIL",
        ),
        ConfigLine::new(
            "worker.queue_capacity",
            config.worker.queue_capacity.to_string(),
            "HYPERBOT_WORKER_QUEUE_CAPACITY",
        ),
        ConfigLine::new("logging.level", &config.logging.level, "HYPERBOT_LOGGING_LEVEL"),
        ConfigLine::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            "HYPERBOT_LOGGING_FORMAT",
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    [PathBuf::from("hyperbot.toml"), PathBuf::from("config/hyperbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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

fn or_unset(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}

fn redact_secret(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<unset>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

/// Keeps the Slack token kind (`xapp`, `xoxb`) visible and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
