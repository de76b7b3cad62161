use hyperbot_core::config::{AppConfig, LoadOptions};
use hyperbot_db::{connect_with_settings, migrations};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CONFIG_DEPENDENT_CHECKS: &[&str] = &[
    "slack_token_readiness",
    "auth_secrets",
    "azure_openai_settings",
    "uipath_settings",
    "google_credentials",
    "database_connectivity",
];

pub fn run(json_output: bool, options: &LoadOptions) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_slack_tokens(&config));
            checks.push(check_auth_secrets(&config));
            checks.push(check_azure_openai(&config));
            checks.push(check_uipath(&config));
            checks.push(check_google_credentials(&config));
            checks.push(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.extend(CONFIG_DEPENDENT_CHECKS.iter().map(|name| {
                DoctorCheck::skipped(*name, "skipped because configuration did not load")
            }));
        }
    }

    // Skipped checks cover optional integrations and do not fail the report.
    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    if config.slack.signing_secret.expose_secret().trim().is_empty() {
        return DoctorCheck::fail(
            "slack_token_readiness",
            "slack.signing_secret is not set; interaction callbacks will be rejected",
        );
    }
    DoctorCheck::pass(
        "slack_token_readiness",
        "app and bot token formats validated; signing secret present",
    )
}

fn check_auth_secrets(config: &AppConfig) -> DoctorCheck {
    let missing: Vec<&str> = [
        ("auth.access_token_secret", config.auth.access_token_secret.expose_secret()),
        ("auth.refresh_token_secret", config.auth.refresh_token_secret.expose_secret()),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(key, _)| key)
    .collect();

    if missing.is_empty() {
        DoctorCheck::pass("auth_secrets", "token signing secrets present")
    } else {
        DoctorCheck::fail("auth_secrets", format!("missing {}", missing.join(", ")))
    }
}

fn check_azure_openai(config: &AppConfig) -> DoctorCheck {
    let azure = &config.azure_openai;
    let missing = missing_keys(&[
        ("azure_openai.endpoint", azure.endpoint.as_str()),
        ("azure_openai.api_key", azure.api_key.expose_secret()),
        ("azure_openai.assistant_id_detect_action", azure.assistant_id_detect_action.as_str()),
    ]);

    if missing.is_empty() {
        DoctorCheck::pass("azure_openai_settings", format!("endpoint `{}`", azure.endpoint))
    } else {
        DoctorCheck::fail("azure_openai_settings", format!("missing {}", missing.join(", ")))
    }
}

fn check_uipath(config: &AppConfig) -> DoctorCheck {
    let uipath = &config.uipath;
    let processes = &uipath.processes;
    let missing = missing_keys(&[
        ("uipath.host", uipath.host.as_str()),
        ("uipath.tenant", uipath.tenant.as_str()),
        ("uipath.api_key", uipath.api_key.expose_secret()),
        ("uipath.processes.greeting_new_employee", processes.greeting_new_employee.as_str()),
        ("uipath.processes.fill_buddy", processes.fill_buddy.as_str()),
        ("uipath.processes.create_leave_request", processes.create_leave_request.as_str()),
        (
            "uipath.processes.create_integrate_training",
            processes.create_integrate_training.as_str(),
        ),
        ("uipath.processes.pre_onboard_email", processes.pre_onboard_email.as_str()),
    ]);

    if missing.is_empty() {
        DoctorCheck::pass("uipath_settings", format!("orchestrator `{}`", uipath.host))
    } else {
        DoctorCheck::fail("uipath_settings", format!("missing {}", missing.join(", ")))
    }
}

fn check_google_credentials(config: &AppConfig) -> DoctorCheck {
    match &config.google.credentials_file {
        None => DoctorCheck::skipped(
            "google_credentials",
            "google.credentials_file is not set; sheets features are disabled",
        ),
        Some(path) if path.is_file() => {
            DoctorCheck::pass("google_credentials", format!("found `{}`", path.display()))
        }
        Some(path) => DoctorCheck::fail(
            "google_credentials",
            format!("credentials file `{}` does not exist", path.display()),
        ),
    }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;
        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| format!("failed to read migration state: {error}"))?;

        pool.close().await;
        Ok::<Vec<i64>, String>(pending)
    });

    match result {
        Ok(pending) if pending.is_empty() => DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`; schema up to date", config.database.url),
        ),
        Ok(pending) => DoctorCheck::pass(
            "database_connectivity",
            format!(
                "connected using `{}`; {} pending migration(s)",
                config.database.url,
                pending.len()
            ),
        ),
        Err(error) => DoctorCheck::fail("database_connectivity", error),
    }
}

fn missing_keys<'a>(fields: &[(&'a str, &str)]) -> Vec<&'a str> {
    fields.iter().filter(|(_, value)| value.trim().is_empty()).map(|(key, _)| *key).collect()
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
