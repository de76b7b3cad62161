use hyperbot_core::config::LoadOptions;
use hyperbot_db::{connect_with_settings, migrations};
use secrecy::ExposeSecret;

use crate::commands::{block_on, load_config, CommandResult};

/// Checks everything `hyperbot-server` needs before it can boot.
pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("start", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    if config.auth.access_token_secret.expose_secret().is_empty()
        || config.auth.refresh_token_secret.expose_secret().is_empty()
    {
        return CommandResult::failure(
            "start",
            "auth_config",
            "auth.access_token_secret and auth.refresh_token_secret must be set",
            2,
        );
    }

    let outcome = block_on("start", async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        pool.close().await;
        Ok::<Vec<i64>, (&'static str, String, u8)>(pending)
    });

    match outcome {
        Ok(Ok(pending)) if pending.is_empty() => CommandResult::success(
            "start",
            format!("preflight passed; server will listen on {}", config.server_address()),
        ),
        Ok(Ok(pending)) => CommandResult::success(
            "start",
            format!(
                "preflight passed; {} migration(s) will be applied on boot; server will listen on {}",
                pending.len(),
                config.server_address()
            ),
        ),
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
        Err(failure) => failure,
    }
}
