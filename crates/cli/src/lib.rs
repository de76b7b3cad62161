pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hyperbot_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "hyperbot",
    about = "Hyperbot operator CLI",
    long_about = "Check Hyperbot runtime readiness, apply migrations, and inspect effective configuration.",
    after_help = "Examples:\n  hyperbot doctor --json\n  hyperbot --config deploy/hyperbot.toml config\n  hyperbot migrate"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Read this config file instead of searching hyperbot.toml and config/hyperbot.toml"
    )]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config.clone(),
            ..LoadOptions::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(
        about = "Validate config, Slack tokens, integration settings, and DB connectivity"
    )]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Start => commands::start::run(&options),
        Command::Migrate => commands::migrate::run(&options),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(json, &options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
