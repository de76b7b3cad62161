use std::process::ExitCode;

fn main() -> ExitCode {
    hyperbot_cli::run()
}
