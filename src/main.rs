use kvctl::commands::{dispatch, print_config_fallback, print_error, Cli};
use kvctl::config::Settings;
use kvctl::utils::logger::{init_logger, level_for_verbosity};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    let verbose = cli.verbose;
    let command = cli.into_command();
    let loaded = Settings::load();

    // 初始化日志系统
    let log_file = loaded.as_ref().ok().and_then(|s| s.supervisor_log.clone());
    if let Err(err) = init_logger(level_for_verbosity(verbose), log_file) {
        eprintln!("Failed to initialize logging: {err}");
    }

    let settings = match loaded {
        Ok(settings) => settings,
        Err(err) if command.tolerates_invalid_config() => {
            tracing::debug!(error = ?err, "falling back to default settings");
            print_config_fallback(&err);
            Settings::default()
        }
        Err(err) => {
            print_error(&err);
            return ExitCode::from(err.exit_code());
        }
    };

    match dispatch(command, settings).await {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            print_error(&err);
            ExitCode::from(err.exit_code())
        }
    }
}
