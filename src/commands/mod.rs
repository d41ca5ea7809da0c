//! CLI 命令处理模块
//!
//! 处理所有命令行接口的解析和路由

pub mod lifecycle;
pub mod logs;
pub mod menu;
mod output;
pub mod parser;

pub use output::{config_fallback as print_config_fallback, error as print_error};
pub use parser::*;

use crate::config::Settings;
use crate::error::SupervisorResult;
use std::process::ExitCode;

/// Run one command to completion.
pub async fn dispatch(command: Commands, settings: Settings) -> SupervisorResult<ExitCode> {
    let command = match command {
        Commands::Menu => match menu::choose()? {
            Some(command) => command,
            None => return Ok(ExitCode::SUCCESS),
        },
        other => other,
    };

    match command {
        // choose() never returns the menu itself
        Commands::Menu => Ok(ExitCode::SUCCESS),
        Commands::Start { yes, strict_deps } => lifecycle::handle_start(settings, yes, strict_deps).await,
        Commands::Foreground { strict_deps } => lifecycle::handle_foreground(settings, strict_deps).await,
        Commands::Stop { keep_deps } => lifecycle::handle_stop(settings, keep_deps).await,
        Commands::Restart => lifecycle::handle_restart(settings).await,
        Commands::Status { json } => lifecycle::handle_status(settings, json).await,
        Commands::Logs { lines, follow } => logs::handle_logs(&settings, lines, follow).await,
        Commands::Urls => Ok(lifecycle::handle_urls(&settings)),
    }
}
