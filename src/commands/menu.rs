//! Interactive menu shown when kvctl runs without a subcommand.

use super::parser::Commands;
use crate::config::DEFAULT_LOG_TAIL_LINES;
use crate::error::{SupervisorError, SupervisorResult};
use dialoguer::Select;
use std::io::IsTerminal;

const ENTRIES: [&str; 8] = [
    "Start service",
    "Start in foreground",
    "Stop service",
    "Restart service",
    "Show status",
    "Show logs",
    "Show URLs",
    "Quit",
];

/// Ask the operator what to do. `None` means quit.
pub fn choose() -> SupervisorResult<Option<Commands>> {
    if !std::io::stdin().is_terminal() {
        return Err(SupervisorError::Validation {
            message: "no subcommand given and no terminal for the interactive menu".to_string(),
        });
    }

    let selection = Select::new()
        .with_prompt("KoalaqVision")
        .items(&ENTRIES)
        .default(0)
        .interact()
        .map_err(|err| SupervisorError::Validation {
            message: format!("menu prompt failed: {err}"),
        })?;

    Ok(command_for(selection))
}

fn command_for(selection: usize) -> Option<Commands> {
    let command = match selection {
        0 => Commands::Start {
            yes: false,
            strict_deps: false,
        },
        1 => Commands::Foreground { strict_deps: false },
        2 => Commands::Stop { keep_deps: false },
        3 => Commands::Restart,
        4 => Commands::Status { json: false },
        5 => Commands::Logs {
            lines: DEFAULT_LOG_TAIL_LINES,
            follow: false,
        },
        6 => Commands::Urls,
        _ => return None,
    };
    Some(command)
}
