//! `kvctl logs`

use super::output;
use crate::config::Settings;
use crate::error::{SupervisorError, SupervisorResult};
use crate::utils::tail;
use std::io;
use std::process::ExitCode;

pub async fn handle_logs(settings: &Settings, lines: usize, follow: bool) -> SupervisorResult<ExitCode> {
    let path = settings.log_file.as_path();

    let offset = match tail::last_lines(path, lines) {
        Ok((tail_lines, len)) => {
            for line in tail_lines {
                println!("{line}");
            }
            len
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            output::info(format!("No log file yet at {}", path.display()));
            0
        }
        Err(err) => {
            return Err(SupervisorError::process(
                format!("cannot read {}", path.display()),
                err,
            ))
        }
    };

    if follow {
        let mut stdout = tokio::io::stdout();
        tokio::select! {
            result = tail::follow(path, offset, &mut stdout) => {
                result.map_err(|err| SupervisorError::process(format!("cannot follow {}", path.display()), err))?;
            }
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    Ok(ExitCode::SUCCESS)
}
