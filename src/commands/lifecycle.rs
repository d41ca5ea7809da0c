//! start / fg / stop / restart / status / urls handlers

use super::output;
use crate::config::Settings;
use crate::error::{SupervisorError, SupervisorResult};
use crate::status::ServiceUrls;
use crate::supervisor::Supervisor;
use dialoguer::Confirm;
use serde_json::json;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::warn;

pub async fn handle_start(
    mut settings: Settings,
    yes: bool,
    strict_deps: bool,
) -> SupervisorResult<ExitCode> {
    settings.require_dependency |= strict_deps;
    let supervisor = Supervisor::from_settings(settings)?;
    output::info("Starting KoalaqVision...");

    let report = match supervisor.start().await {
        Ok(report) => report,
        Err(SupervisorError::RunningConflict { pid }) => {
            if !(yes || confirm_restart(pid)?) {
                return Err(SupervisorError::RunningConflict { pid });
            }
            let stopped = supervisor.stop().await?;
            output::stop_report(&stopped, supervisor.settings().api_port);
            supervisor.start().await?
        }
        Err(err) => return Err(err),
    };

    let urls = ServiceUrls::discover(supervisor.settings());
    output::start_report(&report, supervisor.settings(), &urls);
    Ok(ExitCode::SUCCESS)
}

fn confirm_restart(pid: u32) -> SupervisorResult<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(false);
    }
    output::warn(format!("KoalaqVision is already running (PID {pid})"));
    Confirm::new()
        .with_prompt("Restart it?")
        .default(false)
        .interact()
        .map_err(|err| SupervisorError::Validation {
            message: format!("confirmation prompt failed: {err}"),
        })
}

pub async fn handle_foreground(mut settings: Settings, strict_deps: bool) -> SupervisorResult<ExitCode> {
    settings.require_dependency |= strict_deps;
    let supervisor = Supervisor::from_settings(settings)?;
    output::info("Starting KoalaqVision in the foreground (Ctrl-C to stop)...");

    let urls = ServiceUrls::discover(supervisor.settings());
    output::urls_block(&urls);
    let code = supervisor.start_foreground().await?;

    if code == 0 {
        output::ok("Service exited");
    } else {
        output::warn(format!("Service exited with code {code}"));
    }
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

pub async fn handle_stop(settings: Settings, keep_deps: bool) -> SupervisorResult<ExitCode> {
    let supervisor = Supervisor::from_settings(settings)?;
    output::info("Stopping KoalaqVision...");

    let report = supervisor.stop().await?;
    output::stop_report(&report, supervisor.settings().api_port);

    if !keep_deps {
        let outcome = supervisor.dependency().stop().await;
        output::dependency_stop(&outcome);
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn handle_restart(settings: Settings) -> SupervisorResult<ExitCode> {
    let supervisor = Supervisor::from_settings(settings)?;
    output::info("Restarting KoalaqVision...");

    // each phase is reported before the next one can fail
    let stopped = supervisor.stop().await?;
    output::stop_report(&stopped, supervisor.settings().api_port);
    let started = supervisor.start().await?;
    let urls = ServiceUrls::discover(supervisor.settings());
    output::start_report(&started, supervisor.settings(), &urls);
    Ok(ExitCode::SUCCESS)
}

/// Always succeeds once settings are loaded; the snapshot itself carries the verdict.
pub async fn handle_status(settings: Settings, as_json: bool) -> SupervisorResult<ExitCode> {
    let supervisor = Supervisor::from_settings(settings)?;
    let snapshot = supervisor.status().await;
    let urls = ServiceUrls::discover(supervisor.settings());

    if as_json {
        let payload = json!({ "status": snapshot, "urls": urls });
        match serde_json::to_string_pretty(&payload) {
            Ok(text) => println!("{text}"),
            Err(err) => warn!(error = %err, "cannot serialize status"),
        }
    } else {
        output::status(&snapshot, &urls);
    }
    Ok(ExitCode::SUCCESS)
}

pub fn handle_urls(settings: &Settings) -> ExitCode {
    output::urls_block(&ServiceUrls::discover(settings));
    ExitCode::SUCCESS
}
