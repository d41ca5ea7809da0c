//! Operator-facing output: one line per step, status and banner rendering.

use crate::config::Settings;
use crate::core::models::{
    AppState, DependencyReadiness, DependencyState, DependencyStopOutcome, StatusSnapshot,
    TerminationOutcome,
};
use crate::error::SupervisorError;
use crate::status::ServiceUrls;
use crate::supervisor::{StartReport, StopReport};
use chrono::Utc;
use colored::Colorize;

pub fn ok(message: impl AsRef<str>) {
    println!("{} {}", "✅".green(), message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    println!("{}  {}", "⚠️".yellow(), message.as_ref());
}

pub fn info(message: impl AsRef<str>) {
    println!("{}  {}", "ℹ️".cyan(), message.as_ref());
}

pub fn error(err: &SupervisorError) {
    let facing = err.to_user_facing();
    eprintln!("{} {}: {}", "❌".red(), facing.title.red().bold(), facing.message);
    if let Some(hint) = facing.hint {
        eprintln!("   {} {}", "💡".yellow(), hint);
    }
}

/// Goes to stderr so `status --json` stays parseable.
pub fn config_fallback(err: &SupervisorError) {
    eprintln!(
        "{}  {}; using default settings",
        "⚠️".yellow(),
        err.user_message()
    );
}

pub fn dependency_readiness(readiness: &DependencyReadiness) {
    match readiness {
        DependencyReadiness::Ready => ok("Vector database is ready"),
        DependencyReadiness::DegradedTimeout { waited } => warn(format!(
            "Vector database not ready after {}s, continuing without it",
            waited.as_secs()
        )),
    }
}

pub fn start_report(report: &StartReport, settings: &Settings, urls: &ServiceUrls) {
    if let Some(pid) = report.stale_pid {
        info(format!("Removed stale PID record ({pid})"));
    }
    dependency_readiness(&report.dependency);
    ok(format!(
        "Service started (PID {})",
        report.process.pid.to_string().bold()
    ));
    if !report.port_bound {
        info(format!(
            "Port {} not bound yet; the service may still be loading models",
            report.process.listen_port
        ));
    }

    println!();
    println!("  {:<10} {}", "Mode:".dimmed(), settings.app_mode.cyan());
    println!(
        "  {:<10} {}:{}",
        "Listen:".dimmed(),
        settings.api_host,
        settings.api_port
    );
    println!(
        "  {:<10} {}",
        "SSL:".dimmed(),
        if settings.enable_ssl { "on" } else { "off" }
    );
    println!("  {:<10} {}", "Log:".dimmed(), report.log_file.display());
    println!();
    urls_block(urls);
}

pub fn stop_report(report: &StopReport, port: u16) {
    match report.stopped {
        Some(stopped) => match stopped.outcome {
            TerminationOutcome::Graceful => ok(format!("Service stopped (PID {})", stopped.pid)),
            TerminationOutcome::Forced => {
                warn(format!("Service killed after ignoring SIGTERM (PID {})", stopped.pid))
            }
            TerminationOutcome::Survived => warn(format!(
                "PID {} is still present after SIGKILL; check it manually",
                stopped.pid
            )),
        },
        None => {
            if let Some(pid) = report.stale_pid {
                info(format!("Removed stale PID record ({pid})"));
            }
        }
    }

    for holder in &report.reclaimed {
        warn(format!("Killed orphaned {holder} holding port {port}"));
    }

    if report.was_idle() {
        info("Service was not running");
    }
    if !report.port_free {
        warn(format!("Port {port} is still in use"));
    }
}

pub fn dependency_stop(outcome: &DependencyStopOutcome) {
    match outcome {
        DependencyStopOutcome::Graceful => ok("Vector database stopped"),
        DependencyStopOutcome::Forced => warn("Vector database container removed forcefully"),
        DependencyStopOutcome::Failed { message } => {
            warn(format!("Could not stop the vector database: {message}"))
        }
    }
}

pub fn status(snapshot: &StatusSnapshot, urls: &ServiceUrls) {
    println!("{}", "KoalaqVision status".bold());
    match snapshot.state {
        AppState::Running => {
            let pid = snapshot.pid.map(|p| p.to_string()).unwrap_or_default();
            println!("  {:<14} {} (PID {})", "Service:", "running".green(), pid);
            if let Some(started_at) = snapshot.started_at {
                println!(
                    "  {:<14} {}",
                    "Uptime:",
                    format_uptime(Utc::now().signed_duration_since(started_at))
                );
            }
        }
        AppState::Stopped => println!("  {:<14} {}", "Service:", "stopped".red()),
        AppState::PortConflict => {
            println!(
                "  {:<14} {} (port {} held by another process)",
                "Service:",
                "port conflict".yellow(),
                snapshot.listen_port
            );
            for holder in &snapshot.port_holders {
                println!("  {:<14} {}", "", holder);
            }
        }
    }
    if let Some(pid) = snapshot.stale_pid {
        println!("  {:<14} stale record for dead PID {}", "", pid);
    }

    let dependency = match snapshot.dependency_state {
        DependencyState::Running => "running".green(),
        DependencyState::Stopped => "stopped".red(),
    };
    println!("  {:<14} {}", "Vector DB:", dependency);
    println!("  {:<14} {}", "Port:", snapshot.listen_port);

    if snapshot.state == AppState::Running {
        println!();
        urls_block(urls);
    }
}

pub fn urls_block(urls: &ServiceUrls) {
    println!("  {:<10} {}", "Local:".dimmed(), urls.local.cyan());
    for url in &urls.network {
        println!("  {:<10} {}", "Network:".dimmed(), url.cyan());
    }
    println!("  {:<10} {}", "Web UI:".dimmed(), urls.ui.cyan());
    println!("  {:<10} {}", "API docs:".dimmed(), urls.docs.cyan());
}

pub fn format_uptime(uptime: chrono::Duration) -> String {
    let total = uptime.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
