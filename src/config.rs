//! Supervisor configuration
//!
//! Settings are read once per invocation from (lowest to highest priority):
//! an optional `kvctl.toml` in the working directory, the application's own
//! environment variables (`API_HOST`, `API_PORT`, ...), and `KVCTL_*` overrides.

use crate::error::{SupervisorError, SupervisorResult};
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const CONFIG_FILE_STEM: &str = "kvctl";
pub const ENV_PREFIX: &str = "KVCTL";
pub const DEFAULT_FILTER: &str = "warn,kvctl=info";

pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 10770;
pub const DEFAULT_APP_MODE: &str = "object";
pub const DEFAULT_APP_COMMAND: &str = "python -m app.main";
pub const DEFAULT_WEAVIATE_URL: &str = "http://localhost:8080";
pub const READINESS_PATH: &str = "/v1/.well-known/ready";

pub const DEFAULT_PID_FILE: &str = "logs/app.pid";
pub const DEFAULT_LOG_FILE: &str = "logs/app.log";
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";
pub const DEFAULT_DEPENDENCY_SERVICE: &str = "weaviate";
pub const DEFAULT_DEPENDENCY_CONTAINER: &str = "koalaqvision-weaviate";

pub const UI_PATH: &str = "/ui/";
pub const DOCS_PATH: &str = "/docs";

/// Number of log lines shown by `logs` when `-n` is not given
pub const DEFAULT_LOG_TAIL_LINES: usize = 50;

pub const APP_MODES: [&str; 2] = ["object", "face"];

/// Variables shared with the application itself
pub const APP_ENV_KEYS: [&str; 6] = [
    "API_HOST",
    "API_PORT",
    "APP_MODE",
    "ENABLE_SSL",
    "DEBUG",
    "WEAVIATE_URL",
];

/// Everything the supervisor needs to know about the application, its
/// dependency and its own timing policy.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_app_mode")]
    pub app_mode: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub enable_ssl: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub debug: bool,
    #[serde(default = "default_weaviate_url")]
    pub weaviate_url: String,

    /// Application entry point.
    ///
    /// A plain string is split on whitespace and cannot quote arguments
    /// (`KVCTL_APP_COMMAND` is always a plain string). In `kvctl.toml` an array
    /// such as `["sh", "-c", "exec python -m app.main"]` is passed verbatim.
    #[serde(default = "default_app_command")]
    pub app_command: CommandLine,
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,
    #[serde(default = "default_dependency_service")]
    pub dependency_service: String,
    #[serde(default = "default_dependency_container")]
    pub dependency_container: String,
    #[serde(default = "default_dependency_wait_secs")]
    pub dependency_wait_secs: u64,
    #[serde(default = "default_dependency_poll_secs")]
    pub dependency_poll_secs: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Fail `start` instead of proceeding when the dependency never became ready
    #[serde(default, deserialize_with = "lenient_bool")]
    pub require_dependency: bool,

    #[serde(default = "default_stop_checks")]
    pub stop_checks: u32,
    #[serde(default = "default_stop_check_interval_ms")]
    pub stop_check_interval_ms: u64,
    #[serde(default = "default_start_grace_ms")]
    pub start_grace_ms: u64,
    #[serde(default = "default_start_check_interval_ms")]
    pub start_check_interval_ms: u64,

    /// Mirror kvctl's own diagnostics to this file (`KVCTL_SUPERVISOR_LOG`)
    #[serde(default)]
    pub supervisor_log: Option<PathBuf>,
}

/// Command line of the supervised application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Text(String),
    Argv(Vec<String>),
}

impl CommandLine {
    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        match self {
            CommandLine::Text(text) => text.split_whitespace().map(str::to_string).collect(),
            CommandLine::Argv(argv) => argv.clone(),
        }
    }
}

impl From<&str> for CommandLine {
    fn from(text: &str) -> Self {
        CommandLine::Text(text.to_string())
    }
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}
fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}
fn default_app_mode() -> String {
    DEFAULT_APP_MODE.to_string()
}
fn default_weaviate_url() -> String {
    DEFAULT_WEAVIATE_URL.to_string()
}
fn default_app_command() -> CommandLine {
    CommandLine::from(DEFAULT_APP_COMMAND)
}
fn default_pid_file() -> PathBuf {
    PathBuf::from(DEFAULT_PID_FILE)
}
fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}
fn default_compose_file() -> PathBuf {
    PathBuf::from(DEFAULT_COMPOSE_FILE)
}
fn default_dependency_service() -> String {
    DEFAULT_DEPENDENCY_SERVICE.to_string()
}
fn default_dependency_container() -> String {
    DEFAULT_DEPENDENCY_CONTAINER.to_string()
}
fn default_dependency_wait_secs() -> u64 {
    30
}
fn default_dependency_poll_secs() -> u64 {
    2
}
fn default_probe_timeout_ms() -> u64 {
    2000
}
fn default_stop_checks() -> u32 {
    10
}
fn default_stop_check_interval_ms() -> u64 {
    500
}
fn default_start_grace_ms() -> u64 {
    3000
}
fn default_start_check_interval_ms() -> u64 {
    500
}

/// Accepts `true/false`, `1/0`, `yes/no`, `on/off`; anything else is `false`.
///
/// `DEBUG` is shared with unrelated tooling and may hold arbitrary text.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(value) => value,
        Raw::Int(value) => value != 0,
        Raw::Text(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
    })
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            api_port: default_api_port(),
            app_mode: default_app_mode(),
            enable_ssl: false,
            debug: false,
            weaviate_url: default_weaviate_url(),
            app_command: default_app_command(),
            pid_file: default_pid_file(),
            log_file: default_log_file(),
            compose_file: default_compose_file(),
            dependency_service: default_dependency_service(),
            dependency_container: default_dependency_container(),
            dependency_wait_secs: default_dependency_wait_secs(),
            dependency_poll_secs: default_dependency_poll_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            require_dependency: false,
            stop_checks: default_stop_checks(),
            stop_check_interval_ms: default_stop_check_interval_ms(),
            start_grace_ms: default_start_grace_ms(),
            start_check_interval_ms: default_start_check_interval_ms(),
            supervisor_log: None,
        }
    }
}

impl Settings {
    /// Load settings from `kvctl.toml` and the process environment.
    pub fn load() -> SupervisorResult<Self> {
        Self::load_from(CONFIG_FILE_STEM, std::env::vars().collect())
    }

    /// Load settings from an explicit config file stem and environment map.
    pub fn load_from(config_stem: &str, env: HashMap<String, String>) -> SupervisorResult<Self> {
        let prefix = format!("{ENV_PREFIX}_");
        let mut app_env = config::Map::new();
        let mut supervisor_env = config::Map::new();
        for (key, value) in env {
            if APP_ENV_KEYS.contains(&key.as_str()) {
                app_env.insert(key, value);
            } else if key.starts_with(&prefix) {
                supervisor_env.insert(key, value);
            }
        }

        let config = Config::builder()
            .add_source(File::with_name(config_stem).required(false))
            .add_source(Environment::default().source(Some(app_env)).try_parsing(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .source(Some(supervisor_env))
                    .try_parsing(true),
            )
            .build()
            .map_err(|err| {
                SupervisorError::config(format!("failed to read configuration: {err}"), err)
            })?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|err| {
                SupervisorError::config(format!("invalid configuration value: {err}"), err)
            })?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> SupervisorResult<()> {
        if self.api_port == 0 {
            return Err(SupervisorError::invalid_config("API_PORT must be between 1 and 65535"));
        }
        if self.app_command.argv().first().map_or(true, |p| p.trim().is_empty()) {
            return Err(SupervisorError::invalid_config("KVCTL_APP_COMMAND must not be empty"));
        }
        if !APP_MODES.contains(&self.app_mode.as_str()) {
            return Err(SupervisorError::invalid_config(format!(
                "APP_MODE must be one of {:?}, got '{}'",
                APP_MODES, self.app_mode
            )));
        }
        if self.dependency_wait_secs == 0 {
            return Err(SupervisorError::invalid_config(
                "KVCTL_DEPENDENCY_WAIT_SECS must be greater than zero",
            ));
        }
        self.dependency_handle()?;
        Ok(())
    }

    /// Program and arguments of the application entry point.
    pub fn app_program(&self) -> (String, Vec<String>) {
        let mut parts = self.app_command.argv().into_iter();
        let program = parts.next().unwrap_or_default();
        (program, parts.collect())
    }

    /// Environment exported to the application so file-based settings reach it too.
    pub fn app_env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("API_HOST", self.api_host.clone()),
            ("API_PORT", self.api_port.to_string()),
            ("APP_MODE", self.app_mode.clone()),
            ("ENABLE_SSL", self.enable_ssl.to_string()),
            ("DEBUG", self.debug.to_string()),
            ("WEAVIATE_URL", self.weaviate_url.clone()),
        ]
    }

    pub fn dependency_handle(&self) -> SupervisorResult<DependencyHandle> {
        let base = Url::parse(&self.weaviate_url).map_err(|err| {
            SupervisorError::config(format!("WEAVIATE_URL '{}' is not a URL", self.weaviate_url), err)
        })?;
        let readiness_url = base.join(READINESS_PATH).map_err(|err| {
            SupervisorError::config("cannot build dependency readiness URL", err)
        })?;

        Ok(DependencyHandle {
            name: self.dependency_service.clone(),
            readiness_url,
            container_name: self.dependency_container.clone(),
            compose_file: self.compose_file.clone(),
        })
    }

    pub fn scheme(&self) -> &'static str {
        if self.enable_ssl {
            "https"
        } else {
            "http"
        }
    }

    pub fn dependency_wait(&self) -> Duration {
        Duration::from_secs(self.dependency_wait_secs)
    }

    pub fn dependency_poll(&self) -> Duration {
        Duration::from_secs(self.dependency_poll_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    pub fn stop_check_interval(&self) -> Duration {
        Duration::from_millis(self.stop_check_interval_ms.max(1))
    }

    pub fn start_grace(&self) -> Duration {
        Duration::from_millis(self.start_grace_ms)
    }

    pub fn start_check_interval(&self) -> Duration {
        Duration::from_millis(self.start_check_interval_ms.max(1))
    }
}

/// Immutable description of the dependent vector-database service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyHandle {
    pub name: String,
    pub readiness_url: Url,
    pub container_name: String,
    pub compose_file: PathBuf,
}
