//! Vector-database dependency control
//!
//! The container lifecycle is driven through a [`ContainerRuntime`]; readiness
//! is always decided by the HTTP probe, never by the runtime's own view.

use crate::config::DependencyHandle;
use crate::core::models::{DependencyReadiness, DependencyStopOutcome};
use crate::error::{SupervisorError, SupervisorResult};
use crate::probe::HealthProber;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Container operations needed to supervise the dependency.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether the named container is currently running.
    async fn is_running(&self, dependency: &DependencyHandle) -> SupervisorResult<bool>;

    /// Bring the service up in the background.
    async fn start(&self, dependency: &DependencyHandle) -> SupervisorResult<()>;

    /// Graceful stop of the service.
    async fn stop(&self, dependency: &DependencyHandle) -> SupervisorResult<()>;

    /// Forced removal of the container.
    async fn force_remove(&self, dependency: &DependencyHandle) -> SupervisorResult<()>;
}

#[derive(Debug, Clone)]
enum ComposeTool {
    /// `docker compose` (v2 plugin)
    Plugin { docker: PathBuf },
    /// Legacy standalone `docker-compose`
    Standalone { binary: PathBuf },
}

impl ComposeTool {
    fn command(&self, dependency: &DependencyHandle) -> Command {
        let mut cmd = match self {
            ComposeTool::Plugin { docker } => {
                let mut cmd = Command::new(docker);
                cmd.arg("compose");
                cmd
            }
            ComposeTool::Standalone { binary } => Command::new(binary),
        };
        cmd.arg("-f").arg(&dependency.compose_file);
        cmd
    }

    fn label(&self) -> &'static str {
        match self {
            ComposeTool::Plugin { .. } => "docker compose",
            ComposeTool::Standalone { .. } => "docker-compose",
        }
    }
}

/// Production runtime backed by the Docker CLI.
#[derive(Debug, Default)]
pub struct DockerCompose {
    compose: OnceCell<ComposeTool>,
}

impl DockerCompose {
    pub fn new() -> Self {
        Self::default()
    }

    async fn compose_tool(&self) -> SupervisorResult<&ComposeTool> {
        self.compose.get_or_try_init(detect_compose).await
    }
}

async fn detect_compose() -> SupervisorResult<ComposeTool> {
    if let Ok(docker) = which::which("docker") {
        let probe = Command::new(&docker)
            .args(["compose", "version"])
            .stdin(Stdio::null())
            .output()
            .await;
        if matches!(probe, Ok(ref output) if output.status.success()) {
            debug!(docker = %docker.display(), "using docker compose plugin");
            return Ok(ComposeTool::Plugin { docker });
        }
    }

    match which::which("docker-compose") {
        Ok(binary) => {
            debug!(binary = %binary.display(), "using standalone docker-compose");
            Ok(ComposeTool::Standalone { binary })
        }
        Err(_) => Err(SupervisorError::DependencyTooling {
            tool: "docker compose".to_string(),
            message: "neither `docker compose` nor `docker-compose` is available".to_string(),
        }),
    }
}

fn docker_binary() -> SupervisorResult<PathBuf> {
    which::which("docker").map_err(|err| SupervisorError::DependencyTooling {
        tool: "docker".to_string(),
        message: err.to_string(),
    })
}

async fn run(mut cmd: Command, tool: &str) -> SupervisorResult<Output> {
    cmd.stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| SupervisorError::DependencyTooling {
            tool: tool.to_string(),
            message: err.to_string(),
        })
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCompose {
    async fn is_running(&self, dependency: &DependencyHandle) -> SupervisorResult<bool> {
        let mut cmd = Command::new(docker_binary()?);
        cmd.args(["inspect", "-f", "{{.State.Running}}"])
            .arg(&dependency.container_name);
        let output = run(cmd, "docker").await?;

        // a missing container is simply not running
        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    async fn start(&self, dependency: &DependencyHandle) -> SupervisorResult<()> {
        let tool = self.compose_tool().await?;
        let mut cmd = tool.command(dependency);
        cmd.args(["up", "-d"]).arg(&dependency.name);

        let output = run(cmd, tool.label()).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SupervisorError::DependencyStart {
                name: dependency.name.clone(),
                message: failure_message(&output),
            })
        }
    }

    async fn stop(&self, dependency: &DependencyHandle) -> SupervisorResult<()> {
        let tool = self.compose_tool().await?;
        let mut cmd = tool.command(dependency);
        cmd.arg("stop").arg(&dependency.name);

        let output = run(cmd, tool.label()).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SupervisorError::DependencyTooling {
                tool: tool.label().to_string(),
                message: failure_message(&output),
            })
        }
    }

    async fn force_remove(&self, dependency: &DependencyHandle) -> SupervisorResult<()> {
        let mut cmd = Command::new(docker_binary()?);
        cmd.args(["rm", "-f"]).arg(&dependency.container_name);

        let output = run(cmd, "docker").await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SupervisorError::DependencyTooling {
                tool: "docker".to_string(),
                message: failure_message(&output),
            })
        }
    }
}

/// Brings the dependency up, waits for it, and takes it down again.
pub struct DependencyController<R> {
    runtime: R,
    prober: HealthProber,
    handle: DependencyHandle,
    max_wait: Duration,
    poll_interval: Duration,
}

impl<R: ContainerRuntime> DependencyController<R> {
    pub fn new(
        runtime: R,
        prober: HealthProber,
        handle: DependencyHandle,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            runtime,
            prober,
            handle,
            max_wait,
            poll_interval,
        }
    }

    pub fn handle(&self) -> &DependencyHandle {
        &self.handle
    }

    /// Start the container unless it already runs, then wait for readiness.
    ///
    /// Errors only when the runtime cannot be driven; a readiness timeout is
    /// returned as [`DependencyReadiness::DegradedTimeout`].
    pub async fn ensure_running(&self) -> SupervisorResult<DependencyReadiness> {
        let container = self.handle.container_name.as_str();
        if self.runtime.is_running(&self.handle).await? {
            info!(container, "dependency already running");
        } else {
            info!(container, service = %self.handle.name, "starting dependency");
            self.runtime.start(&self.handle).await?;
        }

        let url = &self.handle.readiness_url;
        if self
            .prober
            .wait_ready(url, self.max_wait, self.poll_interval)
            .await
        {
            info!(container, url = %url, "dependency ready");
            Ok(DependencyReadiness::Ready)
        } else {
            warn!(
                container,
                url = %url,
                waited_secs = self.max_wait.as_secs(),
                "dependency did not become ready"
            );
            Ok(DependencyReadiness::DegradedTimeout {
                waited: self.max_wait,
            })
        }
    }

    /// Single readiness probe, for status queries.
    pub async fn is_ready(&self) -> bool {
        self.prober.probe_once(&self.handle.readiness_url).await
    }

    /// Graceful stop with forced-removal fallback. Never fails.
    pub async fn stop(&self) -> DependencyStopOutcome {
        let container = self.handle.container_name.as_str();
        let graceful = match self.runtime.stop(&self.handle).await {
            Ok(()) => {
                info!(container, "dependency stopped");
                return DependencyStopOutcome::Graceful;
            }
            Err(err) => err,
        };

        warn!(container, error = %graceful, "graceful stop failed, removing container");
        match self.runtime.force_remove(&self.handle).await {
            Ok(()) => {
                info!(container, "dependency container removed");
                DependencyStopOutcome::Forced
            }
            Err(err) => {
                warn!(container, error = %err, "forced removal failed");
                DependencyStopOutcome::Failed {
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn handle_for(base: &str) -> DependencyHandle {
        DependencyHandle {
            name: "weaviate".to_string(),
            readiness_url: Url::parse(base)
                .unwrap()
                .join("/v1/.well-known/ready")
                .unwrap(),
            container_name: "koalaqvision-weaviate".to_string(),
            compose_file: PathBuf::from("docker-compose.yml"),
        }
    }

    fn controller(runtime: MockContainerRuntime, base: &str) -> DependencyController<MockContainerRuntime> {
        DependencyController::new(
            runtime,
            HealthProber::new(Duration::from_millis(300)).unwrap(),
            handle_for(base),
            Duration::from_millis(600),
            Duration::from_millis(100),
        )
    }

    async fn ready_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/.well-known/ready"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn running_and_healthy_container_skips_start() {
        let server = ready_server().await;
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_is_running().times(1).returning(|_| Ok(true));
        runtime.expect_start().never();

        let controller = controller(runtime, &server.uri());
        let started = Instant::now();
        let readiness = controller.ensure_running().await.unwrap();

        assert_eq!(readiness, DependencyReadiness::Ready);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stopped_container_is_started_before_probing() {
        let server = ready_server().await;
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_is_running().returning(|_| Ok(false));
        runtime
            .expect_start()
            .withf(|dep| dep.name == "weaviate")
            .times(1)
            .returning(|_| Ok(()));

        let readiness = controller(runtime, &server.uri())
            .ensure_running()
            .await
            .unwrap();
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn unreachable_dependency_degrades_instead_of_failing() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_is_running().returning(|_| Ok(false));
        runtime.expect_start().returning(|_| Ok(()));

        // nothing listens on port 9 locally
        let readiness = controller(runtime, "http://127.0.0.1:9")
            .ensure_running()
            .await
            .unwrap();
        assert_eq!(
            readiness,
            DependencyReadiness::DegradedTimeout {
                waited: Duration::from_millis(600)
            }
        );
    }

    #[tokio::test]
    async fn compose_failure_is_fatal() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_is_running().returning(|_| Ok(false));
        runtime.expect_start().returning(|dep| {
            Err(SupervisorError::DependencyStart {
                name: dep.name.clone(),
                message: "no such service".to_string(),
            })
        });

        let err = controller(runtime, "http://127.0.0.1:9")
            .ensure_running()
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::DependencyStart { .. }));
    }

    #[tokio::test]
    async fn stop_falls_back_to_forced_removal() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_stop().returning(|_| {
            Err(SupervisorError::DependencyTooling {
                tool: "docker compose".to_string(),
                message: "compose file missing".to_string(),
            })
        });
        runtime.expect_force_remove().times(1).returning(|_| Ok(()));

        let outcome = controller(runtime, "http://127.0.0.1:9").stop().await;
        assert_eq!(outcome, DependencyStopOutcome::Forced);
    }

    #[tokio::test]
    async fn stop_never_fails_even_when_removal_fails() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_stop().returning(|_| {
            Err(SupervisorError::DependencyTooling {
                tool: "docker".to_string(),
                message: "daemon not running".to_string(),
            })
        });
        runtime.expect_force_remove().returning(|_| {
            Err(SupervisorError::DependencyTooling {
                tool: "docker".to_string(),
                message: "daemon not running".to_string(),
            })
        });

        let outcome = controller(runtime, "http://127.0.0.1:9").stop().await;
        assert!(matches!(outcome, DependencyStopOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn graceful_stop_skips_removal() {
        let mut runtime = MockContainerRuntime::new();
        runtime.expect_stop().times(1).returning(|_| Ok(()));
        runtime.expect_force_remove().never();

        let outcome = controller(runtime, "http://127.0.0.1:9").stop().await;
        assert_eq!(outcome, DependencyStopOutcome::Graceful);
    }
}
