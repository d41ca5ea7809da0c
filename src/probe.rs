//! HTTP readiness probing for the vector-database dependency

use crate::core::poll::PollPolicy;
use crate::error::{SupervisorError, SupervisorResult};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Issues readiness probes with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HealthProber {
    client: Client,
}

impl HealthProber {
    pub fn new(request_timeout: Duration) -> SupervisorResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|err| SupervisorError::config("failed to build HTTP client", err))?;
        Ok(Self { client })
    }

    /// One probe. Any 2xx answer counts as ready; transport errors and other
    /// statuses count as not ready.
    pub async fn probe_once(&self, url: &Url) -> bool {
        match self.client.get(url.clone()).send().await {
            Ok(response) => {
                let ready = response.status().is_success();
                debug!(url = %url, status = %response.status(), ready, "readiness probe");
                ready
            }
            Err(err) => {
                debug!(url = %url, error = %err, "readiness probe failed");
                false
            }
        }
    }

    /// Probe every `interval` until ready or `max_wait` elapses.
    pub async fn wait_ready(&self, url: &Url, max_wait: Duration, interval: Duration) -> bool {
        PollPolicy::new(interval, max_wait)
            .until_async(|| self.probe_once(url))
            .await
            .satisfied
    }
}
