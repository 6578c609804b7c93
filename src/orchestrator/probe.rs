//! Readiness probing for a freshly started mock service.
//!
//! Any response at all means "ready": the mock answers every path once it is listening, so the status code is never
//! inspected. Running out of attempts is not an error either. The pipeline carries on and lets the infra tool or the
//! test report the unreachable service in its own, more actionable words.

use crate::config::ProbeConfig;

/// How a probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A GET completed on this attempt (1-based).
    Ready { attempt: u32 },
    TimedOut { attempts: u32 },
}

/// Polls an HTTP endpoint until it answers or the attempts run out.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    client: reqwest::Client,
    config: ProbeConfig,
}

impl ReadinessProbe {
    pub fn new(config: ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Sleep, GET `url`, repeat. Returns on the first completed request or after the last attempt.
    pub async fn wait_until_ready(&self, job: &str, url: &str) -> Readiness {
        let attempts = self.config.attempts;
        tracing::info!(job, url, "waiting for mock service to start");
        for attempt in 1..=attempts {
            tokio::time::sleep(self.config.interval).await;
            match self.client.get(url).send().await {
                Ok(response) => {
                    // body is irrelevant; drain it so the connection closes cleanly
                    if let Err(e) = response.bytes().await {
                        tracing::debug!(job, error = %e, "failed to drain readiness response");
                    }
                    tracing::debug!(job, attempt, "mock service is ready");
                    return Readiness::Ready { attempt };
                }
                Err(e) => {
                    tracing::info!(job, attempt, attempts, error = %e, "waiting for mock service to start");
                }
            }
        }
        tracing::warn!(
            job,
            url,
            attempts,
            waited = ?self.config.interval * attempts,
            "mock service never answered; continuing"
        );
        Readiness::TimedOut { attempts }
    }
}
