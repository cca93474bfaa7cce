//! Request client: one bounded generation call with retry.
//!
//! Wraps the [`SessionManager`] with size bounds, exponential backoff and
//! usage metering. Whether a failure is retried is decided solely by
//! [`GatewayError::kind`].

use crate::config::RequestParams;
use crate::ports::generation::{FailureKind, GatewayError};
use crate::services::session_manager::SessionManager;
use conductor_domain::core::string::clip;
use conductor_domain::{Model, SessionConfiguration};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Errors returned by [`RequestClient`]
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Permanent failure: {0}")]
    Permanent(#[source] GatewayError),

    #[error("Request failed after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: GatewayError },

    #[error("Request cancelled")]
    Cancelled,
}

impl RequestError {
    /// The gateway error behind a failed request, if any.
    pub fn cause(&self) -> Option<&GatewayError> {
        match self {
            RequestError::Permanent(e) | RequestError::Exhausted { source: e, .. } => Some(e),
            RequestError::Cancelled => None,
        }
    }
}

// ==================== Usage Metering ====================

#[derive(Debug, Default)]
struct ModelUsage {
    calls: AtomicU64,
    prompt_chars: AtomicU64,
    response_chars: AtomicU64,
}

/// Point-in-time copy of one model's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub calls: u64,
    pub prompt_chars: u64,
    pub response_chars: u64,
}

/// Per-model usage counters.
#[derive(Debug, Default)]
pub struct UsageMeter {
    models: Mutex<BTreeMap<String, Arc<ModelUsage>>>,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, model: &Model) -> Arc<ModelUsage> {
        self.models
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(model.as_str().to_string())
            .or_default()
            .clone()
    }

    fn record_call(&self, model: &Model, prompt_chars: usize) {
        let usage = self.counters(model);
        usage.calls.fetch_add(1, Ordering::Relaxed);
        usage
            .prompt_chars
            .fetch_add(prompt_chars as u64, Ordering::Relaxed);
    }

    fn record_response(&self, model: &Model, response_chars: usize) {
        self.counters(model)
            .response_chars
            .fetch_add(response_chars as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BTreeMap<String, UsageSnapshot> {
        self.models
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(model, usage)| {
                (
                    model.clone(),
                    UsageSnapshot {
                        calls: usage.calls.load(Ordering::Relaxed),
                        prompt_chars: usage.prompt_chars.load(Ordering::Relaxed),
                        response_chars: usage.response_chars.load(Ordering::Relaxed),
                    },
                )
            })
            .collect()
    }
}

// ==================== Client ====================

pub struct RequestClient {
    sessions: Arc<SessionManager>,
    params: RequestParams,
    usage: UsageMeter,
}

impl RequestClient {
    pub fn new(sessions: Arc<SessionManager>, params: RequestParams) -> Self {
        Self {
            sessions,
            params,
            usage: UsageMeter::new(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn usage(&self) -> &UsageMeter {
        &self.usage
    }

    /// Complete `prompt` on a plain session for `model`.
    pub async fn complete(
        &self,
        model: &Model,
        prompt: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, RequestError> {
        self.complete_with(&SessionConfiguration::new(model.clone()), prompt, cancellation)
            .await
    }

    /// Complete `prompt` on the session cached for `configuration`.
    pub async fn complete_with(
        &self,
        configuration: &SessionConfiguration,
        prompt: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, RequestError> {
        let model = configuration.model();
        let clipped = clip(prompt, self.params.max_prompt_chars);
        if clipped.len() < prompt.len() {
            debug!(
                "Prompt truncated to {} chars",
                self.params.max_prompt_chars
            );
        }
        let prompt = clipped;
        let prompt_chars = prompt.chars().count();

        let mut attempt: u32 = 0;
        loop {
            if cancellation.is_cancelled() {
                return Err(RequestError::Cancelled);
            }

            self.usage.record_call(model, prompt_chars);
            let error = match self.attempt(configuration, prompt, cancellation).await {
                Ok(reply) => {
                    let reply = clip(&reply, self.params.max_response_chars);
                    self.usage.record_response(model, reply.chars().count());
                    return Ok(reply.to_string());
                }
                Err(e) if e.is_cancelled() => return Err(RequestError::Cancelled),
                Err(e) => e,
            };

            match error.kind() {
                FailureKind::Permanent => {
                    warn!("Permanent failure on model {}: {}", model, error);
                    return Err(RequestError::Permanent(error));
                }
                FailureKind::Transient | FailureKind::Unclassified => {
                    if attempt >= self.params.max_retries {
                        warn!(
                            "Giving up on model {} after {} attempts: {}",
                            model,
                            attempt + 1,
                            error
                        );
                        return Err(RequestError::Exhausted {
                            attempts: attempt + 1,
                            source: error,
                        });
                    }

                    let delay = self.params.backoff(attempt);
                    warn!(
                        "Attempt {} on model {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        model,
                        error,
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = cancellation.cancelled() => return Err(RequestError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        configuration: &SessionConfiguration,
        prompt: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let handle = self.sessions.get_or_create(configuration).await?;
        debug!(
            "Sending {} chars on session {}",
            prompt.len(),
            handle.session_id()
        );

        match self.sessions.complete(&handle, prompt, cancellation).await {
            Err(e) if e.invalidates_session() => {
                self.sessions.evict(&handle).await;
                Err(e)
            }
            result => result,
        }
    }
}
