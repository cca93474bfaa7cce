//! Session concurrency manager
//!
//! Keeps one live generation session per distinct [`SessionConfiguration`]
//! and serializes completions on it.
//!
//! # Caching
//!
//! The cache maps each configuration to a shared [`OnceCell`]. The map lock
//! is held only long enough to fetch or insert the cell; the session itself
//! is created through [`OnceCell::get_or_try_init`], so concurrent callers
//! with the same configuration wait on a single creation. A failed creation
//! leaves the cell empty and the next caller tries again.
//!
//! # Timeouts
//!
//! Every completion races two bounds: an inactivity timeout that restarts
//! on each event, and an absolute timeout for the whole completion. Both are
//! recomputed on every wake-up and the loop sleeps only until the nearer
//! one. Either bound may be disabled.

use crate::config::SessionParams;
use crate::ports::generation::{
    GatewayError, GenerationService, GenerationSession, SessionTimeout, TimeoutBound,
};
use chrono::{DateTime, Utc};
use conductor_domain::core::string::{single_line, truncate};
use conductor_domain::{SessionConfiguration, SessionEvent};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const PROMPT_PREVIEW_CHARS: usize = 140;

type SessionCell = Arc<OnceCell<Arc<SessionHandle>>>;

/// One cached generation session.
///
/// The inner mutex is the handle's gate: a completion holds it from `send`
/// until the reply resolves, so turns on one session never interleave.
pub struct SessionHandle {
    configuration: SessionConfiguration,
    session_id: String,
    session: tokio::sync::Mutex<Box<dyn GenerationSession>>,
}

impl SessionHandle {
    pub fn configuration(&self) -> &SessionConfiguration {
        &self.configuration
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("model", &self.configuration.model().as_str())
            .finish()
    }
}

pub struct SessionManager {
    service: Arc<dyn GenerationService>,
    params: SessionParams,
    sessions: Mutex<HashMap<SessionConfiguration, SessionCell>>,
}

impl SessionManager {
    pub fn new(service: Arc<dyn GenerationService>, params: SessionParams) -> Self {
        Self {
            service,
            params,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionConfiguration, SessionCell>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached handle for `configuration`, creating it on first use.
    pub async fn get_or_create(
        &self,
        configuration: &SessionConfiguration,
    ) -> Result<Arc<SessionHandle>, GatewayError> {
        let cell = self
            .sessions()
            .entry(configuration.clone())
            .or_default()
            .clone();

        let handle = cell
            .get_or_try_init(|| async {
                let session = self.service.open_session(configuration).await?;
                let session_id = session.session_id().to_string();
                info!(
                    "Opened session {} for model {}",
                    session_id,
                    configuration.model()
                );
                Ok::<_, GatewayError>(Arc::new(SessionHandle {
                    configuration: configuration.clone(),
                    session_id,
                    session: tokio::sync::Mutex::new(session),
                }))
            })
            .await?;

        Ok(handle.clone())
    }

    /// Pre-create the handle for `configuration`. Failures are only logged.
    pub async fn warm_up(&self, configuration: &SessionConfiguration) {
        if let Err(e) = self.get_or_create(configuration).await {
            warn!(
                "Session warm-up failed for model {}: {}",
                configuration.model(),
                e
            );
        }
    }

    pub async fn warm_up_all(&self, configurations: &[SessionConfiguration]) {
        join_all(configurations.iter().map(|c| self.warm_up(c))).await;
    }

    /// Number of live (successfully created) handles.
    pub fn session_count(&self) -> usize {
        self.sessions()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// Drop `handle` from the cache and close it.
    ///
    /// Does nothing when the cache already holds a newer handle for the same
    /// configuration.
    pub async fn evict(&self, handle: &Arc<SessionHandle>) {
        let removed = {
            let mut sessions = self.sessions();
            let current = sessions
                .get(&handle.configuration)
                .and_then(|cell| cell.get())
                .is_some_and(|cached| Arc::ptr_eq(cached, handle));
            current && sessions.remove(&handle.configuration).is_some()
        };

        if removed {
            debug!("Evicting session {}", handle.session_id);
            let mut session = handle.session.lock().await;
            if let Err(e) = session.close().await {
                debug!("Closing evicted session {} failed: {}", handle.session_id, e);
            }
        }
    }

    /// Close every cached session and empty the cache.
    pub async fn shutdown(&self) {
        let cells: Vec<SessionCell> = self.sessions().drain().map(|(_, cell)| cell).collect();

        for cell in cells {
            let Some(handle) = cell.get() else {
                continue;
            };
            let mut session = handle.session.lock().await;
            if let Err(e) = session.close().await {
                warn!("Failed to close session {}: {}", handle.session_id, e);
            }
        }
        info!("Session manager shut down");
    }

    /// Send `prompt` on `handle` and wait for the complete reply.
    pub async fn complete(
        &self,
        handle: &SessionHandle,
        prompt: &str,
        cancellation: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let mut session = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(GatewayError::Cancelled),
            guard = handle.session.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(GatewayError::Cancelled),
            sent = session.send(prompt) => sent?,
        }

        let started = Instant::now();
        let mut last_activity = started;
        let mut last_event_type: Option<String> = None;
        let mut last_event_at: Option<DateTime<Utc>> = None;
        let mut awaiting_clarification = false;
        let mut content = String::new();

        loop {
            let now = Instant::now();
            let absolute_remaining = self
                .params
                .absolute_timeout
                .map(|limit| limit.saturating_sub(now - started));
            let inactivity_remaining = self
                .params
                .inactivity_timeout
                .map(|limit| limit.saturating_sub(now - last_activity));

            let expired = if absolute_remaining == Some(Duration::ZERO) {
                self.params.absolute_timeout.map(|l| (TimeoutBound::Absolute, l))
            } else if inactivity_remaining == Some(Duration::ZERO) {
                self.params.inactivity_timeout.map(|l| (TimeoutBound::Inactivity, l))
            } else {
                None
            };

            if let Some((bound, limit)) = expired {
                warn!(
                    "Session {} hit {} timeout after {:?}",
                    handle.session_id, bound, limit
                );
                if let Err(e) = session.abort().await {
                    debug!("Abort after timeout failed: {}", e);
                }
                return Err(GatewayError::Timeout(Box::new(SessionTimeout {
                    bound,
                    limit,
                    last_event_type: last_event_type.clone(),
                    last_event_at,
                    awaiting_clarification,
                    prompt_preview: truncate(&single_line(prompt), PROMPT_PREVIEW_CHARS),
                })));
            }

            let wait = match (inactivity_remaining, absolute_remaining) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            let event = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    if let Err(e) = session.abort().await {
                        debug!("Abort after cancellation failed: {}", e);
                    }
                    return Err(GatewayError::Cancelled);
                }
                event = session.next_event() => event,
                _ = sleep_until_bound(wait) => continue,
            };

            let Some(event) = event else {
                return Err(GatewayError::TransportClosed);
            };

            last_activity = Instant::now();
            last_event_type = Some(event.kind().to_string());
            last_event_at = Some(Utc::now());

            match event {
                SessionEvent::Delta(chunk) => {
                    awaiting_clarification = false;
                    content.push_str(&chunk);
                }
                SessionEvent::Message(message) => {
                    return Ok(if content.is_empty() { message } else { content });
                }
                SessionEvent::Idle => return Ok(content),
                SessionEvent::Error(message) => {
                    return Err(GatewayError::from_remote_message(&message));
                }
                SessionEvent::AwaitingInput(question) => {
                    debug!(
                        "Session {} is awaiting input: {}",
                        handle.session_id, question
                    );
                    awaiting_clarification = true;
                }
                SessionEvent::Other(kind) => {
                    trace!("Session {} event: {}", handle.session_id, kind);
                }
            }
        }
    }
}

async fn sleep_until_bound(wait: Option<Duration>) {
    match wait {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conductor_domain::Model;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ==================== Scripted Service ====================

    /// `Some(event)` is delivered, `None` closes the stream; once the script
    /// runs out the session goes silent.
    struct ScriptedSession {
        id: String,
        events: VecDeque<Option<SessionEvent>>,
        aborts: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GenerationSession for ScriptedSession {
        fn session_id(&self) -> &str {
            &self.id
        }

        async fn send(&mut self, _prompt: &str) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn next_event(&mut self) -> Option<SessionEvent> {
            match self.events.pop_front() {
                Some(event) => event,
                None => std::future::pending().await,
            }
        }

        async fn abort(&mut self) -> Result<(), GatewayError> {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), GatewayError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedService {
        opens: AtomicUsize,
        failures_left: AtomicUsize,
        scripts: Mutex<VecDeque<Vec<Option<SessionEvent>>>>,
        aborts: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl ScriptedService {
        fn with_script(events: Vec<Option<SessionEvent>>) -> Self {
            let service = Self::default();
            service.scripts.lock().unwrap().push_back(events);
            service
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        async fn open_session(
            &self,
            _configuration: &SessionConfiguration,
        ) -> Result<Box<dyn GenerationSession>, GatewayError> {
            tokio::task::yield_now().await;
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(GatewayError::Connection("refused".into()));
            }
            let n = self.opens.fetch_add(1, Ordering::SeqCst);
            let events = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
            Ok(Box::new(ScriptedSession {
                id: format!("session-{n}"),
                events: events.into(),
                aborts: self.aborts.clone(),
                closes: self.closes.clone(),
            }))
        }
    }

    fn config() -> SessionConfiguration {
        SessionConfiguration::new(Model::ClaudeSonnet46)
    }

    fn manager(service: Arc<ScriptedService>, params: SessionParams) -> SessionManager {
        SessionManager::new(service, params)
    }

    // ==================== Cache ====================

    #[tokio::test]
    async fn test_identical_configurations_share_one_handle() {
        let service = Arc::new(ScriptedService::default());
        let manager = manager(service.clone(), SessionParams::default());

        let a = manager.get_or_create(&config()).await.unwrap();
        let b = manager.get_or_create(&config()).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(service.opens.load(Ordering::SeqCst), 1);
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn test_excluded_tools_create_second_handle() {
        let service = Arc::new(ScriptedService::default());
        let manager = manager(service.clone(), SessionParams::default());

        let a = manager.get_or_create(&config()).await.unwrap();
        let restricted = config().with_excluded_tools(["shell"]);
        let b = manager.get_or_create(&restricted).await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(service.opens.load(Ordering::SeqCst), 2);
        assert_eq!(manager.session_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_creation_is_single_flight() {
        let service = Arc::new(ScriptedService::default());
        let manager = manager(service.clone(), SessionParams::default());
        let configuration = config();

        let (a, b, c) = tokio::join!(
            manager.get_or_create(&configuration),
            manager.get_or_create(&configuration),
            manager.get_or_create(&configuration),
        );

        let a = a.unwrap();
        assert!(Arc::ptr_eq(&a, &b.unwrap()));
        assert!(Arc::ptr_eq(&a, &c.unwrap()));
        assert_eq!(service.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_creation_is_retried_by_next_caller() {
        let service = Arc::new(ScriptedService::default());
        service.failures_left.store(1, Ordering::SeqCst);
        let manager = manager(service.clone(), SessionParams::default());

        let first = manager.get_or_create(&config()).await;
        assert!(matches!(first, Err(GatewayError::Connection(_))));
        assert_eq!(manager.session_count(), 0);

        let second = manager.get_or_create(&config()).await;
        assert!(second.is_ok());
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn test_warm_up_swallows_failures() {
        let service = Arc::new(ScriptedService::default());
        service.failures_left.store(1, Ordering::SeqCst);
        let manager = manager(service.clone(), SessionParams::default());

        manager.warm_up(&config()).await;
        assert_eq!(manager.session_count(), 0);

        manager
            .warm_up_all(&[config(), config().with_available_tools(["view"])])
            .await;
        assert_eq!(manager.session_count(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_closes_every_session() {
        let service = Arc::new(ScriptedService::default());
        let manager = manager(service.clone(), SessionParams::default());
        manager.get_or_create(&config()).await.unwrap();
        manager
            .get_or_create(&config().with_excluded_tools(["shell"]))
            .await
            .unwrap();

        manager.shutdown().await;

        assert_eq!(manager.session_count(), 0);
        assert_eq!(service.closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_evict_replaces_handle_on_next_use() {
        let service = Arc::new(ScriptedService::default());
        let manager = manager(service.clone(), SessionParams::default());

        let a = manager.get_or_create(&config()).await.unwrap();
        manager.evict(&a).await;
        let b = manager.get_or_create(&config()).await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(service.closes.load(Ordering::SeqCst), 1);

        // A stale handle does not evict its replacement.
        manager.evict(&a).await;
        assert_eq!(manager.session_count(), 1);
    }

    // ==================== Completion ====================

    #[tokio::test]
    async fn test_deltas_accumulate_until_idle() {
        let service = Arc::new(ScriptedService::with_script(vec![
            Some(SessionEvent::Delta("Hello, ".into())),
            Some(SessionEvent::Other("tool.execution_start".into())),
            Some(SessionEvent::Delta("world".into())),
            Some(SessionEvent::Idle),
        ]));
        let manager = manager(service, SessionParams::default());
        let handle = manager.get_or_create(&config()).await.unwrap();

        let reply = manager
            .complete(&handle, "hi", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply, "Hello, world");
    }

    #[tokio::test]
    async fn test_message_without_deltas_resolves_with_message() {
        let service = Arc::new(ScriptedService::with_script(vec![Some(
            SessionEvent::Message("{\"filesTouched\": []}".into()),
        )]));
        let manager = manager(service, SessionParams::default());
        let handle = manager.get_or_create(&config()).await.unwrap();

        let reply = manager
            .complete(&handle, "hi", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply, "{\"filesTouched\": []}");
    }

    #[tokio::test]
    async fn test_error_event_is_classified() {
        let service = Arc::new(ScriptedService::with_script(vec![Some(
            SessionEvent::Error("429 Too Many Requests".into()),
        )]));
        let manager = manager(service, SessionParams::default());
        let handle = manager.get_or_create(&config()).await.unwrap();

        let err = manager
            .complete(&handle, "hi", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_closed_stream_is_transport_closed() {
        let service = Arc::new(ScriptedService::with_script(vec![
            Some(SessionEvent::Delta("partial".into())),
            None,
        ]));
        let manager = manager(service, SessionParams::default());
        let handle = manager.get_or_create(&config()).await.unwrap();

        let err = manager
            .complete(&handle, "hi", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::TransportClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_fires_before_absolute_on_silent_session() {
        let service = Arc::new(ScriptedService::with_script(vec![Some(
            SessionEvent::AwaitingInput("Which file?".into()),
        )]));
        let params = SessionParams::default()
            .with_inactivity_timeout(Some(Duration::from_secs(5)))
            .with_absolute_timeout(Some(Duration::from_secs(60)));
        let manager = manager(service.clone(), params);
        let handle = manager.get_or_create(&config()).await.unwrap();

        let started = Instant::now();
        let err = manager
            .complete(&handle, "Implement the feature", &CancellationToken::new())
            .await
            .unwrap_err();

        let timeout = err.timeout().expect("timeout error");
        assert_eq!(timeout.bound, TimeoutBound::Inactivity);
        assert_eq!(timeout.limit, Duration::from_secs(5));
        assert_eq!(timeout.last_event_type.as_deref(), Some("user_input.requested"));
        assert!(timeout.last_event_at.is_some());
        assert!(timeout.awaiting_clarification);
        assert_eq!(timeout.prompt_preview, "Implement the feature");
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(service.aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absolute_timeout_with_inactivity_disabled() {
        let service = Arc::new(ScriptedService::default());
        let manager = manager(service, SessionParams::from_secs(0, 10));
        let handle = manager.get_or_create(&config()).await.unwrap();

        let err = manager
            .complete(&handle, &"x".repeat(500), &CancellationToken::new())
            .await
            .unwrap_err();

        let timeout = err.timeout().expect("timeout error");
        assert_eq!(timeout.bound, TimeoutBound::Absolute);
        assert_eq!(timeout.last_event_type, None);
        assert_eq!(timeout.prompt_preview.chars().count(), PROMPT_PREVIEW_CHARS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_in_flight_call() {
        let service = Arc::new(ScriptedService::default());
        let manager = manager(service.clone(), SessionParams::from_secs(0, 0));
        let handle = manager.get_or_create(&config()).await.unwrap();
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let err = manager.complete(&handle, "hi", &token).await.unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert_eq!(service.aborts.load(Ordering::SeqCst), 1);
    }
}
