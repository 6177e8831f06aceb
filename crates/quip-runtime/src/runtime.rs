//! The bot runtime: session start, directory priming and the event loop.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use quip_runtime::BotRuntime;
//! use quip_framework::prelude::*;
//!
//! let mut runtime = BotRuntime::builder().build()?;
//! runtime.register_primary(directed_at_bot().contains(["hi"]), || async { "hi there" });
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quip_core::{EventSource, SessionInfo, WebApi, WorkspaceDirectory};
use quip_framework::{
    ActionContext, DispatchService, EmojiLetterMap, EventFilter, EventSkipped, Handler,
    HandlerRegistry, LetterEmojis, Matcher, ReactionPattern,
};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::{BoxError, ServiceBuilder, ServiceExt};
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConfigLoader, QuipConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// Owns the rules and the two platform collaborators, and drives dispatch.
///
/// Rules are registered before [`start`](Self::start); each inbound event is
/// then filtered and dispatched on its own task, so a slow handler never holds
/// up the next event.
pub struct BotRuntime {
    config: QuipConfig,
    api: Arc<dyn WebApi>,
    source: Arc<dyn EventSource>,
    directory: WorkspaceDirectory,
    registry: HandlerRegistry,
    letters: Option<Arc<EmojiLetterMap>>,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl BotRuntime {
    /// Creates a runtime builder that loads configuration from the usual places.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime over explicit collaborators.
    ///
    /// The configuration is used as-is; a letter map in it is built here and
    /// rejected if malformed.
    pub fn new(
        config: QuipConfig,
        api: Arc<dyn WebApi>,
        source: Arc<dyn EventSource>,
    ) -> RuntimeResult<Self> {
        let directory = WorkspaceDirectory::from_api(Arc::clone(&api), config.directory.to_options());

        let mut runtime = Self {
            config,
            api,
            source,
            directory,
            registry: HandlerRegistry::new(),
            letters: None,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
        };

        if let Some(letters) = runtime.config.letters.clone() {
            runtime.configure_letter_map(letters)?;
        }
        Ok(runtime)
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &QuipConfig {
        &self.config
    }

    /// The shared workspace directory.
    pub fn directory(&self) -> &WorkspaceDirectory {
        &self.directory
    }

    /// The rules registered so far.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a primary rule. Every matching primary rule fires.
    pub fn register_primary<H, T>(&mut self, matcher: Matcher, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.registry.register_primary(matcher, handler);
        self
    }

    /// Registers a fallthrough rule, tried only when no primary rule matched.
    pub fn register_fallthrough<H, T>(&mut self, matcher: Matcher, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.registry.register_fallthrough(matcher, handler);
        self
    }

    /// Registers a reaction rule.
    pub fn register_reaction<P, H, T>(&mut self, pattern: P, matcher: Matcher, handler: H) -> &mut Self
    where
        P: Into<ReactionPattern>,
        H: Handler<T>,
        T: 'static,
    {
        self.registry.register_reaction(pattern, matcher, handler);
        self
    }

    /// Sets the letter-to-emoji map used by emoji word reactions.
    ///
    /// Fails if a key is not exactly one character.
    pub fn configure_letter_map<K>(
        &mut self,
        mapping: impl IntoIterator<Item = (K, LetterEmojis)>,
    ) -> RuntimeResult<&mut Self>
    where
        K: AsRef<str>,
    {
        let letters = EmojiLetterMap::new(mapping)?;
        info!(letters = letters.len(), "Letter map configured");
        self.letters = Some(Arc::new(letters));
        Ok(self)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// A token that stops the event loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Returns whether the event loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Opens the session, primes the directory, calls `on_ready`, then
    /// dispatches events until the stream ends or shutdown is requested.
    ///
    /// A failure to open the session or prime the directory is returned
    /// before `on_ready` runs. In-flight dispatches are awaited before this
    /// returns.
    pub async fn start<F, Fut>(&self, on_ready: F) -> RuntimeResult<()>
    where
        F: FnOnce(SessionInfo) -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return Ok(());
        }

        let result = self.serve(on_ready).await;
        self.running.store(false, Ordering::SeqCst);

        if let Err(e) = self.source.close().await {
            warn!(error = %e, "Error while closing the event stream");
        }
        result
    }

    async fn serve<F, Fut>(&self, on_ready: F) -> RuntimeResult<()>
    where
        F: FnOnce(SessionInfo) -> Fut,
        Fut: Future<Output = ()>,
    {
        let session = self.source.start_session().await?;
        info!(
            user_id = %session.user_id,
            team = %session.team_name,
            "Session started"
        );

        self.directory.prime().await?;
        info!("Workspace directory primed");

        let filter = EventFilter::new(
            session.user_id.as_str(),
            self.config.bot.ignored_subtypes.iter().cloned(),
        );
        let dispatch = DispatchService::new(
            Arc::new(self.registry.clone()),
            self.action_context(),
            session.user_id.as_str(),
        );

        on_ready(session).await;

        let (primary, fallthrough, reaction) = self.registry.len();
        info!(primary, fallthrough, reaction, "Quip runtime is now running");

        let mut in_flight = JoinSet::new();
        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                next = self.source.next_event() => next,
            };

            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => {
                    info!("Event stream ended");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Event stream failed");
                    drain(&mut in_flight).await;
                    return Err(e.into());
                }
            };

            while in_flight.try_join_next().is_some() {}

            let service = ServiceBuilder::new()
                .filter(filter.clone())
                .service(dispatch.clone());
            let event_name = event.event_name();
            in_flight.spawn(async move {
                match service.oneshot(event).await {
                    Ok(report) => debug!(
                        event = event_name,
                        actions = report.actions.len(),
                        failures = report.failures.len(),
                        "Dispatch finished"
                    ),
                    Err(err) => log_rejection(event_name, &err),
                }
            });
        }

        drain(&mut in_flight).await;
        Ok(())
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(|_| async {}, wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes, then waits for in-flight dispatches.
    pub async fn run_until<F, Fut, S>(&self, on_ready: F, shutdown: S) -> RuntimeResult<()>
    where
        F: FnOnce(SessionInfo) -> Fut,
        Fut: Future<Output = ()>,
        S: Future<Output = ()>,
    {
        let started = self.start(on_ready);
        tokio::pin!(started);

        tokio::select! {
            result = &mut started => return result,
            () = shutdown => {}
        }

        self.shutdown.cancel();
        started.await
    }

    fn action_context(&self) -> ActionContext {
        let ctx = ActionContext::new(Arc::clone(&self.api), self.directory.clone())
            .with_reaction_delay(self.config.dispatch.reaction_delay());
        match &self.letters {
            Some(letters) => ctx.with_letters(Arc::clone(letters)),
            None => ctx,
        }
    }
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Dispatch task failed");
        }
    }
}

fn log_rejection(event: &'static str, err: &BoxError) {
    if err.is::<EventSkipped>() {
        trace!(event, reason = %err, "Event skipped");
    } else {
        warn!(event, error = %err, "Event could not be dispatched");
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                wait_for_ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            () = wait_for_ctrl_c() => {}
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builds a [`BotRuntime`] from layered configuration.
///
/// Unless collaborators are supplied, the Web API client and the socket-mode
/// stream are created from the configured tokens; that needs the
/// `http-client` and `ws-client` features.
///
/// ```rust,ignore
/// let runtime = BotRuntime::builder()
///     .config_file("config/quip.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    api: Option<Arc<dyn WebApi>>,
    source: Option<Arc<dyn EventSource>>,
    init_logging: bool,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            api: None,
            source: None,
            init_logging: true,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: QuipConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses this API client instead of building one.
    pub fn api(mut self, api: Arc<dyn WebApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Uses this event source instead of building one.
    pub fn event_source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Leaves logging setup to the caller.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads and validates the configuration, then builds the runtime.
    pub fn build(self) -> RuntimeResult<BotRuntime> {
        let config = self.config_loader.load()?;
        if self.init_logging {
            logging::init_from_config(&config.logging);
        }
        validate_config(&config)?;

        info!(
            log_level = %config.logging.level,
            ttl_secs = config.directory.ttl_secs,
            "Runtime initialized from configuration"
        );

        let api = match self.api {
            Some(api) => api,
            None => default_api(&config)?,
        };
        let source = match self.source {
            Some(source) => source,
            None => default_source(&config)?,
        };

        BotRuntime::new(config, api, source)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http-client")]
fn default_api(config: &QuipConfig) -> RuntimeResult<Arc<dyn WebApi>> {
    use quip_transport::http::WebClient;

    debug!("Using the HTTP Web API client");
    Ok(Arc::new(WebClient::new(config.bot.token.clone())))
}

#[cfg(not(feature = "http-client"))]
fn default_api(_config: &QuipConfig) -> RuntimeResult<Arc<dyn WebApi>> {
    Err(crate::error::RuntimeError::MissingCollaborator("Web API client"))
}

#[cfg(feature = "ws-client")]
fn default_source(config: &QuipConfig) -> RuntimeResult<Arc<dyn EventSource>> {
    use quip_transport::http::WebClient;
    use quip_transport::websocket::SocketModeClient;

    let app_token = config
        .bot
        .app_token
        .clone()
        .ok_or_else(|| crate::config::ConfigError::missing_field("bot.app_token"))?;

    debug!("Using the socket-mode event stream");
    let web = Arc::new(WebClient::new(config.bot.token.clone()));
    Ok(Arc::new(SocketModeClient::new(web, app_token)))
}

#[cfg(not(feature = "ws-client"))]
fn default_source(_config: &QuipConfig) -> RuntimeResult<Arc<dyn EventSource>> {
    Err(crate::error::RuntimeError::MissingCollaborator("event source"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quip_core::{
        ApiError, ApiMethod, ChannelEventSource, InboundEvent, InboundMessage, RecordingApi,
    };
    use quip_framework::{MessageExt, OutboundAction, ResponseError, Text, all, directed_at_bot};
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::RuntimeError;

    fn session() -> SessionInfo {
        SessionInfo {
            user_id: "UBOT".into(),
            team_name: "Acme".into(),
            ..Default::default()
        }
    }

    fn workspace() -> Arc<RecordingApi> {
        Arc::new(
            RecordingApi::new()
                .with_user("U1", "ada")
                .with_user("UBOT", "quip")
                .with_channel("C1", "general")
                .with_direct_conversation("D1", "U1"),
        )
    }

    fn runtime(api: &Arc<RecordingApi>) -> (BotRuntime, mpsc::Sender<InboundEvent>) {
        let (source, tx) = ChannelEventSource::new(session(), 16);
        let api: Arc<dyn WebApi> = api.clone();
        let runtime = BotRuntime::new(QuipConfig::default(), api, Arc::new(source)).unwrap();
        (runtime, tx)
    }

    fn message(channel: &str, user: &str, text: &str) -> InboundEvent {
        InboundEvent::from_value(json!({
            "type": "message", "ts": "10.1", "text": text, "user": user, "channel": channel
        }))
        .unwrap()
    }

    async fn greet(Text(rest): Text) -> String {
        format!("hi there{rest}")
    }

    #[tokio::test]
    async fn test_dispatches_until_stream_ends() {
        let api = workspace();
        let (mut runtime, tx) = runtime(&api);
        runtime.register_primary(directed_at_bot().starts_with(["hi"]), greet);

        tx.send(message("D1", "U1", "hi")).await.unwrap();
        tx.send(message("D1", "U1", "unrelated")).await.unwrap();
        drop(tx);

        runtime.start(|_| async {}).await.unwrap();

        let posted = api.posted_messages();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].channel, "D1");
        assert_eq!(posted[0].text, "hi there");
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_on_ready_runs_after_priming() {
        let api = workspace();
        let (runtime, tx) = runtime(&api);
        drop(tx);

        let mut seen = None;
        runtime
            .start(|session| {
                seen = Some((session.user_id, api.call_count(ApiMethod::ListUsers)));
                async {}
            })
            .await
            .unwrap();

        assert_eq!(seen, Some(("UBOT".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_priming_failure_is_fatal() {
        let api = Arc::new(RecordingApi::new().fail_on(
            ApiMethod::ListChannels,
            ApiError::platform("conversations.list", "invalid_auth"),
        ));
        let (runtime, _tx) = runtime(&api);

        let mut ready = false;
        let result = runtime
            .start(|_| {
                ready = true;
                async {}
            })
            .await;

        assert!(matches!(result, Err(RuntimeError::Api(_))));
        assert!(!ready);
    }

    #[tokio::test]
    async fn test_filters_bot_and_ignored_subtypes() {
        let api = workspace();
        let (mut runtime, tx) = runtime(&api);
        runtime.register_primary(all(), || async { "echo" });

        tx.send(message("C1", "UBOT", "from myself")).await.unwrap();
        tx.send(
            InboundEvent::from_value(json!({
                "type": "message", "subtype": "message_changed", "ts": "10.2", "channel": "C1"
            }))
            .unwrap(),
        )
        .await
        .unwrap();
        tx.send(InboundEvent::Unsupported).await.unwrap();
        drop(tx);

        runtime.start(|_| async {}).await.unwrap();
        assert!(api.posted_messages().is_empty());
    }

    #[tokio::test]
    async fn test_handler_error_becomes_ephemeral() {
        let api = workspace();
        let (mut runtime, tx) = runtime(&api);
        runtime.register_primary(all(), || async {
            Err::<OutboundAction, _>(ResponseError::message("boom"))
        });

        tx.send(message("C1", "U1", "anything")).await.unwrap();
        drop(tx);
        runtime.start(|_| async {}).await.unwrap();

        let ephemerals = api.ephemeral_messages();
        assert_eq!(ephemerals.len(), 1);
        assert_eq!(ephemerals[0].user, "U1");
        assert!(ephemerals[0].text.contains("boom"));
        assert!(api.posted_messages().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_stops_and_drains() {
        let api = workspace();
        let (mut runtime, tx) = runtime(&api);
        let started = Arc::new(tokio::sync::Notify::new());
        let handler_started = Arc::clone(&started);
        runtime.register_primary(all(), move |msg: Arc<InboundMessage>| {
            let started = Arc::clone(&handler_started);
            async move {
                started.notify_one();
                tokio::time::sleep(Duration::from_millis(20)).await;
                msg.reply("late but delivered")
            }
        });

        let token = runtime.shutdown_token();
        tx.send(message("C1", "U1", "go")).await.unwrap();

        runtime
            .run_until(|_| async {}, async move { started.notified().await })
            .await
            .unwrap();

        assert!(token.is_cancelled());
        assert_eq!(api.posted_messages().len(), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_letter_map_from_config() {
        let api = workspace();
        let (source, _tx) = ChannelEventSource::new(session(), 1);
        let mut config = QuipConfig::default();
        config.letters = Some(
            [("ab".to_string(), LetterEmojis::Flat(vec!["x".into()]))]
                .into_iter()
                .collect(),
        );

        let result = BotRuntime::new(config, api, Arc::new(source));
        assert!(matches!(result, Err(RuntimeError::LetterMap(_))));
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let api = workspace();
        let (source, _tx) = ChannelEventSource::new(session(), 1);

        // The inner source is never started, so reading from it fails.
        struct Unstarted(ChannelEventSource);

        #[async_trait::async_trait]
        impl EventSource for Unstarted {
            async fn start_session(&self) -> quip_core::TransportResult<SessionInfo> {
                Ok(session())
            }
            async fn next_event(&self) -> quip_core::TransportResult<Option<InboundEvent>> {
                self.0.next_event().await
            }
        }

        let runtime =
            BotRuntime::new(QuipConfig::default(), api, Arc::new(Unstarted(source))).unwrap();
        let result = runtime.start(|_| async {}).await;
        assert!(matches!(result, Err(RuntimeError::Transport(_))));
    }

    #[test]
    fn test_builder_rejects_missing_token() {
        let api: Arc<dyn WebApi> = workspace();
        let (source, _tx) = ChannelEventSource::new(session(), 1);

        let result = BotRuntime::builder()
            .search_path(std::env::temp_dir().join("quip-runtime-no-config"))
            .without_env()
            .without_logging()
            .api(api)
            .event_source(Arc::new(source))
            .build();

        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }
}
