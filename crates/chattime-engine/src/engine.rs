//! Engine facade and builder
//!
//! `ChatEngine` wires the ledger, top-up desk, session manager, message
//! router, and broadcast hub over one storage backend, and exposes the
//! operations a caller-facing layer (HTTP/WS, CLI) maps onto.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use chattime_core::{
    Amount, AppEvent, ChatMessage, ChattimeResult, EngineConfig, MemoryStore, SessionId,
    SessionRating, StopReason, Storage, SystemTimeSource, TimeSource, TopUpId, TopUpRequest,
    User, UserId, Wallet,
};

use crate::hub::BroadcastHub;
use crate::ledger::Ledger;
use crate::router::MessageRouter;
use crate::session::{SessionManager, SessionStatus};
use crate::topup::TopUpDesk;

// ----------------------------------------------------------------------------
// Engine Builder
// ----------------------------------------------------------------------------

/// Builder-style construction for [`ChatEngine`]
pub struct EngineBuilder<T: TimeSource = SystemTimeSource> {
    config: EngineConfig,
    store: Option<Arc<dyn Storage>>,
    time_source: T,
}

impl EngineBuilder<SystemTimeSource> {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            store: None,
            time_source: SystemTimeSource,
        }
    }
}

impl Default for EngineBuilder<SystemTimeSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeSource + Clone + Send + Sync + 'static> EngineBuilder<T> {
    /// Set the engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the storage backend. Defaults to an in-memory store.
    pub fn with_store(mut self, store: Arc<dyn Storage>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the time source, e.g. with a fixed clock in tests
    pub fn with_time_source<U: TimeSource + Clone + Send + Sync + 'static>(
        self,
        time_source: U,
    ) -> EngineBuilder<U> {
        EngineBuilder {
            config: self.config,
            store: self.store,
            time_source,
        }
    }

    /// Build the engine
    pub fn build(self) -> ChatEngine<T> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Storage>);
        let hub = Arc::new(BroadcastHub::new(self.config.hub.clone()));
        let ledger = Arc::new(Ledger::new(Arc::clone(&store), Arc::clone(&hub)));
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            Arc::clone(&ledger),
            self.config.billing.clone(),
            self.time_source.clone(),
        ));
        let top_ups = TopUpDesk::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            Arc::clone(&ledger),
            self.config.billing.clone(),
            self.time_source.clone(),
        );
        let router = MessageRouter::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            Arc::clone(&sessions),
            self.config.billing.clone(),
            self.time_source.clone(),
        );

        info!("chat engine assembled");
        ChatEngine {
            config: self.config,
            store,
            hub,
            ledger,
            top_ups,
            sessions,
            router,
            time_source: self.time_source,
        }
    }
}

// ----------------------------------------------------------------------------
// Chat Engine
// ----------------------------------------------------------------------------

/// The metered chat session billing engine
pub struct ChatEngine<T: TimeSource = SystemTimeSource> {
    config: EngineConfig,
    store: Arc<dyn Storage>,
    hub: Arc<BroadcastHub>,
    ledger: Arc<Ledger>,
    top_ups: TopUpDesk<T>,
    sessions: Arc<SessionManager<T>>,
    router: MessageRouter<T>,
    time_source: T,
}

impl<T: TimeSource + Clone + Send + Sync + 'static> ChatEngine<T> {
    pub fn builder() -> EngineBuilder<SystemTimeSource> {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Users and wallets
    // ------------------------------------------------------------------------

    /// Register a user with a fresh wallet
    pub async fn register_user<N: Into<String>>(&self, name: N) -> ChattimeResult<User> {
        let user = User::new(name, self.time_source.now());
        self.store.insert_user(user.clone()).await?;
        self.store
            .put_wallet(Wallet::new(user.id, self.config.billing.initial_balance))
            .await?;
        info!(user_id = %user.id, name = %user.name, "user registered");
        Ok(user)
    }

    /// Current wallet balance
    pub async fn balance(&self, user_id: UserId) -> ChattimeResult<Amount> {
        self.ledger.balance(user_id).await
    }

    // ------------------------------------------------------------------------
    // Top-ups
    // ------------------------------------------------------------------------

    pub async fn submit_top_up(
        &self,
        user_id: UserId,
        amount: Amount,
        reference: &str,
        note: Option<String>,
    ) -> ChattimeResult<TopUpRequest> {
        self.top_ups.submit(user_id, amount, reference, note).await
    }

    pub async fn approve_top_up(&self, id: TopUpId) -> ChattimeResult<TopUpRequest> {
        self.top_ups.approve(id).await
    }

    pub async fn reject_top_up(
        &self,
        id: TopUpId,
        reason: Option<String>,
    ) -> ChattimeResult<TopUpRequest> {
        self.top_ups.reject(id, reason).await
    }

    pub async fn top_ups_for(&self, user_id: UserId) -> ChattimeResult<Vec<TopUpRequest>> {
        self.top_ups.for_user(user_id).await
    }

    pub async fn pending_top_ups(&self) -> ChattimeResult<Vec<TopUpRequest>> {
        self.top_ups.pending().await
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    pub async fn start_session(&self, user_id: UserId) -> ChattimeResult<SessionId> {
        Arc::clone(&self.sessions).start(user_id).await
    }

    pub async fn stop_session(
        &self,
        user_id: UserId,
        reason: StopReason,
    ) -> ChattimeResult<()> {
        self.sessions.stop(user_id, reason).await
    }

    pub async fn clear_chat(&self, user_id: UserId) -> ChattimeResult<SessionId> {
        self.sessions.clear(user_id).await
    }

    pub async fn session_status(&self, user_id: UserId) -> ChattimeResult<SessionStatus> {
        self.sessions.status(user_id).await
    }

    pub async fn submit_rating(
        &self,
        user_id: UserId,
        stars: u8,
        feedback: Option<String>,
    ) -> ChattimeResult<SessionRating> {
        self.sessions.rate(user_id, stars, feedback).await
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    pub async fn send_client_message(
        &self,
        user_id: UserId,
        text: &str,
    ) -> ChattimeResult<ChatMessage> {
        self.router.send_client_message(user_id, text).await
    }

    pub async fn send_admin_message(
        &self,
        user_id: UserId,
        text: &str,
    ) -> ChattimeResult<ChatMessage> {
        self.router.send_admin_message(user_id, text).await
    }

    pub async fn chat_history(&self, user_id: UserId) -> ChattimeResult<Vec<ChatMessage>> {
        self.router.history(user_id).await
    }

    // ------------------------------------------------------------------------
    // Event streams
    // ------------------------------------------------------------------------

    /// Listen to the events addressed to one user
    pub fn subscribe_user(&self, user_id: UserId) -> broadcast::Receiver<AppEvent> {
        self.hub.subscribe_user(user_id)
    }

    /// Listen to the shared operator channel
    pub fn subscribe_operator(&self) -> broadcast::Receiver<AppEvent> {
        self.hub.subscribe_operator()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Stop every live session so no billing clock outlives the engine
    pub async fn shutdown(&self) {
        info!("chat engine shutting down");
        self.sessions.stop_all(StopReason::AdminCleared).await;
    }
}
