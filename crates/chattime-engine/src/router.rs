//! Message router
//!
//! Delivers chat messages between a client and the operator pool. Client
//! sends are gated on an active session; operator replies are allowed
//! against the user's most recent session even after it went idle, so the
//! operator can have a final word. Every recorded message fans out to the
//! user's channel (multi-device echo) and the operator channel.

use std::sync::Arc;

use tracing::debug;

use chattime_core::{
    AppEvent, BillingConfig, ChatMessage, ChatRole, ChattimeError, ChattimeResult, Storage,
    TimeSource, UserId, ValidationError,
};

use crate::hub::BroadcastHub;
use crate::session::SessionManager;

// ----------------------------------------------------------------------------
// Message Router
// ----------------------------------------------------------------------------

pub struct MessageRouter<T: TimeSource> {
    store: Arc<dyn Storage>,
    hub: Arc<BroadcastHub>,
    sessions: Arc<SessionManager<T>>,
    config: BillingConfig,
    time_source: T,
}

impl<T: TimeSource + Send + Sync + 'static> MessageRouter<T> {
    pub fn new(
        store: Arc<dyn Storage>,
        hub: Arc<BroadcastHub>,
        sessions: Arc<SessionManager<T>>,
        config: BillingConfig,
        time_source: T,
    ) -> Self {
        Self {
            store,
            hub,
            sessions,
            config,
            time_source,
        }
    }

    /// Record and deliver a message from the client. Rejected when the user
    /// has no active session.
    pub async fn send_client_message(
        &self,
        user_id: UserId,
        text: &str,
    ) -> ChattimeResult<ChatMessage> {
        let text = self.validated(text)?;
        let session_id = self
            .sessions
            .active_session_id(user_id)
            .ok_or_else(|| ChattimeError::not_active(user_id))?;
        self.record(user_id, session_id, ChatRole::Client, text).await
    }

    /// Record and deliver an operator reply against the user's most recent
    /// session, active or not. Rejected only when the user has no session
    /// history at all.
    pub async fn send_admin_message(
        &self,
        user_id: UserId,
        text: &str,
    ) -> ChattimeResult<ChatMessage> {
        let text = self.validated(text)?;
        let session = self
            .store
            .latest_session(user_id)
            .await?
            .ok_or_else(|| ChattimeError::no_history(user_id))?;
        self.record(user_id, session.id, ChatRole::Admin, text).await
    }

    /// Message history of the user's most recent session, oldest first
    pub async fn history(&self, user_id: UserId) -> ChattimeResult<Vec<ChatMessage>> {
        let session = self
            .store
            .latest_session(user_id)
            .await?
            .ok_or_else(|| ChattimeError::no_history(user_id))?;
        Ok(self.store.messages(session.id).await?)
    }

    fn validated<'t>(&self, text: &'t str) -> ChattimeResult<&'t str> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let length = text.chars().count();
        if length > self.config.max_message_len {
            return Err(ValidationError::MessageTooLong {
                length,
                maximum: self.config.max_message_len,
            }
            .into());
        }
        Ok(text)
    }

    async fn record(
        &self,
        user_id: UserId,
        session_id: chattime_core::SessionId,
        sender: ChatRole,
        text: &str,
    ) -> ChattimeResult<ChatMessage> {
        let message = ChatMessage::new(session_id, sender, text, self.time_source.now());
        self.store.insert_message(message.clone()).await?;

        debug!(%user_id, %session_id, %sender, "message recorded");
        self.hub.publish_both(
            user_id,
            AppEvent::ChatMessage {
                user_id,
                session_id,
                sender,
                text: message.text.clone(),
                sent_at: message.created_at,
            },
        );
        Ok(message)
    }
}
