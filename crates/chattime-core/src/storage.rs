//! Storage abstraction and in-memory implementation
//!
//! The engine talks to persistence exclusively through the [`Storage`] trait
//! so the billing and workflow logic stays independent of any concrete
//! backend. [`MemoryStore`] is the bundled implementation; it also backs the
//! test suites.
//!
//! Trait methods return `Result<_, StorageError>` even where the in-memory
//! backend cannot fail, because callers must handle a fallible backend:
//! a storage failure during a billing tick is retried on the next tick, and
//! a failure anywhere else is reported to the caller without leaving a
//! partial mutation visible.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::models::{ChatMessage, ChatSession, SessionRating, TopUpRequest, User, Wallet};
use crate::types::{SessionId, TopUpId, UserId};

// ----------------------------------------------------------------------------
// Storage Trait
// ----------------------------------------------------------------------------

/// Persistence operations for users, wallets, top-ups, sessions, messages,
/// and ratings.
///
/// Lookups return `Ok(None)` for absent rows; updates of absent rows fail
/// with [`StorageError::MissingRow`]. Concurrency control (per-user and
/// per-request serialization) is the engine's responsibility, not the
/// store's.
#[async_trait]
pub trait Storage: Send + Sync {
    // Users and wallets
    async fn insert_user(&self, user: User) -> Result<(), StorageError>;
    async fn user(&self, id: UserId) -> Result<Option<User>, StorageError>;
    async fn wallet(&self, user_id: UserId) -> Result<Option<Wallet>, StorageError>;
    async fn put_wallet(&self, wallet: Wallet) -> Result<(), StorageError>;

    // Top-up requests
    async fn insert_top_up(&self, request: TopUpRequest) -> Result<(), StorageError>;
    async fn top_up(&self, id: TopUpId) -> Result<Option<TopUpRequest>, StorageError>;
    async fn update_top_up(&self, request: TopUpRequest) -> Result<(), StorageError>;
    async fn top_ups_for(&self, user_id: UserId) -> Result<Vec<TopUpRequest>, StorageError>;
    async fn pending_top_ups(&self) -> Result<Vec<TopUpRequest>, StorageError>;

    // Chat sessions
    async fn insert_session(&self, session: ChatSession) -> Result<(), StorageError>;
    async fn session(&self, id: SessionId) -> Result<Option<ChatSession>, StorageError>;
    async fn update_session(&self, session: ChatSession) -> Result<(), StorageError>;
    async fn latest_session(&self, user_id: UserId) -> Result<Option<ChatSession>, StorageError>;

    // Messages
    async fn insert_message(&self, message: ChatMessage) -> Result<(), StorageError>;
    async fn messages(&self, session_id: SessionId) -> Result<Vec<ChatMessage>, StorageError>;
    async fn delete_messages(&self, session_id: SessionId) -> Result<usize, StorageError>;

    // Ratings
    async fn insert_rating(&self, rating: SessionRating) -> Result<(), StorageError>;
}

// ----------------------------------------------------------------------------
// In-Memory Store
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    wallets: HashMap<UserId, Wallet>,
    top_ups: HashMap<TopUpId, TopUpRequest>,
    /// Submission order, for stable listings
    top_up_order: Vec<TopUpId>,
    sessions: HashMap<SessionId, ChatSession>,
    /// Start order per user; the last entry is the most recent session
    sessions_by_user: HashMap<UserId, Vec<SessionId>>,
    messages: HashMap<SessionId, Vec<ChatMessage>>,
    ratings: Vec<SessionRating>,
}

/// Hash-map backed store. Cheap to clone handles around via `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables.write().map_err(|_| StorageError::LockPoisoned)
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        tables.users.insert(user.id, user);
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn wallet(&self, user_id: UserId) -> Result<Option<Wallet>, StorageError> {
        Ok(self.read()?.wallets.get(&user_id).copied())
    }

    async fn put_wallet(&self, wallet: Wallet) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        tables.wallets.insert(wallet.user_id, wallet);
        Ok(())
    }

    async fn insert_top_up(&self, request: TopUpRequest) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        tables.top_up_order.push(request.id);
        tables.top_ups.insert(request.id, request);
        Ok(())
    }

    async fn top_up(&self, id: TopUpId) -> Result<Option<TopUpRequest>, StorageError> {
        Ok(self.read()?.top_ups.get(&id).cloned())
    }

    async fn update_top_up(&self, request: TopUpRequest) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        match tables.top_ups.get_mut(&request.id) {
            Some(row) => {
                *row = request;
                Ok(())
            }
            None => Err(StorageError::MissingRow {
                entity: "top-up",
                id: request.id.to_string(),
            }),
        }
    }

    async fn top_ups_for(&self, user_id: UserId) -> Result<Vec<TopUpRequest>, StorageError> {
        let tables = self.read()?;
        Ok(tables
            .top_up_order
            .iter()
            .filter_map(|id| tables.top_ups.get(id))
            .filter(|request| request.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn pending_top_ups(&self) -> Result<Vec<TopUpRequest>, StorageError> {
        let tables = self.read()?;
        Ok(tables
            .top_up_order
            .iter()
            .filter_map(|id| tables.top_ups.get(id))
            .filter(|request| request.is_pending())
            .cloned()
            .collect())
    }

    async fn insert_session(&self, session: ChatSession) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        tables
            .sessions_by_user
            .entry(session.user_id)
            .or_default()
            .push(session.id);
        tables.sessions.insert(session.id, session);
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Option<ChatSession>, StorageError> {
        Ok(self.read()?.sessions.get(&id).cloned())
    }

    async fn update_session(&self, session: ChatSession) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        match tables.sessions.get_mut(&session.id) {
            Some(row) => {
                *row = session;
                Ok(())
            }
            None => Err(StorageError::MissingRow {
                entity: "session",
                id: session.id.to_string(),
            }),
        }
    }

    async fn latest_session(&self, user_id: UserId) -> Result<Option<ChatSession>, StorageError> {
        let tables = self.read()?;
        Ok(tables
            .sessions_by_user
            .get(&user_id)
            .and_then(|ids| ids.last())
            .and_then(|id| tables.sessions.get(id))
            .cloned())
    }

    async fn insert_message(&self, message: ChatMessage) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        tables
            .messages
            .entry(message.session_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn messages(&self, session_id: SessionId) -> Result<Vec<ChatMessage>, StorageError> {
        Ok(self
            .read()?
            .messages
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_messages(&self, session_id: SessionId) -> Result<usize, StorageError> {
        let mut tables = self.write()?;
        Ok(tables
            .messages
            .remove(&session_id)
            .map(|messages| messages.len())
            .unwrap_or(0))
    }

    async fn insert_rating(&self, rating: SessionRating) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        tables.ratings.push(rating);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
