//! Chattime Core API Definitions
//!
//! This crate provides the foundational types for the chattime metered chat
//! billing engine: entity models, tagged broadcast events, configuration,
//! the unified error type, and the storage abstraction. The engine that
//! operates on these definitions lives in `chattime-engine`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod storage;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{BillingConfig, EngineConfig, HubConfig};
pub use errors::{
    ChattimeError, ChattimeResult, LedgerError, Result, SessionError, StorageError, TopUpError,
    ValidationError,
};
pub use events::{AppEvent, StopReason};
pub use models::{
    ChatMessage, ChatRole, ChatSession, SessionRating, TopUpRequest, TopUpStatus, User, Wallet,
};
pub use storage::{MemoryStore, Storage};
pub use types::{
    Amount, SessionId, SystemTimeSource, TimeSource, Timestamp, TopUpId, UserId,
};
