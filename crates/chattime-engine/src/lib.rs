//! Chattime Runtime Engine
//!
//! This crate contains the runtime engine for chattime, including:
//! - `ChatEngine`: the facade wiring every component over one storage backend
//! - `Ledger`: serialized per-user wallet credit/debit
//! - `TopUpDesk`: submission and operator resolution of funding requests
//! - `SessionManager`: session state machine and per-session billing clocks
//! - `MessageRouter`: client/operator message delivery
//! - `BroadcastHub`: per-user and operator event fan-out
//!
//! This is the "engine" of chattime; `chattime-core` provides the stable
//! API definitions it operates on.

pub mod engine;
pub mod hub;
pub mod ledger;
pub mod router;
pub mod session;
pub mod topup;

pub use engine::{ChatEngine, EngineBuilder};
pub use hub::BroadcastHub;
pub use ledger::Ledger;
pub use router::MessageRouter;
pub use session::{SessionManager, SessionStatus};
pub use topup::TopUpDesk;

// Re-export core types for convenience
pub use chattime_core::{
    Amount, AppEvent, BillingConfig, ChatMessage, ChatRole, ChatSession, ChattimeError,
    ChattimeResult, EngineConfig, HubConfig, MemoryStore, SessionId, SessionRating, StopReason,
    Storage, SystemTimeSource, TimeSource, Timestamp, TopUpId, TopUpRequest, TopUpStatus, User,
    UserId, Wallet,
};
