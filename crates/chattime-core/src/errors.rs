//! Error types for the chattime engine
//!
//! This module contains all error types used throughout the engine, including
//! validation errors, ledger errors, top-up workflow errors, session errors,
//! storage errors, and the main ChattimeError type that unifies them all.

use crate::models::TopUpStatus;
use crate::types::Amount;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Caller-fault input errors, reported synchronously with no state change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Amount {amount} is below the minimum recharge of {minimum}")]
    AmountBelowMinimum { amount: Amount, minimum: Amount },
    #[error("Payment reference must be at least {minimum} characters (got {length})")]
    ReferenceTooShort { length: usize, minimum: usize },
    #[error("Message text is empty")]
    EmptyMessage,
    #[error("Message text is too long: {length} characters (max {maximum})")]
    MessageTooLong { length: usize, maximum: usize },
    #[error("Rating must be between 1 and 5 stars (got {stars})")]
    StarsOutOfRange { stars: u8 },
    #[error("Invalid {entity} identifier: {value}")]
    InvalidIdentifier {
        entity: &'static str,
        value: String,
    },
}

/// Wallet ledger errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Amount, required: Amount },
    #[error("No wallet exists for user {user_id}")]
    UnknownWallet { user_id: String },
}

/// Top-up workflow errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopUpError {
    #[error("Top-up request not found: {id}")]
    NotFound { id: String },
    #[error("Top-up request {id} is already resolved as {status}")]
    AlreadyResolved { id: String, status: TopUpStatus },
}

/// Session state machine and message routing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Unknown user: {user_id}")]
    UnknownUser { user_id: String },
    #[error("No active session for user {user_id}")]
    NotActive { user_id: String },
    #[error("User {user_id} has no session history")]
    NoHistory { user_id: String },
}

/// Persistence layer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend error: {reason}")]
    Backend { reason: String },
    #[error("Storage lock poisoned")]
    LockPoisoned,
    #[error("Missing {entity} row: {id}")]
    MissingRow { entity: &'static str, id: String },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error type for the chattime engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChattimeError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Top-up error: {0}")]
    TopUp(#[from] TopUpError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl ChattimeError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(balance: Amount, required: Amount) -> Self {
        ChattimeError::Ledger(LedgerError::InsufficientFunds { balance, required })
    }

    /// Create an unknown wallet error
    pub fn unknown_wallet<U: ToString>(user_id: U) -> Self {
        ChattimeError::Ledger(LedgerError::UnknownWallet {
            user_id: user_id.to_string(),
        })
    }

    /// Create a top-up not found error
    pub fn top_up_not_found<I: ToString>(id: I) -> Self {
        ChattimeError::TopUp(TopUpError::NotFound { id: id.to_string() })
    }

    /// Create an already resolved error
    pub fn already_resolved<I: ToString>(id: I, status: TopUpStatus) -> Self {
        ChattimeError::TopUp(TopUpError::AlreadyResolved {
            id: id.to_string(),
            status,
        })
    }

    /// Create an unknown user error
    pub fn unknown_user<U: ToString>(user_id: U) -> Self {
        ChattimeError::Session(SessionError::UnknownUser {
            user_id: user_id.to_string(),
        })
    }

    /// Create a no active session error
    pub fn not_active<U: ToString>(user_id: U) -> Self {
        ChattimeError::Session(SessionError::NotActive {
            user_id: user_id.to_string(),
        })
    }

    /// Create a no session history error
    pub fn no_history<U: ToString>(user_id: U) -> Self {
        ChattimeError::Session(SessionError::NoHistory {
            user_id: user_id.to_string(),
        })
    }

    /// Whether this error is a failed debit due to insufficient funds.
    ///
    /// The billing clock uses this to distinguish "end the session" from
    /// "retry on the next tick".
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            ChattimeError::Ledger(LedgerError::InsufficientFunds { .. })
        )
    }

    /// Whether this error originated in the persistence layer
    pub fn is_storage(&self) -> bool {
        matches!(self, ChattimeError::Storage(_))
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ChattimeError>;
pub type ChattimeResult<T> = Result<T>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
