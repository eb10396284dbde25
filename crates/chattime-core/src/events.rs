//! Broadcast event types
//!
//! All state changes observable by listeners are described by the tagged
//! `AppEvent` enum. Events are published to a per-user channel, the shared
//! operator channel, or both; the payload carries everything a listener
//! needs so no event requires a follow-up read.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{ChatRole, TopUpRequest};
use crate::types::{Amount, SessionId, Timestamp, UserId};

// ----------------------------------------------------------------------------
// Stop Reasons
// ----------------------------------------------------------------------------

/// Why a session transitioned from active to idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// The client ended the session
    ClientRequested,
    /// An operator forced the session closed
    AdminCleared,
    /// The billing clock found the wallet empty
    BalanceExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::ClientRequested => write!(f, "client-requested"),
            StopReason::AdminCleared => write!(f, "admin-cleared"),
            StopReason::BalanceExhausted => write!(f, "balance-exhausted"),
        }
    }
}

// ----------------------------------------------------------------------------
// Application Events
// ----------------------------------------------------------------------------

/// Events published through the broadcast hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    /// A wallet balance changed outside the billing clock (top-up credit)
    BalanceUpdated { user_id: UserId, balance: Amount },
    /// The billing clock deducted one billing unit
    BillingTick {
        user_id: UserId,
        session_id: SessionId,
        balance: Amount,
        billed_units: u64,
    },
    /// A session transitioned to active
    SessionStarted {
        user_id: UserId,
        session_id: SessionId,
    },
    /// A session transitioned to idle
    SessionStopped {
        user_id: UserId,
        session_id: SessionId,
        reason: StopReason,
    },
    /// A client submitted a new top-up request
    TopUpSubmitted { request: TopUpRequest },
    /// An operator approved or rejected a top-up request
    TopUpResolved { request: TopUpRequest },
    /// A chat message was recorded
    ChatMessage {
        user_id: UserId,
        session_id: SessionId,
        sender: ChatRole,
        text: String,
        sent_at: Timestamp,
    },
    /// Message history of a session was deleted
    ChatCleared {
        user_id: UserId,
        session_id: SessionId,
    },
    /// A client rated a session
    RatingSubmitted {
        user_id: UserId,
        session_id: SessionId,
        stars: u8,
    },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
