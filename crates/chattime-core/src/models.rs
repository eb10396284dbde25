//! Persisted entity models
//!
//! Users, wallets, top-up requests, chat sessions, messages, and session
//! ratings. These are the only durable records in the system; live billing
//! timers are ephemeral and never persisted.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Amount, SessionId, Timestamp, TopUpId, UserId};

// ----------------------------------------------------------------------------
// User and Wallet
// ----------------------------------------------------------------------------

/// A registered user. Immutable after creation; the name is cosmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub created_at: Timestamp,
}

impl User {
    pub fn new<N: Into<String>>(name: N, now: Timestamp) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            created_at: now,
        }
    }
}

/// Wallet balance in minor currency units. Exactly one per user.
///
/// The balance is mutated only through the ledger's credit and debit
/// operations and can never go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Amount,
}

impl Wallet {
    pub fn new(user_id: UserId, balance: Amount) -> Self {
        Self { user_id, balance }
    }
}

// ----------------------------------------------------------------------------
// Top-Up Requests
// ----------------------------------------------------------------------------

/// Lifecycle state of a top-up request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopUpStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for TopUpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopUpStatus::Pending => write!(f, "pending"),
            TopUpStatus::Approved => write!(f, "approved"),
            TopUpStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A client-submitted funding request, attested by an external payment
/// reference and resolved exactly once by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub id: TopUpId,
    pub user_id: UserId,
    pub amount: Amount,
    /// Opaque payment attestation string (e.g. a UTR code)
    pub reference: String,
    pub note: Option<String>,
    pub status: TopUpStatus,
    /// Set iff the request was rejected
    pub reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TopUpRequest {
    pub fn new<R: Into<String>>(
        user_id: UserId,
        amount: Amount,
        reference: R,
        note: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: TopUpId::new(),
            user_id,
            amount,
            reference: reference.into(),
            note,
            status: TopUpStatus::Pending,
            reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TopUpStatus::Pending
    }

    /// Transition to approved. Only valid on a pending request.
    pub fn mark_approved(&mut self, now: Timestamp) {
        debug_assert!(self.is_pending());
        self.status = TopUpStatus::Approved;
        self.updated_at = now;
    }

    /// Transition to rejected with a reason. Only valid on a pending request.
    pub fn mark_rejected<R: Into<String>>(&mut self, reason: R, now: Timestamp) {
        debug_assert!(self.is_pending());
        self.status = TopUpStatus::Rejected;
        self.reason = Some(reason.into());
        self.updated_at = now;
    }
}

// ----------------------------------------------------------------------------
// Chat Sessions and Messages
// ----------------------------------------------------------------------------

/// A bounded period of client/operator conversation with the billing clock
/// running. Rows are retained after stop; a fresh start creates a new row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub active: bool,
    pub started_at: Timestamp,
    pub stopped_at: Option<Timestamp>,
    /// Last-billed boundary: number of billing units already deducted
    pub billed_units: u64,
}

impl ChatSession {
    pub fn new(user_id: UserId, now: Timestamp) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            active: true,
            started_at: now,
            stopped_at: None,
            billed_units: 0,
        }
    }

    /// Transition to stopped. Idempotent.
    pub fn mark_stopped(&mut self, now: Timestamp) {
        if self.active {
            self.active = false;
            self.stopped_at = Some(now);
        }
    }
}

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Client,
    Admin,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::Client => write!(f, "client"),
            ChatRole::Admin => write!(f, "admin"),
        }
    }
}

/// A chat message, always attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub session_id: SessionId,
    pub sender: ChatRole,
    pub text: String,
    pub created_at: Timestamp,
}

impl ChatMessage {
    pub fn new<T: Into<String>>(
        session_id: SessionId,
        sender: ChatRole,
        text: T,
        now: Timestamp,
    ) -> Self {
        Self {
            session_id,
            sender,
            text: text.into(),
            created_at: now,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Ratings
// ----------------------------------------------------------------------------

/// Client feedback left after a session ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRating {
    pub session_id: SessionId,
    /// 1 to 5
    pub stars: u8,
    pub feedback: Option<String>,
    pub created_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn test_top_up_lifecycle() {
        let mut request = TopUpRequest::new(UserId::new(), 50, "UTR123456", None, at(1));
        assert!(request.is_pending());
        assert_eq!(request.reason, None);

        request.mark_rejected("reference mismatch", at(2));
        assert_eq!(request.status, TopUpStatus::Rejected);
        assert_eq!(request.reason.as_deref(), Some("reference mismatch"));
        assert_eq!(request.updated_at, at(2));
    }

    #[test]
    fn test_session_stop_is_idempotent() {
        let mut session = ChatSession::new(UserId::new(), at(10));
        assert!(session.active);

        session.mark_stopped(at(20));
        assert!(!session.active);
        assert_eq!(session.stopped_at, Some(at(20)));

        // A second stop must not move the stop time
        session.mark_stopped(at(30));
        assert_eq!(session.stopped_at, Some(at(20)));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TopUpStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }
}
