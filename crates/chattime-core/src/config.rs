//! Centralized configuration management
//!
//! All billing tunables live in one place. The reference behavior bills one
//! unit of 10 per 60 seconds of active session time and accepts recharges of
//! 10 or more.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Amount;

// ----------------------------------------------------------------------------
// Billing Configuration
// ----------------------------------------------------------------------------

/// Configuration for wallet metering and input limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Amount deducted per billing period of active session time
    pub billing_unit_cost: Amount,
    /// Wall-clock length of one billing unit
    pub billing_period: Duration,
    /// Smallest top-up amount a client may submit
    pub minimum_recharge: Amount,
    /// Minimum length of a payment reference string
    pub min_reference_len: usize,
    /// Maximum chat message length, in characters
    pub max_message_len: usize,
    /// Rejection reasons are truncated to this length
    pub max_reason_len: usize,
    /// Balance granted to a freshly registered wallet
    pub initial_balance: Amount,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            billing_unit_cost: 10,
            billing_period: Duration::from_secs(60),
            minimum_recharge: 10,
            min_reference_len: 6,
            max_message_len: 500,
            max_reason_len: 200,
            initial_balance: 0,
        }
    }
}

impl BillingConfig {
    /// Reason recorded when an operator rejects without giving one
    pub const DEFAULT_REJECT_REASON: &'static str = "Payment could not be verified";
}

// ----------------------------------------------------------------------------
// Hub Configuration
// ----------------------------------------------------------------------------

/// Buffer capacities for the broadcast hub channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Buffer size for each per-user channel
    pub user_channel_capacity: usize,
    /// Buffer size for the shared operator channel
    pub operator_channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            user_channel_capacity: 64,     // one user's events are sparse
            operator_channel_capacity: 256, // the operator channel aggregates all users
        }
    }
}

// ----------------------------------------------------------------------------
// Engine Configuration
// ----------------------------------------------------------------------------

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub billing: BillingConfig,
    pub hub: HubConfig,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
