//! Wallet ledger
//!
//! Atomic credit and debit against per-user wallet balances. Every
//! read-modify-write on one user's wallet runs under that user's mutex, so a
//! top-up approval and a billing tick for the same user can never interleave.
//! There is no global lock: two users' operations proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use chattime_core::{
    Amount, AppEvent, ChattimeError, ChattimeResult, Storage, UserId, Wallet,
};

use crate::hub::BroadcastHub;

// ----------------------------------------------------------------------------
// Ledger
// ----------------------------------------------------------------------------

/// Serialized wallet mutations over the storage layer
pub struct Ledger {
    store: Arc<dyn Storage>,
    hub: Arc<BroadcastHub>,
    /// Per-user serialization points; entries live as long as the process
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Storage>, hub: Arc<BroadcastHub>) -> Self {
        Self {
            store,
            hub,
            locks: DashMap::new(),
        }
    }

    fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Current balance. Read-only, no serialization needed.
    pub async fn balance(&self, user_id: UserId) -> ChattimeResult<Amount> {
        let wallet = self
            .store
            .wallet(user_id)
            .await?
            .ok_or_else(|| ChattimeError::unknown_wallet(user_id))?;
        Ok(wallet.balance)
    }

    /// Add funds to a wallet and broadcast the new balance to its owner.
    pub async fn credit(&self, user_id: UserId, amount: Amount) -> ChattimeResult<Amount> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let wallet = self
            .store
            .wallet(user_id)
            .await?
            .ok_or_else(|| ChattimeError::unknown_wallet(user_id))?;
        let balance = wallet.balance.saturating_add(amount);
        self.store.put_wallet(Wallet::new(user_id, balance)).await?;

        debug!(%user_id, amount, balance, "wallet credited");
        self.hub
            .publish_user(user_id, AppEvent::BalanceUpdated { user_id, balance });
        Ok(balance)
    }

    /// Remove funds from a wallet.
    ///
    /// Fails with `InsufficientFunds` and leaves the balance untouched when
    /// the wallet cannot cover `amount`; the billing clock turns that
    /// failure into session termination.
    pub async fn debit(&self, user_id: UserId, amount: Amount) -> ChattimeResult<Amount> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let wallet = self
            .store
            .wallet(user_id)
            .await?
            .ok_or_else(|| ChattimeError::unknown_wallet(user_id))?;
        let balance = wallet
            .balance
            .checked_sub(amount)
            .ok_or_else(|| ChattimeError::insufficient_funds(wallet.balance, amount))?;
        self.store.put_wallet(Wallet::new(user_id, balance)).await?;

        debug!(%user_id, amount, balance, "wallet debited");
        Ok(balance)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
