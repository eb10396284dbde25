//! Top-up workflow
//!
//! Lifecycle of a funding request: a client submits an amount with a payment
//! reference, an operator approves (crediting the wallet exactly once) or
//! rejects (recording a reason). Resolution of one request is serialized per
//! request id, which makes concurrent approve/reject attempts mutually
//! exclusive: the first wins, later attempts get `AlreadyResolved`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use chattime_core::{
    Amount, AppEvent, BillingConfig, ChattimeError, ChattimeResult, Storage, TimeSource,
    TopUpId, TopUpRequest, UserId, ValidationError,
};

use crate::hub::BroadcastHub;
use crate::ledger::Ledger;

// ----------------------------------------------------------------------------
// Top-Up Desk
// ----------------------------------------------------------------------------

/// Submission and operator resolution of top-up requests
pub struct TopUpDesk<T: TimeSource> {
    store: Arc<dyn Storage>,
    hub: Arc<BroadcastHub>,
    ledger: Arc<Ledger>,
    config: BillingConfig,
    time_source: T,
    /// Per-request serialization points for approve/reject
    locks: DashMap<TopUpId, Arc<Mutex<()>>>,
}

impl<T: TimeSource> TopUpDesk<T> {
    pub fn new(
        store: Arc<dyn Storage>,
        hub: Arc<BroadcastHub>,
        ledger: Arc<Ledger>,
        config: BillingConfig,
        time_source: T,
    ) -> Self {
        Self {
            store,
            hub,
            ledger,
            config,
            time_source,
            locks: DashMap::new(),
        }
    }

    fn request_lock(&self, id: TopUpId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Submit a new funding request on behalf of a client.
    pub async fn submit(
        &self,
        user_id: UserId,
        amount: Amount,
        reference: &str,
        note: Option<String>,
    ) -> ChattimeResult<TopUpRequest> {
        if self.store.user(user_id).await?.is_none() {
            return Err(ChattimeError::unknown_user(user_id));
        }
        if amount < self.config.minimum_recharge {
            return Err(ValidationError::AmountBelowMinimum {
                amount,
                minimum: self.config.minimum_recharge,
            }
            .into());
        }
        let reference = reference.trim();
        if reference.chars().count() < self.config.min_reference_len {
            return Err(ValidationError::ReferenceTooShort {
                length: reference.chars().count(),
                minimum: self.config.min_reference_len,
            }
            .into());
        }

        let request =
            TopUpRequest::new(user_id, amount, reference, note, self.time_source.now());
        self.store.insert_top_up(request.clone()).await?;

        info!(request_id = %request.id, %user_id, amount, "top-up submitted");
        self.hub.publish_operator(AppEvent::TopUpSubmitted {
            request: request.clone(),
        });
        Ok(request)
    }

    /// Approve a pending request and credit the owner's wallet.
    pub async fn approve(&self, id: TopUpId) -> ChattimeResult<TopUpRequest> {
        let lock = self.request_lock(id);
        let _guard = lock.lock().await;

        // Reread under the lock; a concurrent resolution may have won
        let mut request = self
            .store
            .top_up(id)
            .await?
            .ok_or_else(|| ChattimeError::top_up_not_found(id))?;
        if !request.is_pending() {
            return Err(ChattimeError::already_resolved(id, request.status));
        }

        request.mark_approved(self.time_source.now());
        self.store.update_top_up(request.clone()).await?;
        self.ledger.credit(request.user_id, request.amount).await?;

        info!(request_id = %id, user_id = %request.user_id, amount = request.amount, "top-up approved");
        self.hub.publish_both(
            request.user_id,
            AppEvent::TopUpResolved {
                request: request.clone(),
            },
        );
        Ok(request)
    }

    /// Reject a pending request. The wallet is never touched.
    pub async fn reject(&self, id: TopUpId, reason: Option<String>) -> ChattimeResult<TopUpRequest> {
        let lock = self.request_lock(id);
        let _guard = lock.lock().await;

        let mut request = self
            .store
            .top_up(id)
            .await?
            .ok_or_else(|| ChattimeError::top_up_not_found(id))?;
        if !request.is_pending() {
            return Err(ChattimeError::already_resolved(id, request.status));
        }

        request.mark_rejected(self.bounded_reason(reason), self.time_source.now());
        self.store.update_top_up(request.clone()).await?;

        info!(request_id = %id, user_id = %request.user_id, "top-up rejected");
        self.hub.publish_both(
            request.user_id,
            AppEvent::TopUpResolved {
                request: request.clone(),
            },
        );
        Ok(request)
    }

    /// All requests ever submitted by one user, in submission order
    pub async fn for_user(&self, user_id: UserId) -> ChattimeResult<Vec<TopUpRequest>> {
        Ok(self.store.top_ups_for(user_id).await?)
    }

    /// Requests awaiting operator resolution, in submission order
    pub async fn pending(&self) -> ChattimeResult<Vec<TopUpRequest>> {
        Ok(self.store.pending_top_ups().await?)
    }

    fn bounded_reason(&self, reason: Option<String>) -> String {
        let reason = reason.unwrap_or_default();
        let reason = reason.trim();
        if reason.is_empty() {
            return BillingConfig::DEFAULT_REJECT_REASON.to_string();
        }
        reason.chars().take(self.config.max_reason_len).collect()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
