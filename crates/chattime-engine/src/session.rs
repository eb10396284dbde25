//! Session state machine and billing clock
//!
//! Each user is either idle or in exactly one active chat session. An active
//! session owns one billing clock task that debits the wallet every billing
//! period and ends the session when funds run out.
//!
//! The live-session registry is the source of truth for "active": entries
//! are created and destroyed only while holding that user's session mutex,
//! so a timer exists if and only if its session is active. Start and stop
//! (from the client, an operator, or the clock itself) serialize on the same
//! mutex; a billing tick re-verifies the registry under the mutex before
//! touching the ledger, which guarantees no tick lands after a stop.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use chattime_core::{
    Amount, AppEvent, BillingConfig, ChatSession, ChattimeError, ChattimeResult, SessionId,
    SessionRating, StopReason, Storage, TimeSource, UserId, ValidationError,
};

use crate::hub::BroadcastHub;
use crate::ledger::Ledger;

// ----------------------------------------------------------------------------
// Live Session Registry
// ----------------------------------------------------------------------------

/// Registry entry for an active session. Holding the watch sender keeps the
/// billing task alive; dropping or signalling it ends the task.
#[derive(Debug)]
struct LiveSession {
    session_id: SessionId,
    cancel: watch::Sender<bool>,
}

/// Projection of one user's session and wallet state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub active: bool,
    pub session_id: Option<SessionId>,
    pub balance: Amount,
}

// ----------------------------------------------------------------------------
// Session Manager
// ----------------------------------------------------------------------------

/// Per-user session transitions and the billing clocks they own
pub struct SessionManager<T: TimeSource> {
    store: Arc<dyn Storage>,
    hub: Arc<BroadcastHub>,
    ledger: Arc<Ledger>,
    config: BillingConfig,
    time_source: T,
    /// Start/stop serialization per user
    locks: DashMap<UserId, Arc<Mutex<()>>>,
    live: DashMap<UserId, LiveSession>,
}

impl<T: TimeSource + Send + Sync + 'static> SessionManager<T> {
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
            live: DashMap::new(),
        }
    }

    fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Session id of the user's active session, if any
    pub fn active_session_id(&self, user_id: UserId) -> Option<SessionId> {
        self.live.get(&user_id).map(|entry| entry.session_id)
    }

    /// Start a session for the user.
    ///
    /// Requires the wallet to cover at least one billing unit. Idempotent:
    /// if a session is already active, its id is returned and no second
    /// timer is spawned.
    pub async fn start(self: Arc<Self>, user_id: UserId) -> ChattimeResult<SessionId> {
        if self.store.user(user_id).await?.is_none() {
            return Err(ChattimeError::unknown_user(user_id));
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if let Some(session_id) = self.active_session_id(user_id) {
            debug!(%user_id, %session_id, "start on active session is a no-op");
            return Ok(session_id);
        }

        let balance = self.ledger.balance(user_id).await?;
        if balance < self.config.billing_unit_cost {
            return Err(ChattimeError::insufficient_funds(
                balance,
                self.config.billing_unit_cost,
            ));
        }

        let session = ChatSession::new(user_id, self.time_source.now());
        let session_id = session.id;
        self.store.insert_session(session).await?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let manager = Arc::clone(&self);
        tokio::spawn(async move {
            manager.billing_loop(user_id, session_id, cancel_rx).await;
        });
        self.live.insert(
            user_id,
            LiveSession {
                session_id,
                cancel: cancel_tx,
            },
        );

        info!(%user_id, %session_id, balance, "session started");
        self.hub
            .publish_operator(AppEvent::SessionStarted { user_id, session_id });
        Ok(session_id)
    }

    /// Stop the user's session, if one is active. Idempotent.
    pub async fn stop(&self, user_id: UserId, reason: StopReason) -> ChattimeResult<()> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        self.stop_locked(user_id, reason).await
    }

    /// Stop transition body. The caller must hold the user's session mutex;
    /// the billing clock calls this directly from inside a tick.
    async fn stop_locked(&self, user_id: UserId, reason: StopReason) -> ChattimeResult<()> {
        let Some((_, entry)) = self.live.remove(&user_id) else {
            return Ok(());
        };
        // Wake the billing task; it exits without another tick
        let _ = entry.cancel.send(true);

        let session_id = entry.session_id;
        let mut session = self
            .store
            .session(session_id)
            .await?
            .ok_or(chattime_core::StorageError::MissingRow {
                entity: "session",
                id: session_id.to_string(),
            })?;
        session.mark_stopped(self.time_source.now());
        self.store.update_session(session).await?;

        info!(%user_id, %session_id, %reason, "session stopped");
        self.hub.publish_both(
            user_id,
            AppEvent::SessionStopped {
                user_id,
                session_id,
                reason,
            },
        );
        Ok(())
    }

    /// Delete the message history of the user's most recent session.
    ///
    /// Does not change the active/idle state.
    pub async fn clear(&self, user_id: UserId) -> ChattimeResult<SessionId> {
        let session = self
            .store
            .latest_session(user_id)
            .await?
            .ok_or_else(|| ChattimeError::no_history(user_id))?;
        let deleted = self.store.delete_messages(session.id).await?;

        info!(%user_id, session_id = %session.id, deleted, "chat history cleared");
        self.hub.publish_both(
            user_id,
            AppEvent::ChatCleared {
                user_id,
                session_id: session.id,
            },
        );
        Ok(session.id)
    }

    /// Session and wallet state for one user
    pub async fn status(&self, user_id: UserId) -> ChattimeResult<SessionStatus> {
        if self.store.user(user_id).await?.is_none() {
            return Err(ChattimeError::unknown_user(user_id));
        }
        let balance = self.ledger.balance(user_id).await?;
        let session_id = self.active_session_id(user_id);
        Ok(SessionStatus {
            active: session_id.is_some(),
            session_id,
            balance,
        })
    }

    /// Record client feedback against the most recent session.
    pub async fn rate(
        &self,
        user_id: UserId,
        stars: u8,
        feedback: Option<String>,
    ) -> ChattimeResult<SessionRating> {
        if !(1..=5).contains(&stars) {
            return Err(ValidationError::StarsOutOfRange { stars }.into());
        }
        let session = self
            .store
            .latest_session(user_id)
            .await?
            .ok_or_else(|| ChattimeError::no_history(user_id))?;

        let rating = SessionRating {
            session_id: session.id,
            stars,
            feedback,
            created_at: self.time_source.now(),
        };
        self.store.insert_rating(rating.clone()).await?;

        self.hub.publish_operator(AppEvent::RatingSubmitted {
            user_id,
            session_id: session.id,
            stars,
        });
        Ok(rating)
    }

    /// Stop every live session. Used on engine shutdown so no timer leaks.
    pub async fn stop_all(&self, reason: StopReason) {
        let user_ids: Vec<UserId> = self.live.iter().map(|entry| *entry.key()).collect();
        for user_id in user_ids {
            if let Err(e) = self.stop(user_id, reason).await {
                error!(%user_id, error = %e, "failed to stop session during shutdown");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Billing Clock
    // ------------------------------------------------------------------------

    /// One billing clock per active session. Runs until cancelled or until
    /// the wallet cannot cover a tick.
    async fn billing_loop(
        self: Arc<Self>,
        user_id: UserId,
        session_id: SessionId,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        let period = self.config.billing_period;
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut billed_units: u64 = 0;

        debug!(%user_id, %session_id, ?period, "billing clock started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.billing_tick(user_id, session_id, &mut billed_units).await {
                        break;
                    }
                }
                _ = cancel_rx.changed() => {
                    break;
                }
            }
        }
        debug!(%user_id, %session_id, billed_units, "billing clock stopped");
    }

    /// One deduction attempt. Returns whether the clock should keep running.
    async fn billing_tick(
        &self,
        user_id: UserId,
        session_id: SessionId,
        billed_units: &mut u64,
    ) -> bool {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        // The session may have been stopped or replaced while this tick
        // waited on the mutex; in that case the clock must fall silent.
        let still_live = self.active_session_id(user_id) == Some(session_id);
        if !still_live {
            return false;
        }

        match self
            .ledger
            .debit(user_id, self.config.billing_unit_cost)
            .await
        {
            Ok(balance) => {
                *billed_units += 1;
                self.advance_cursor(session_id, *billed_units).await;
                self.hub.publish_user(
                    user_id,
                    AppEvent::BillingTick {
                        user_id,
                        session_id,
                        balance,
                        billed_units: *billed_units,
                    },
                );
                // A remainder below one unit cannot fund the next period,
                // so the session ends in this tick rather than the next
                if balance < self.config.billing_unit_cost {
                    self.stop_exhausted(user_id).await;
                    return false;
                }
                true
            }
            Err(e) if e.is_insufficient_funds() => {
                // The wallet was drained between ticks by something other
                // than this clock; same outcome
                self.stop_exhausted(user_id).await;
                false
            }
            Err(e) => {
                // Storage trouble is not fatal to the session
                warn!(%user_id, error = %e, "billing debit failed, retrying next tick");
                true
            }
        }
    }

    /// Exhaustion-path stop, invoked from inside a tick with the user's
    /// session mutex already held
    async fn stop_exhausted(&self, user_id: UserId) {
        info!(%user_id, "wallet exhausted, ending session");
        if let Err(e) = self
            .stop_locked(user_id, StopReason::BalanceExhausted)
            .await
        {
            error!(%user_id, error = %e, "failed to stop exhausted session");
        }
    }

    /// Persist the last-billed boundary on the session row
    async fn advance_cursor(&self, session_id: SessionId, billed_units: u64) {
        let result = match self.store.session(session_id).await {
            Ok(Some(mut session)) => {
                session.billed_units = billed_units;
                self.store.update_session(session).await
            }
            Ok(None) => Err(chattime_core::StorageError::MissingRow {
                entity: "session",
                id: session_id.to_string(),
            }),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(%session_id, error = %e, "failed to persist billing cursor");
        }
    }
}
