//! Sale state machine.
//!
//! Holds the single published [`SaleState`] for the current session and
//! replaces it wholesale after each successful batch of reads. Failed cycles
//! leave the previous state untouched. Every contract read is bounded by the
//! request timeout, so a hung node costs one aborted cycle and never holds
//! the refresh lock indefinitely.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::phase::{Phase, SaleSnapshot};
use crate::connection::{ChainHandle, SessionId};
use crate::error::ReadError;
use crate::gateway::ContractGateway;

/// Published state: session identity, last good snapshot and its phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleState {
    pub session: Option<SessionId>,
    pub account: Option<Address>,
    pub snapshot: Option<SaleSnapshot>,
    pub phase: Phase,
}

impl Default for SaleState {
    fn default() -> Self {
        Self {
            session: None,
            account: None,
            snapshot: None,
            phase: Phase::NotConnected,
        }
    }
}

/// What a refresh cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was published with this phase
    Published(Phase),
    /// Another cycle was in flight; this one was skipped
    Coalesced,
    /// A read failed; the previous snapshot stays
    Aborted(ReadError),
    /// Reads succeeded but the result was dropped (stale session or a
    /// regression after the sale ended)
    Discarded,
}

pub struct SaleStateMachine {
    gateway: Arc<dyn ContractGateway>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<SaleState>,
    refresh_lock: Mutex<()>,
    request_timeout: Duration,
}

impl SaleStateMachine {
    pub fn new(
        gateway: Arc<dyn ContractGateway>,
        clock: Arc<dyn Clock>,
        request_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SaleState::default());
        Self {
            gateway,
            clock,
            state,
            refresh_lock: Mutex::new(()),
            request_timeout,
        }
    }

    pub fn state(&self) -> SaleState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    pub fn subscribe(&self) -> watch::Receiver<SaleState> {
        self.state.subscribe()
    }

    /// Start tracking a new session; nothing is known about the sale yet
    pub fn begin_session(&self, handle: &ChainHandle) {
        debug!("Sale state reset for session {}", handle.session());
        self.state.send_replace(SaleState {
            session: Some(handle.session()),
            account: Some(handle.account()),
            snapshot: None,
            phase: Phase::Connected,
        });
    }

    pub fn end_session(&self) {
        self.state.send_replace(SaleState::default());
    }

    /// Whether `handle`'s session has observed the end of the sale
    pub fn has_ended(&self, handle: &ChainHandle) -> bool {
        let state = self.state.borrow();
        state.session == Some(handle.session()) && state.phase == Phase::SaleEnded
    }

    /// Refresh, waiting for any in-flight cycle to finish first
    pub async fn refresh(&self, handle: &ChainHandle) -> RefreshOutcome {
        let _guard = self.refresh_lock.lock().await;
        self.run_cycle(handle).await
    }

    /// Refresh unless a cycle is already in flight
    pub async fn try_refresh(&self, handle: &ChainHandle) -> RefreshOutcome {
        match self.refresh_lock.try_lock() {
            Ok(_guard) => self.run_cycle(handle).await,
            Err(_) => {
                debug!("Refresh already in flight, skipping tick");
                RefreshOutcome::Coalesced
            }
        }
    }

    async fn run_cycle(&self, handle: &ChainHandle) -> RefreshOutcome {
        if !self.is_current(handle) {
            debug!("Refresh requested through a stale handle");
            return RefreshOutcome::Aborted(ReadError::NotConnected);
        }

        let snapshot = match self.read_snapshot(handle).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Sale refresh aborted, keeping previous snapshot: {}", e);
                return RefreshOutcome::Aborted(e);
            }
        };

        let phase = Phase::derive(&snapshot, self.clock.now_unix());
        self.publish(handle, snapshot, phase)
    }

    async fn read_snapshot(&self, handle: &ChainHandle) -> Result<SaleSnapshot, ReadError> {
        let (presale_started, tokens_minted) = tokio::try_join!(
            self.bounded("presaleStarted", self.gateway.is_presale_started(handle)),
            self.bounded("tokenIds", self.gateway.minted_count(handle)),
        )?;

        let known_owner = self.known_owner_flag(handle);

        if presale_started {
            let presale_end_timestamp = self
                .bounded("presaleEnded", self.gateway.presale_end_timestamp(handle))
                .await?;
            return Ok(SaleSnapshot {
                presale_started,
                presale_end_timestamp,
                tokens_minted,
                is_caller_owner: known_owner,
            });
        }

        let is_caller_owner = match self
            .bounded("owner", self.gateway.owner_address(handle))
            .await
        {
            Ok(owner) => owner == handle.account(),
            Err(e) => {
                warn!("Owner lookup failed, keeping last known value: {}", e);
                known_owner
            }
        };

        Ok(SaleSnapshot {
            presale_started,
            presale_end_timestamp: U256::ZERO,
            tokens_minted,
            is_caller_owner,
        })
    }

    async fn bounded<T>(
        &self,
        call: &str,
        read: impl Future<Output = Result<T, ReadError>>,
    ) -> Result<T, ReadError> {
        tokio::time::timeout(self.request_timeout, read)
            .await
            .unwrap_or_else(|_| {
                Err(ReadError::RemoteUnavailable(format!(
                    "{} timed out after {}s",
                    call,
                    self.request_timeout.as_secs()
                )))
            })
    }

    fn publish(&self, handle: &ChainHandle, snapshot: SaleSnapshot, phase: Phase) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::Discarded;

        self.state.send_if_modified(|state| {
            if state.session != Some(handle.session()) || !handle.is_live() {
                debug!("Dropping snapshot for a session that is no longer current");
                return false;
            }
            if state.phase == Phase::SaleEnded && phase != Phase::SaleEnded {
                warn!(
                    "Ignoring refresh that would move the sale back to {} after it ended",
                    phase
                );
                return false;
            }

            if state.phase != phase {
                info!("Sale phase {} -> {}", state.phase, phase);
            }
            outcome = RefreshOutcome::Published(phase);

            let changed = state.snapshot != Some(snapshot) || state.phase != phase;
            state.snapshot = Some(snapshot);
            state.phase = phase;
            changed
        });

        outcome
    }

    fn is_current(&self, handle: &ChainHandle) -> bool {
        handle.is_live() && self.state.borrow().session == Some(handle.session())
    }

    fn known_owner_flag(&self, handle: &ChainHandle) -> bool {
        let state = self.state.borrow();
        match (&state.session, &state.snapshot) {
            (Some(session), Some(snapshot)) if *session == handle.session() => {
                snapshot.is_caller_owner
            }
            _ => false,
        }
    }
}
