use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::machine::{RefreshOutcome, SaleStateMachine};
use super::phase::Phase;
use crate::connection::ChainHandle;

/// Periodic refresh task bound to one session.
///
/// Stops on its own once the sale has ended, when the handle goes stale, or
/// when cancelled. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn spawn(machine: Arc<SaleStateMachine>, handle: ChainHandle, period: Duration) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn(poll_loop(machine, handle, period, token.clone()));
        Self {
            token,
            task: Some(task),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn poll_loop(
    machine: Arc<SaleStateMachine>,
    handle: ChainHandle,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!("Polling session {} every {:?}", handle.session(), period);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !handle.is_live() {
            debug!("Session {} went stale, polling stopped", handle.session());
            break;
        }
        if machine.has_ended(&handle) {
            break;
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = machine.try_refresh(&handle) => outcome,
        };

        if outcome == RefreshOutcome::Published(Phase::SaleEnded) {
            info!("Sale ended, polling stopped");
            break;
        }
    }
}
