/// Integration tests for sale phase derivation and refresh cycles
mod common;

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use common::*;
use cryptodevs_sale::{
    ActionKind, ChainHandle, ConnectionProvider, ManualClock, Notifier, Phase, ReadError,
    RefreshOutcome, SaleFees, SaleStateMachine,
};

struct Setup {
    machine: Arc<SaleStateMachine>,
    connection: ConnectionProvider,
    gateway: Arc<MockGateway>,
    clock: Arc<ManualClock>,
    handle: ChainHandle,
}

async fn setup(account: alloy_primitives::Address, chain: MockChain) -> Setup {
    let gateway = MockGateway::new(chain);
    let clock = Arc::new(ManualClock::new(NOW));
    let machine = Arc::new(SaleStateMachine::new(
        gateway.clone(),
        clock.clone(),
        REQUEST_TIMEOUT,
    ));
    let connection =
        ConnectionProvider::new(MockWallet::new(account), CHAIN_ID, "goerli", Notifier::new());

    let handle = connection.connect().await.unwrap();
    machine.begin_session(&handle);

    Setup {
        machine,
        connection,
        gateway,
        clock,
        handle,
    }
}

fn fees() -> SaleFees {
    SaleFees {
        presale_wei: presale_fee(),
        public_wei: public_fee(),
    }
}

#[tokio::test]
async fn test_begin_session_publishes_connected_without_snapshot() {
    let s = setup(buyer(), MockChain::default()).await;
    let state = s.machine.state();
    assert_eq!(state.phase, Phase::Connected);
    assert_eq!(state.session, Some(s.handle.session()));
    assert_eq!(state.account, Some(buyer()));
    assert!(state.snapshot.is_none());
}

#[tokio::test]
async fn test_owner_sees_start_presale_before_presale() {
    let s = setup(owner(), MockChain::default()).await;

    let outcome = s.machine.refresh(&s.handle).await;
    assert_eq!(outcome, RefreshOutcome::Published(Phase::PresaleNotStarted));

    let state = s.machine.state();
    let snapshot = state.snapshot.unwrap();
    assert!(snapshot.is_caller_owner);
    assert!(!snapshot.presale_started);
    assert_eq!(
        state.phase.enabled_action(&snapshot, &fees()).map(|a| a.kind),
        Some(ActionKind::StartPresale)
    );
}

#[tokio::test]
async fn test_open_presale_enables_presale_mint() {
    let s = setup(buyer(), presale_open()).await;

    assert_eq!(
        s.machine.refresh(&s.handle).await,
        RefreshOutcome::Published(Phase::PresaleActive)
    );

    let state = s.machine.state();
    let snapshot = state.snapshot.unwrap();
    let action = state.phase.enabled_action(&snapshot, &fees()).unwrap();
    assert_eq!(action.kind, ActionKind::PresaleMint);
    assert_eq!(action.fee_wei, Some(presale_fee()));
    assert_eq!(snapshot.tokens_minted, U256::from(3));
}

#[tokio::test]
async fn test_closed_presale_enables_public_mint() {
    let s = setup(buyer(), sale_ended()).await;

    assert_eq!(
        s.machine.refresh(&s.handle).await,
        RefreshOutcome::Published(Phase::SaleEnded)
    );

    let state = s.machine.state();
    let action = state
        .phase
        .enabled_action(&state.snapshot.unwrap(), &fees())
        .unwrap();
    assert_eq!(action.kind, ActionKind::PublicMint);
    assert_eq!(action.fee_wei, Some(public_fee()));
    assert!(public_fee() > presale_fee());
}

#[tokio::test]
async fn test_owner_lookup_skipped_once_presale_started() {
    let s = setup(buyer(), presale_open()).await;
    s.machine.refresh(&s.handle).await;
    // started + minted + end timestamp
    assert_eq!(s.gateway.read_count(), 3);

    let s = setup(buyer(), MockChain::default()).await;
    s.machine.refresh(&s.handle).await;
    // started + minted + owner
    assert_eq!(s.gateway.read_count(), 3);
}

#[tokio::test]
async fn test_failed_read_keeps_previous_snapshot() {
    let s = setup(buyer(), presale_open()).await;
    s.machine.refresh(&s.handle).await;
    let before = s.machine.state();

    s.gateway.update(|c| {
        c.minted = U256::from(9);
        c.fail_end_timestamp = true;
    });

    let outcome = s.machine.refresh(&s.handle).await;
    assert!(matches!(
        outcome,
        RefreshOutcome::Aborted(ReadError::RemoteUnavailable(_))
    ));
    assert_eq!(s.machine.state(), before);
}

#[tokio::test]
async fn test_failed_first_read_stays_connected() {
    let s = setup(buyer(), MockChain {
        fail_minted: true,
        ..presale_open()
    })
    .await;

    assert!(matches!(
        s.machine.refresh(&s.handle).await,
        RefreshOutcome::Aborted(_)
    ));
    let state = s.machine.state();
    assert_eq!(state.phase, Phase::Connected);
    assert!(state.snapshot.is_none());
}

#[tokio::test]
async fn test_owner_lookup_failure_does_not_block_phase() {
    let s = setup(owner(), MockChain {
        fail_owner: true,
        ..Default::default()
    })
    .await;

    assert_eq!(
        s.machine.refresh(&s.handle).await,
        RefreshOutcome::Published(Phase::PresaleNotStarted)
    );
    assert!(!s.machine.state().snapshot.unwrap().is_caller_owner);

    // Once known, a later lookup failure keeps the last value
    s.gateway.update(|c| c.fail_owner = false);
    s.machine.refresh(&s.handle).await;
    assert!(s.machine.state().snapshot.unwrap().is_caller_owner);

    s.gateway.update(|c| c.fail_owner = true);
    s.machine.refresh(&s.handle).await;
    assert!(s.machine.state().snapshot.unwrap().is_caller_owner);
}

#[tokio::test]
async fn test_presale_ends_with_time() {
    let s = setup(buyer(), presale_open()).await;
    assert_eq!(
        s.machine.refresh(&s.handle).await,
        RefreshOutcome::Published(Phase::PresaleActive)
    );

    s.clock.advance(3600);
    assert_eq!(
        s.machine.refresh(&s.handle).await,
        RefreshOutcome::Published(Phase::SaleEnded)
    );
    assert!(s.machine.has_ended(&s.handle));
}

#[tokio::test]
async fn test_sale_ended_never_regresses() {
    let s = setup(buyer(), sale_ended()).await;
    s.machine.refresh(&s.handle).await;
    assert_eq!(s.machine.phase(), Phase::SaleEnded);

    // A lagging node reports an earlier view of the contract
    s.gateway.update(|c| c.presale_end = U256::from(NOW + 3600));
    assert_eq!(s.machine.refresh(&s.handle).await, RefreshOutcome::Discarded);
    assert_eq!(s.machine.phase(), Phase::SaleEnded);

    s.gateway.update(|c| c.presale_started = false);
    assert_eq!(s.machine.refresh(&s.handle).await, RefreshOutcome::Discarded);
    assert_eq!(s.machine.phase(), Phase::SaleEnded);
}

#[tokio::test]
async fn test_stale_handle_does_not_read() {
    let s = setup(buyer(), presale_open()).await;
    s.connection.disconnect();

    assert_eq!(
        s.machine.refresh(&s.handle).await,
        RefreshOutcome::Aborted(ReadError::NotConnected)
    );
    assert_eq!(s.gateway.read_count(), 0);
}

#[tokio::test]
async fn test_result_for_replaced_session_is_dropped() {
    let s = setup(buyer(), presale_open()).await;
    let old = s.handle.clone();
    let new = s.connection.reconnect().await.unwrap();
    s.machine.begin_session(&new);

    assert_eq!(
        s.machine.refresh(&old).await,
        RefreshOutcome::Aborted(ReadError::NotConnected)
    );
    assert_eq!(s.machine.state().session, Some(new.session()));
    assert_eq!(s.machine.phase(), Phase::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_tick_during_refresh_is_coalesced() {
    let s = setup(buyer(), presale_open()).await;
    s.gateway.set_read_delay(Duration::from_secs(2));

    let machine = s.machine.clone();
    let handle = s.handle.clone();
    let slow = tokio::spawn(async move { machine.refresh(&handle).await });
    tokio::task::yield_now().await;

    assert_eq!(s.machine.try_refresh(&s.handle).await, RefreshOutcome::Coalesced);
    assert_eq!(
        slow.await.unwrap(),
        RefreshOutcome::Published(Phase::PresaleActive)
    );
    assert_eq!(s.gateway.refresh_count(), 1);
}

#[tokio::test]
async fn test_subscribers_see_each_published_state() {
    let s = setup(buyer(), presale_open()).await;
    let mut rx = s.machine.subscribe();
    let _ = rx.borrow_and_update();

    s.machine.refresh(&s.handle).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().phase, Phase::PresaleActive);

    // Identical snapshot does not wake subscribers
    s.machine.refresh(&s.handle).await;
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn test_end_session_resets_to_not_connected() {
    let s = setup(buyer(), presale_open()).await;
    s.machine.refresh(&s.handle).await;
    s.machine.end_session();

    let state = s.machine.state();
    assert_eq!(state.phase, Phase::NotConnected);
    assert!(state.session.is_none());
    assert!(state.snapshot.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_hung_read_times_out_and_keeps_snapshot() {
    let s = setup(buyer(), presale_open()).await;
    assert_eq!(
        s.machine.refresh(&s.handle).await,
        RefreshOutcome::Published(Phase::PresaleActive)
    );
    let before = s.machine.state();

    s.gateway.set_read_delay(HUNG);
    let started = tokio::time::Instant::now();
    let outcome = s.machine.refresh(&s.handle).await;

    assert!(matches!(
        outcome,
        RefreshOutcome::Aborted(ReadError::RemoteUnavailable(msg)) if msg.contains("timed out")
    ));
    assert_eq!(started.elapsed(), REQUEST_TIMEOUT);
    assert_eq!(s.machine.state(), before);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_cycle_releases_refresh_lock() {
    let s = setup(buyer(), presale_open()).await;
    s.gateway.set_read_delay(HUNG);

    let machine = s.machine.clone();
    let handle = s.handle.clone();
    let stuck = tokio::spawn(async move { machine.refresh(&handle).await });
    tokio::task::yield_now().await;

    // A queued refresh gets its turn once the stuck cycle gives up
    s.gateway.set_read_delay(Duration::ZERO);
    assert_eq!(
        s.machine.refresh(&s.handle).await,
        RefreshOutcome::Published(Phase::PresaleActive)
    );
    assert!(matches!(
        stuck.await.unwrap(),
        RefreshOutcome::Aborted(ReadError::RemoteUnavailable(_))
    ));
}
