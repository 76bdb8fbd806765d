use alloy_primitives::U256;
use serde::Serialize;

use crate::dispatcher::ActionKind;

/// One consistent batch of contract reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaleSnapshot {
    pub presale_started: bool,
    /// Unix seconds; zero while the presale has not started
    pub presale_end_timestamp: U256,
    pub tokens_minted: U256,
    pub is_caller_owner: bool,
}

/// Canonical sale phase as seen by the connected account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotConnected,
    /// Connected, no snapshot yet
    Connected,
    PresaleNotStarted,
    PresaleActive,
    /// Presale window closed; public mint is open
    SaleEnded,
}

impl Phase {
    /// Phase of a snapshot at `now` (unix seconds)
    pub fn derive(snapshot: &SaleSnapshot, now: u64) -> Phase {
        if !snapshot.presale_started {
            Phase::PresaleNotStarted
        } else if U256::from(now) < snapshot.presale_end_timestamp {
            Phase::PresaleActive
        } else {
            Phase::SaleEnded
        }
    }

    /// Phase including connection status
    pub fn project(connected: bool, snapshot: Option<&SaleSnapshot>, now: u64) -> Phase {
        match (connected, snapshot) {
            (false, _) => Phase::NotConnected,
            (true, None) => Phase::Connected,
            (true, Some(snapshot)) => Phase::derive(snapshot, now),
        }
    }

    /// The action the page should offer in this phase, if any.
    ///
    /// Gating here is advisory; the contract has the final word.
    pub fn enabled_action(self, snapshot: &SaleSnapshot, fees: &SaleFees) -> Option<EnabledAction> {
        match self {
            Phase::PresaleNotStarted if snapshot.is_caller_owner => Some(EnabledAction {
                kind: ActionKind::StartPresale,
                fee_wei: None,
            }),
            Phase::PresaleActive => Some(EnabledAction {
                kind: ActionKind::PresaleMint,
                fee_wei: Some(fees.presale_wei),
            }),
            Phase::SaleEnded => Some(EnabledAction {
                kind: ActionKind::PublicMint,
                fee_wei: Some(fees.public_wei),
            }),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::NotConnected => "not connected",
            Phase::Connected => "connected",
            Phase::PresaleNotStarted => "presale not started",
            Phase::PresaleActive => "presale active",
            Phase::SaleEnded => "sale ended",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed mint prices in wei; presale is cheaper than public
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaleFees {
    pub presale_wei: U256,
    pub public_wei: U256,
}

impl SaleFees {
    /// Value attached to the write for `kind`
    pub fn for_action(&self, kind: ActionKind) -> Option<U256> {
        match kind {
            ActionKind::StartPresale => None,
            ActionKind::PresaleMint => Some(self.presale_wei),
            ActionKind::PublicMint => Some(self.public_wei),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnabledAction {
    pub kind: ActionKind,
    pub fee_wei: Option<U256>,
}
