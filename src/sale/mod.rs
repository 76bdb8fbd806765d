//! Sale phase tracking: pure phase derivation, the state machine that
//! publishes snapshots, and the session-bound poll task.

pub mod clock;
pub mod machine;
pub mod phase;
pub mod poller;

pub use clock::{Clock, ManualClock, SystemClock};
pub use machine::{RefreshOutcome, SaleState, SaleStateMachine};
pub use phase::{EnabledAction, Phase, SaleFees, SaleSnapshot};
pub use poller::PollHandle;
