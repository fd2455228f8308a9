//! # tidelock-ledger
//! Point history engine, lock lifecycle, and migration bridge.
//!
//! - [`history`]: sparse checkpoints of linearly decaying balances
//! - [`escrow`]: the [`VotingEscrow`] lock registry and state machine
//! - [`migration`]: moving locks between ledgers

pub mod escrow;
pub mod history;
pub mod migration;

pub use escrow::VotingEscrow;
pub use history::{CatchUp, PointHistory};
pub use migration::SharedEscrow;
