//! # tidelock-core
//! Foundation types, traits, and fixed-point math for the Tidelock ledger.

pub mod config;
pub mod constants;
pub mod custody;
pub mod error;
pub mod math;
pub mod traits;
pub mod types;
