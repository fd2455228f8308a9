//! Scenario and property test suite for Tidelock.
//!
//! The tests in `tests/` drive ledgers, delegates, and migrations together
//! through the public APIs, using the helpers below.

pub mod helpers;
