//! Protocol constants. Time values are Unix seconds; fixed-point values use
//! [`PRECISION`] (1e18) as the denominator.

pub const HOUR: u64 = 3_600;
pub const DAY: u64 = 24 * HOUR;
pub const WEEK: u64 = 7 * DAY;
pub const YEAR: u64 = 365 * DAY;

/// One whole token in base units (18 decimals).
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Fixed-point denominator for penalty rates, boost multipliers, and the
/// block-per-second slope used when interpolating block numbers.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Default interval width: lock ends and slope changes are aligned to it.
pub const DEFAULT_INTERVAL: u64 = 3 * DAY;

/// Default maximum lock duration: two years, aligned down to the interval.
///
/// # Examples
///
/// ```
/// use tidelock_core::constants::{DEFAULT_INTERVAL, DEFAULT_MAX_TIME};
/// assert_eq!(DEFAULT_MAX_TIME % DEFAULT_INTERVAL, 0);
/// assert_eq!(DEFAULT_MAX_TIME, 729 * 86_400);
/// ```
pub const DEFAULT_MAX_TIME: u64 = 2 * YEAR / DEFAULT_INTERVAL * DEFAULT_INTERVAL;

/// Default lower bound on the cancellation penalty rate (50%).
pub const DEFAULT_PENALTY_FLOOR: u128 = PRECISION / 2;

/// Maximum number of interval boundaries a single checkpoint may cross.
pub const MAX_CATCH_UP_STEPS: u32 = 255;

/// Duration boost: shortest lock a delegate accepts.
pub const DEFAULT_MIN_BOOST_DURATION: u64 = 219 * DAY;

/// Duration boost: multiplier reached at the ledger's maximum lock time.
pub const DEFAULT_DURATION_MAX_BOOST: u128 = 10 * PRECISION;

/// Liquidity boost: numerator of the hard cap (33.3x the underlying amount).
pub const LIQUIDITY_CAP_NUMERATOR: u128 = 333;

/// Liquidity boost: denominator of the hard cap.
pub const LIQUIDITY_CAP_DENOMINATOR: u128 = 10;

/// Liquidity boost: bonus scale, in LP base units.
pub const DEFAULT_LIQUIDITY_MAX_BOOST: u128 = 1_000 * UNIT;

/// Liquidity boost: smallest LP deposit accepted.
pub const DEFAULT_LIQUIDITY_MIN_AMOUNT: u128 = 333 * UNIT / 1_000;
