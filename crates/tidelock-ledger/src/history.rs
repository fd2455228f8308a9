//! Point history engine.
//!
//! Stores linearly decaying balances as sparse checkpoints. The global
//! history gets one point per interval boundary crossed plus one per
//! mutation; each account gets one point per mutation of its lock. Slopes
//! stop contributing at their lock end through the slope-change schedule,
//! so the aggregate can be rebuilt at any time without touching every
//! account.
//!
//! Mutations are two-phase: [`PointHistory::prepare`] computes a
//! [`CheckpointPlan`] without touching state and may fail;
//! [`PointHistory::commit`] applies a plan and cannot fail.

use std::collections::{BTreeMap, HashMap};

use tidelock_core::constants::PRECISION;
use tidelock_core::error::{EscrowError, HistoryError};
use tidelock_core::math::{align_down, mul_div};
use tidelock_core::types::{AccountId, BlockContext, Point};
use tracing::debug;

/// One account's lock before and after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountChange {
    pub account: AccountId,
    /// End of the lock being replaced; 0 when there was none.
    pub old_end: u64,
    /// Bias of the new point at the checkpoint instant.
    pub new_bias: i128,
    pub new_slope: i128,
    /// End of the new lock; 0 when the account's point is being zeroed.
    pub new_end: u64,
}

impl AccountChange {
    /// A change that removes the account's contribution entirely.
    pub fn zeroed(account: AccountId, old_end: u64) -> Self {
        Self {
            account,
            old_end,
            new_bias: 0,
            new_slope: 0,
            new_end: 0,
        }
    }
}

/// Outcome of a bounded catch-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUp {
    /// History reaches the requested time.
    Complete,
    /// The step bound was hit; history now reaches `through`.
    Pending { through: u64 },
}

/// Everything a checkpoint would append, computed ahead of commit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct CheckpointPlan {
    boundaries: Vec<Point>,
    head: Option<Point>,
    user_point: Option<(AccountId, Point)>,
    slope_deltas: Vec<(u64, i128)>,
}

impl CheckpointPlan {
    /// Whether the plan reaches the call's timestamp.
    pub fn is_complete(&self) -> bool {
        self.head.is_some()
    }

    /// Timestamp the history will reach once committed.
    pub fn through(&self) -> Option<u64> {
        self.head
            .as_ref()
            .or(self.boundaries.last())
            .map(|p| p.timestamp)
    }

    /// Interval boundary points the plan appends before the head.
    pub fn boundary_count(&self) -> usize {
        self.boundaries.len()
    }
}

#[derive(Debug, Clone)]
pub struct PointHistory {
    interval: u64,
    max_steps: u32,
    points: Vec<Point>,
    user_points: HashMap<AccountId, Vec<Point>>,
    slope_changes: BTreeMap<u64, i128>,
}

impl PointHistory {
    /// Create a history whose genesis point is stamped with `ctx`.
    pub fn new(interval: u64, max_steps: u32, ctx: BlockContext) -> Self {
        Self {
            interval,
            max_steps,
            points: vec![Point::zero(ctx)],
            user_points: HashMap::new(),
            slope_changes: BTreeMap::new(),
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Index of the latest global point. The genesis point is epoch 0.
    pub fn epoch(&self) -> usize {
        self.points.len() - 1
    }

    pub fn point(&self, epoch: usize) -> Option<Point> {
        self.points.get(epoch).copied()
    }

    pub fn last_point(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    /// Number of points recorded for `account`.
    pub fn user_epoch(&self, account: &AccountId) -> usize {
        self.user_points.get(account).map_or(0, Vec::len)
    }

    /// The account's point at `epoch`, counted from 1.
    pub fn user_point(&self, account: &AccountId, epoch: usize) -> Option<Point> {
        let index = epoch.checked_sub(1)?;
        self.user_points.get(account)?.get(index).copied()
    }

    pub fn last_user_point(&self, account: &AccountId) -> Option<Point> {
        self.user_points.get(account)?.last().copied()
    }

    /// Scheduled slope decrement at `t`.
    pub fn slope_change(&self, t: u64) -> i128 {
        self.slope_changes.get(&t).copied().unwrap_or(0)
    }

    /// Plan a checkpoint at `ctx`, optionally applying one account's change.
    ///
    /// A plan that hits the step bound before reaching `ctx.timestamp` is
    /// incomplete: it carries only boundary points and ignores `change`.
    pub fn prepare(
        &self,
        ctx: BlockContext,
        change: Option<AccountChange>,
    ) -> Result<CheckpointPlan, EscrowError> {
        let last = self.last_point();
        let now = ctx.timestamp;
        if now < last.timestamp {
            return Err(HistoryError::NonMonotonicTime {
                last: last.timestamp,
                now,
            }
            .into());
        }
        if ctx.block < last.block {
            return Err(HistoryError::NonMonotonicBlock {
                last: last.block,
                now: ctx.block,
            }
            .into());
        }

        let block_slope = if now > last.timestamp {
            mul_div(
                u128::from(ctx.block - last.block),
                PRECISION,
                u128::from(now - last.timestamp),
            )?
        } else {
            0
        };

        let mut boundaries = Vec::new();
        let mut cur = last;
        let mut t_i = align_down(last.timestamp, self.interval);
        let mut reached = false;
        for _ in 0..self.max_steps {
            t_i = t_i.saturating_add(self.interval);
            let d_slope = if t_i > now {
                t_i = now;
                0
            } else {
                self.slope_change(t_i)
            };
            let dt = i128::from(t_i - cur.timestamp);
            cur.bias = cur.bias.saturating_sub(cur.slope.saturating_mul(dt)).max(0);
            cur.slope = (cur.slope - d_slope).max(0);
            cur.timestamp = t_i;
            if t_i == now {
                cur.block = ctx.block;
                reached = true;
                break;
            }
            let elapsed = u128::from(t_i - last.timestamp);
            cur.block = last.block + mul_div(block_slope, elapsed, PRECISION)? as u64;
            boundaries.push(cur);
        }

        if !reached {
            return Ok(CheckpointPlan {
                boundaries,
                head: None,
                user_point: None,
                slope_deltas: Vec::new(),
            });
        }

        let mut user_point = None;
        let mut slope_deltas = Vec::new();
        if let Some(change) = change {
            let (old_bias, old_slope) = match self.last_user_point(&change.account) {
                Some(p) if change.old_end > now => (p.value_at(now) as i128, p.slope),
                _ => (0, 0),
            };
            cur.slope = (cur.slope + change.new_slope - old_slope).max(0);
            cur.bias = (cur.bias + change.new_bias - old_bias).max(0);

            if change.old_end > now {
                slope_deltas.push((change.old_end, -old_slope));
            }
            if change.new_end > now {
                slope_deltas.push((change.new_end, change.new_slope));
            }
            user_point = Some((
                change.account,
                Point {
                    bias: change.new_bias.max(0),
                    slope: change.new_slope.max(0),
                    timestamp: now,
                    block: ctx.block,
                },
            ));
        }

        Ok(CheckpointPlan {
            boundaries,
            head: Some(cur),
            user_point,
            slope_deltas,
        })
    }

    /// Apply a prepared plan.
    pub fn commit(&mut self, plan: CheckpointPlan) -> CatchUp {
        let crossed = plan.boundaries.len();
        let through = plan.through();
        self.points.extend(plan.boundaries);
        for (t, delta) in plan.slope_deltas {
            *self.slope_changes.entry(t).or_insert(0) += delta;
        }
        if let Some((account, point)) = plan.user_point {
            debug!(%account, bias = point.bias, slope = point.slope, "history: user point");
            self.user_points.entry(account).or_default().push(point);
        }
        match plan.head {
            Some(head) => {
                debug!(
                    epoch = self.points.len(),
                    crossed,
                    bias = head.bias,
                    slope = head.slope,
                    "history: checkpoint"
                );
                self.points.push(head);
                CatchUp::Complete
            }
            None => CatchUp::Pending {
                through: through.unwrap_or(self.last_point().timestamp),
            },
        }
    }

    /// Advance the global history towards `ctx` without touching any account.
    pub fn checkpoint(&mut self, ctx: BlockContext) -> Result<CatchUp, EscrowError> {
        let plan = self.prepare(ctx, None)?;
        Ok(self.commit(plan))
    }

    // --- reads ---

    /// Voting power of `account` at time `t`.
    pub fn balance_of(&self, account: &AccountId, t: u64) -> u128 {
        let Some(history) = self.user_points.get(account) else {
            return 0;
        };
        let idx = history.partition_point(|p| p.timestamp <= t);
        match idx.checked_sub(1) {
            Some(i) => history[i].value_at(t),
            None => 0,
        }
    }

    /// Aggregate voting power at time `t`.
    pub fn total_supply(&self, t: u64) -> u128 {
        let idx = self.points.partition_point(|p| p.timestamp <= t);
        match idx.checked_sub(1) {
            Some(i) => self.supply_at(self.points[i], t),
            None => 0,
        }
    }

    /// Voting power of `account` as of block `block`.
    pub fn balance_of_at(&self, account: &AccountId, block: u64) -> u128 {
        let Some(history) = self.user_points.get(account) else {
            return 0;
        };
        let idx = history.partition_point(|p| p.block <= block);
        let Some(upoint) = idx.checked_sub(1).map(|i| history[i]) else {
            return 0;
        };
        match self.block_time(block) {
            Some(t) => upoint.value_at(t),
            None => 0,
        }
    }

    /// Aggregate voting power as of block `block`.
    pub fn total_supply_at(&self, block: u64) -> u128 {
        let idx = self.points.partition_point(|p| p.block <= block);
        let Some(point) = idx.checked_sub(1).map(|i| self.points[i]) else {
            return 0;
        };
        match self.block_time(block) {
            Some(t) => self.supply_at(point, t),
            None => 0,
        }
    }

    /// Interpolate the timestamp of `block` from the global history.
    ///
    /// `None` before the genesis point. Past the last point the last
    /// point's timestamp is used.
    fn block_time(&self, block: u64) -> Option<u64> {
        let idx = self.points.partition_point(|p| p.block <= block);
        let p0 = self.points.get(idx.checked_sub(1)?)?;
        let Some(p1) = self.points.get(idx) else {
            return Some(p0.timestamp);
        };
        let d_block = u128::from(p1.block - p0.block);
        if d_block == 0 {
            return Some(p0.timestamp);
        }
        let d_t = u128::from(p1.timestamp - p0.timestamp);
        let offset = d_t * u128::from(block - p0.block) / d_block;
        Some(p0.timestamp + offset as u64)
    }

    /// Extrapolate a global point forward to `t` through the schedule.
    fn supply_at(&self, point: Point, t: u64) -> u128 {
        let mut last = point;
        if t <= last.timestamp {
            return last.value_at(t);
        }
        for (&t_i, &d_slope) in self.slope_changes.range(last.timestamp + 1..=t) {
            let dt = i128::from(t_i - last.timestamp);
            last.bias = last.bias.saturating_sub(last.slope.saturating_mul(dt)).max(0);
            last.slope = (last.slope - d_slope).max(0);
            last.timestamp = t_i;
        }
        last.value_at(t)
    }
}
