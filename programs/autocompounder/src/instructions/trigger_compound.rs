use tracing::info;

use crate::{
    backend::{FeeMode, StakingBackend},
    error::{AutocompounderError, Result},
    fixed_point::FixedPoint,
    funding::Invocation,
    helpers::require_set_up,
    Autocompounder,
};

/// Permissionless keeper trigger, paid from the pool's prepaid fees.
/// Only accepted once the pacing schedule says the next compounding is due.
pub fn handler<B: StakingBackend>(pool: &mut Autocompounder<B>, ix: &Invocation) -> Result<FixedPoint> {
    require_set_up(&pool.state)?;
    if pool.state.last_compound_done {
        return Err(AutocompounderError::InvalidState("final compound already done"));
    }
    if pool.state.last_compound_round > pool.state.pool_end_round {
        return Err(AutocompounderError::InvalidState("pool has ended"));
    }
    if ix.round <= pool.state.pool_start_round {
        return Err(AutocompounderError::InvalidState("pool not live yet"));
    }

    let due = pool.next_compound_round()?;
    if ix.round < due {
        return Err(AutocompounderError::InvalidState("compounding not due yet"));
    }

    let growth = pool.engine().trigger(0, FeeMode::Pay, ix.round)?;
    info!(keeper = %ix.caller, due, round = ix.round, "keeper compounded");
    Ok(growth)
}
