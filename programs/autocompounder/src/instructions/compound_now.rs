use crate::{
    backend::{FeeMode, StakingBackend},
    error::{AutocompounderError, Result},
    fixed_point::FixedPoint,
    funding::{require_min, Invocation},
    helpers::require_set_up,
    Autocompounder,
};

/// Compound immediately, outside the keeper schedule. The caller pays the
/// whole compounding through the payment directly before the call.
pub fn handler<B: StakingBackend>(pool: &mut Autocompounder<B>, ix: &Invocation) -> Result<FixedPoint> {
    require_set_up(&pool.state)?;
    let (start, end) = (pool.state.pool_start_round, pool.state.pool_end_round);
    if ix.round <= start || ix.round >= end {
        return Err(AutocompounderError::InvalidState("pool not live"));
    }

    let paid = ix.expect_payment(1, &pool.address)?;
    require_min(paid, pool.config.fees.compound_fee()?)?;

    pool.engine().trigger(0, FeeMode::Pay, ix.round)
}
