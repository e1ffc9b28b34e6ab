use tracing::info;

use crate::{
    backend::StakingBackend,
    error::{AutocompounderError, Result},
    funding::Invocation,
    helpers::require_admin,
    Autocompounder,
};

/// Opt into the staking asset and the backend. Runs once; afterwards
/// compounding counts from the pool start round.
pub fn handler<B: StakingBackend>(pool: &mut Autocompounder<B>, ix: &Invocation) -> Result<()> {
    require_admin(pool, &ix.caller)?;
    if pool.state.is_set_up() {
        return Err(AutocompounderError::InvalidState("pool already set up"));
    }

    pool.state.last_compound_round = pool.state.pool_start_round;
    pool.state.asset_opted_in = true;
    pool.backend.register()?;
    pool.state.backend_registered = true;

    info!(
        last_compound_round = pool.state.last_compound_round,
        asset_id = pool.state.staking_asset_id,
        "pool set up"
    );
    Ok(())
}
