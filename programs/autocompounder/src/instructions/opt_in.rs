use tracing::info;

use crate::{
    error::{AutocompounderError, Result},
    funding::Invocation,
    helpers::require_set_up,
    state::StakerAccount,
    Autocompounder,
};

/// Open an account for the caller. New accounts start caught up: history
/// from before they joined does not apply to them.
pub fn handler<B>(pool: &mut Autocompounder<B>, ix: &Invocation) -> Result<()> {
    if ix.round >= pool.state.pool_end_round {
        return Err(AutocompounderError::InvalidState("pool has ended"));
    }
    require_set_up(&pool.state)?;
    if pool.accounts.contains(&ix.caller) {
        return Err(AutocompounderError::AlreadyOptedIn(ix.caller));
    }

    let cursor = pool.ledger.len();
    pool.accounts.insert(ix.caller, StakerAccount::new(cursor));
    pool.state.staker_count = pool
        .state
        .staker_count
        .checked_add(1)
        .ok_or(AutocompounderError::MathOverflow)?;

    info!(staker = %ix.caller, caught_up_to = cursor, stakers = pool.state.staker_count, "opted in");
    Ok(())
}
