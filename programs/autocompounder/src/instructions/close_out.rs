use tracing::info;

use crate::{
    error::{AutocompounderError, Result},
    funding::Invocation,
    helpers::load_account,
    Autocompounder,
};

/// Close the caller's account. Only an account without a withdrawable
/// balance may leave; fractional dust is forfeited.
pub fn handler<B>(pool: &mut Autocompounder<B>, ix: &Invocation) -> Result<()> {
    let account = load_account(pool, &ix.caller)?;
    let remaining = account.floor_stake();
    if remaining > 0 {
        return Err(AutocompounderError::InvalidState(
            "stake must be withdrawn before closing out",
        ));
    }

    pool.accounts.remove(&ix.caller);
    pool.state.staker_count = pool
        .state
        .staker_count
        .checked_sub(1)
        .ok_or(AutocompounderError::InvariantViolation("staker count underflow"))?;

    info!(staker = %ix.caller, stakers = pool.state.staker_count, "closed out");
    Ok(())
}
