use tracing::{debug, info};

use crate::{
    backend::{FeeMode, StakingBackend},
    catch_up,
    error::{AutocompounderError, Result},
    fixed_point::FixedPoint,
    funding::{require_min, Invocation},
    helpers::{load_account, store_account},
    Autocompounder,
};

/// Deposit the staking asset.
///
/// Companions, counted back from the call: the asset deposit directly
/// before it, the fee payment before that.
pub fn handler<B: StakingBackend>(pool: &mut Autocompounder<B>, ix: &Invocation) -> Result<()> {
    let round = ix.round;
    if round >= pool.state.pool_end_round {
        return Err(AutocompounderError::InvalidState("deposits closed: pool has ended"));
    }

    let mut account = load_account(pool, &ix.caller)?;
    let len = pool.ledger.len();
    if !account.is_caught_up(len) {
        // An empty account has nothing to catch up on: skip the history.
        if !account.local_stake.is_zero() {
            return Err(AutocompounderError::OutOfSequence {
                expected: len,
                got: account.caught_up_to,
            });
        }
        debug!(staker = %ix.caller, from = account.caught_up_to, to = len, "cursor fast-forwarded");
        account.caught_up_to = len;
    }

    let fee_paid = ix.expect_payment(2, &pool.address)?;
    let amount = ix.expect_asset_transfer(1, &pool.address, pool.state.staking_asset_id)?;
    if amount == 0 {
        return Err(AutocompounderError::InsufficientFunding { required: 1, provided: 0 });
    }

    let compound_fee = pool.config.fees.compound_fee()?;
    let compounds_first = round > pool.state.pool_start_round && !pool.state.total_stake.is_zero();

    if compounds_first {
        // This compounding plus one later trigger.
        let required = compound_fee
            .checked_mul(2)
            .ok_or(AutocompounderError::MathOverflow)?;
        require_min(fee_paid, required)?;

        pool.engine().trigger(amount, FeeMode::Pay, round)?;
        // The new record covers the old balance only; the deposit is added after.
        catch_up::apply(&mut account, &pool.ledger, pool.ledger.len())?;
    } else {
        // The transfer to the backend plus one later trigger.
        let required = compound_fee
            .checked_add(pool.config.fees.stake_fee()?)
            .ok_or(AutocompounderError::MathOverflow)?;
        require_min(fee_paid, required)?;

        pool.engine().stake(amount, FeeMode::Pay)?;
        pool.state.total_stake = pool.state.total_stake.checked_add(FixedPoint::from_int(amount))?;
    }

    account.local_stake = account.local_stake.checked_add(FixedPoint::from_int(amount))?;
    store_account(pool, ix.caller, account);

    info!(
        staker = %ix.caller,
        amount,
        compounded = compounds_first,
        local_stake = %account.local_stake,
        total_stake = %pool.state.total_stake,
        round,
        "staked"
    );
    Ok(())
}
