use tracing::info;

use crate::{
    backend::{FeeMode, StakingBackend},
    catch_up,
    error::{AutocompounderError, Result},
    fixed_point::FixedPoint,
    funding::{require_min, Invocation},
    helpers::{load_account, require_caught_up, store_account},
    state::StakerAccount,
    Autocompounder,
};

/// How a withdrawal reaches the funds, by round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    /// Before the pool starts: nothing compounded yet
    PreLive,
    /// Compound first, then unstake the payout
    Live,
    /// First withdrawal after pool end: final compound, then unstake everything
    FinalCompound,
    /// Funds already sit in the pool
    Drained,
}

/// Withdraw `amount` and return what was paid out.
///
/// Requesting exactly the full withdrawable balance also pays out the
/// growth from the compounding this call runs.
pub fn handler<B: StakingBackend>(
    pool: &mut Autocompounder<B>,
    ix: &Invocation,
    amount: u64,
) -> Result<u64> {
    let mut account = load_account(pool, &ix.caller)?;
    require_caught_up(&account, pool.ledger.len())?;

    let fee_paid = ix.expect_payment(1, &pool.address)?;

    let floor_before = account.floor_stake();
    if amount > floor_before {
        return Err(AutocompounderError::InsufficientStake {
            requested: amount,
            available: floor_before,
        });
    }

    let round = ix.round;
    let regime = if round < pool.state.pool_start_round {
        Regime::PreLive
    } else if round <= pool.state.pool_end_round {
        Regime::Live
    } else if !pool.state.last_compound_done {
        Regime::FinalCompound
    } else {
        Regime::Drained
    };

    let fees = pool.config.fees;
    let paid = match regime {
        Regime::PreLive => {
            require_min(fee_paid, fees.unstake_fee()?)?;
            pool.engine().unstake(amount, FeeMode::Pay)?;
            amount
        }
        Regime::Live => {
            require_min(fee_paid, compound_and_unstake_fee(pool)?)?;
            let paid = compound_and_catch_up(pool, &mut account, amount, floor_before, round)?;
            pool.engine().unstake(paid, FeeMode::Pay)?;
            paid
        }
        Regime::FinalCompound => {
            require_min(fee_paid, compound_and_unstake_fee(pool)?)?;
            let paid = compound_and_catch_up(pool, &mut account, amount, floor_before, round)?;
            let everything = pool.state.total_stake.floor();
            pool.engine().unstake(everything, FeeMode::Pay)?;
            pool.state.last_compound_done = true;
            info!(unstaked = everything, round, "final compound done");
            paid
        }
        Regime::Drained => amount,
    };

    pool.treasury.debit_asset(paid)?;
    let paid_fp = FixedPoint::from_int(paid);
    pool.state.total_stake = pool.state.total_stake.checked_sub(paid_fp)?;
    account.local_stake = account.local_stake.checked_sub(paid_fp)?;
    store_account(pool, ix.caller, account);

    info!(
        staker = %ix.caller,
        requested = amount,
        paid,
        regime = ?regime,
        local_stake = %account.local_stake,
        total_stake = %pool.state.total_stake,
        round,
        "withdrawn"
    );
    Ok(paid)
}

fn compound_and_unstake_fee<B>(pool: &Autocompounder<B>) -> Result<u64> {
    pool.config
        .fees
        .compound_fee()?
        .checked_add(pool.config.fees.unstake_fee()?)
        .ok_or(AutocompounderError::MathOverflow)
}

/// Compound, apply the new record to the caller and settle the payout.
fn compound_and_catch_up<B: StakingBackend>(
    pool: &mut Autocompounder<B>,
    account: &mut StakerAccount,
    amount: u64,
    floor_before: u64,
    round: u64,
) -> Result<u64> {
    pool.engine().trigger(0, FeeMode::Pay, round)?;
    catch_up::apply(account, &pool.ledger, pool.ledger.len())?;
    if amount == floor_before {
        Ok(account.floor_stake())
    } else {
        Ok(amount)
    }
}
