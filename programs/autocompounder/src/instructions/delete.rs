use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::{
    backend::{FeeMode, StakingBackend},
    error::{AutocompounderError, Result},
    fixed_point::FixedPoint,
    funding::Invocation,
    helpers::require_admin,
    state::Treasury,
    Autocompounder,
};

/// Everything handed to the administrator when the pool is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Teardown {
    pub recipient: Pubkey,
    pub asset: u64,
    pub native: u64,
    /// Accounts still open at deletion
    pub forfeited_accounts: u64,
}

/// Tear the pool down and close all funds to the administrator.
///
/// If no withdrawal ran the final compound, pending rewards are claimed and
/// any stake is recovered from the backend here, with fees pooled by the
/// caller. The ledger is already empty, so claimed rewards go to the
/// administrator without a record.
pub fn handler<B: StakingBackend>(pool: &mut Autocompounder<B>, ix: &Invocation) -> Result<Teardown> {
    require_admin(pool, &ix.caller)?;
    if !pool.state.teardown_allowed(ix.round) {
        return Err(AutocompounderError::InvalidState(
            "pool stays until stakers leave or the claim window closes",
        ));
    }
    if !pool.ledger.is_empty() {
        return Err(AutocompounderError::InvalidState("compound records remain"));
    }

    if !pool.state.last_compound_done {
        let staked = pool.state.total_stake.floor();
        if pool.state.backend_registered {
            if pool.backend.address().is_none() {
                return Err(AutocompounderError::InvariantViolation(
                    "staking backend address unresolved",
                ));
            }
            let mut engine = pool.engine();
            let claimed = engine.claim(FeeMode::DoNotPay)?;
            if staked > 0 {
                engine.unstake(staked, FeeMode::DoNotPay)?;
            }
            info!(claimed, unstaked = staked, "rewards and stake recovered from backend");
        }
        pool.state.last_compound_done = true;
    }

    let teardown = Teardown {
        recipient: pool.admin,
        asset: pool.treasury.asset_balance,
        native: pool.treasury.native_balance,
        forfeited_accounts: pool.state.staker_count,
    };
    pool.treasury = Treasury::default();

    if pool.state.backend_registered {
        pool.backend.deregister()?;
        pool.state.backend_registered = false;
    }
    pool.state.asset_opted_in = false;

    pool.accounts.clear();
    pool.state.staker_count = 0;
    pool.state.total_stake = FixedPoint::ZERO;
    pool.state.deleted = true;

    info!(
        recipient = %teardown.recipient,
        asset = teardown.asset,
        native = teardown.native,
        forfeited = teardown.forfeited_accounts,
        round = ix.round,
        "pool deleted"
    );
    Ok(teardown)
}
