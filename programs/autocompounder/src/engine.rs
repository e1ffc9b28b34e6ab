//! Claim-record-restake cycle and the backend fund movements around it.

use tracing::{debug, info};

use crate::{
    backend::{FeeMode, StakingBackend},
    config::FeeSchedule,
    error::{AutocompounderError, Result},
    fixed_point::FixedPoint,
    ledger::CompoundLedger,
    state::{PoolState, Treasury},
};

/// Split borrow of the pool parts a compounding touches.
pub struct CompoundEngine<'a, B> {
    pub state: &'a mut PoolState,
    pub ledger: &'a mut CompoundLedger,
    pub treasury: &'a mut Treasury,
    pub backend: &'a mut B,
    pub fees: &'a FeeSchedule,
}

impl<'a, B: StakingBackend> CompoundEngine<'a, B> {
    /// Claim rewards, record the growth they represent and re-stake them
    /// together with `extra_stake` (a deposit already held by the pool).
    ///
    /// The growth is computed against the pre-claim total, so the new record
    /// applies only to stake that existed before this call.
    pub fn trigger(&mut self, extra_stake: u64, fee: FeeMode, round: u64) -> Result<FixedPoint> {
        if self.state.ledger_truncated {
            return Err(AutocompounderError::InvalidState("compound records deleted"));
        }
        let total = self.state.total_stake;
        if total.is_zero() {
            return Err(AutocompounderError::InvariantViolation(
                "compounding with zero total stake",
            ));
        }
        if self.backend.address().is_none() {
            return Err(AutocompounderError::InvariantViolation(
                "staking backend address unresolved",
            ));
        }

        let claimed = self.claim(fee)?;

        // growth = 1 + claimed / total
        let growth = FixedPoint::ONE.checked_add(FixedPoint::from_int(claimed).checked_div(total)?)?;
        let index = self.ledger.append(growth);

        let stake_amt = claimed
            .checked_add(extra_stake)
            .ok_or(AutocompounderError::MathOverflow)?;
        if stake_amt > 0 {
            self.stake(stake_amt, fee)?;
            self.state.total_stake = total.checked_add(FixedPoint::from_int(stake_amt))?;
        }
        self.state.last_compound_round = round;

        info!(
            index,
            claimed,
            %growth,
            staked = stake_amt,
            total_stake = %self.state.total_stake,
            round,
            "compounded"
        );
        Ok(growth)
    }

    /// Claim from the backend; rewards land in the pool's asset balance.
    pub fn claim(&mut self, fee: FeeMode) -> Result<u64> {
        let claimed = self.backend.claim(fee)?.claimed_amount()?;
        self.charge(fee, self.fees.claim_fee()?)?;
        self.treasury.credit_asset(claimed)?;
        debug!(claimed, "rewards claimed");
        Ok(claimed)
    }

    /// Move `amount` of the pool's asset balance into the backend.
    pub fn stake(&mut self, amount: u64, fee: FeeMode) -> Result<()> {
        self.treasury.debit_asset(amount)?;
        self.backend.stake(amount, fee)?;
        self.charge(fee, self.fees.stake_fee()?)?;
        debug!(amount, "staked to backend");
        Ok(())
    }

    /// Pull `amount` out of the backend into the pool's asset balance.
    pub fn unstake(&mut self, amount: u64, fee: FeeMode) -> Result<()> {
        self.backend.unstake(amount, fee)?;
        self.charge(fee, self.fees.unstake_fee()?)?;
        self.treasury.credit_asset(amount)?;
        debug!(amount, "unstaked from backend");
        Ok(())
    }

    fn charge(&mut self, fee: FeeMode, amount: u64) -> Result<()> {
        match fee {
            FeeMode::Pay => self.treasury.debit_native(amount),
            FeeMode::DoNotPay => Ok(()),
        }
    }
}

// ─── Keeper pacing ───────────────────────────────────────────────────────────
// Spreads the remaining prepaid triggers evenly over the rounds left until
// pool end, so the fees run out exactly when the pool does.
//
//   triggers = available / compound_fee
//   next     = last_compound_round + (end - last_compound_round) / triggers
pub fn next_eligible_round(state: &PoolState, available: u64, compound_fee: u64) -> Result<u64> {
    let triggers = available
        .checked_div(compound_fee)
        .ok_or(AutocompounderError::DivideByZero)?;
    if triggers == 0 {
        return Err(AutocompounderError::InsufficientFunding {
            required: compound_fee,
            provided: available,
        });
    }
    let span = state
        .pool_end_round
        .checked_sub(state.last_compound_round)
        .ok_or(AutocompounderError::InvalidState("last compound is past pool end"))?;
    state
        .last_compound_round
        .checked_add(span / triggers)
        .ok_or(AutocompounderError::MathOverflow)
}
