use serde::{Deserialize, Serialize};

use crate::{
    error::{AutocompounderError, Result},
    fixed_point::FixedPoint,
};

// ─── Pool ──────────────────────────────────────────────────────────────────
// Singleton owned by the pool instance, threaded through every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Deposited by all stakers, accumulated through compounding
    pub total_stake: FixedPoint,
    /// Round at which the backend pool starts paying rewards
    pub pool_start_round: u64,
    /// Round at which the backend pool ends
    pub pool_end_round: u64,
    /// Round of the last compounding; 0 until setup
    pub last_compound_round: u64,
    /// Set once the pool-wide final compound after pool end has run
    pub last_compound_done: bool,
    /// Number of opted-in accounts
    pub staker_count: u64,
    /// Rounds after pool end before the administrator may tear down
    pub claiming_period: u64,
    /// Staking backend being compounded into
    pub backend_id: u64,
    /// Companion application the backend interacts with
    pub associated_id: u64,
    pub staking_asset_id: u64,
    pub asset_opted_in: bool,
    pub backend_registered: bool,
    /// Set once `delete_boxes` removed records: cursors may point past the
    /// ledger and no further record is appended
    pub ledger_truncated: bool,
    pub deleted: bool,
}

impl PoolState {
    pub fn is_set_up(&self) -> bool {
        self.last_compound_round > 0
    }

    /// Last round of the claim grace window.
    pub fn claim_window_end(&self) -> u64 {
        self.pool_end_round.saturating_add(self.claiming_period)
    }

    /// Teardown gate shared by `delete_boxes` and `delete`.
    pub fn teardown_allowed(&self, round: u64) -> bool {
        (self.staker_count == 0 && round > self.pool_end_round) || round > self.claim_window_end()
    }

    pub fn ensure_not_deleted(&self) -> Result<()> {
        if self.deleted {
            return Err(AutocompounderError::InvalidState("pool deleted"));
        }
        Ok(())
    }

    pub fn phase(&self, round: u64) -> PoolPhase {
        if self.deleted {
            PoolPhase::Deleted
        } else if self.pool_end_round == 0 {
            PoolPhase::Created
        } else if !self.is_set_up() {
            PoolPhase::ConfiguredUnset
        } else if round <= self.pool_end_round {
            PoolPhase::Live
        } else if self.teardown_allowed(round) {
            PoolPhase::Deletable
        } else if !self.last_compound_done {
            PoolPhase::Ended
        } else {
            PoolPhase::ClaimWindow
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolPhase {
    /// Instance exists but the backend configuration is not applied yet
    Created,
    /// Configured from the backend, `setup` not run
    ConfiguredUnset,
    /// Accepting stakers; compounding once past the start round
    Live,
    /// Past the end round, final compound still pending
    Ended,
    /// Funds unstaked; stakers withdraw from the pool's own balance
    ClaimWindow,
    /// Administrator may delete records and the pool
    Deletable,
    Deleted,
}

// ─── Staker ────────────────────────────────────────────────────────────────
// Created on opt-in, destroyed on opt-out once the integer balance is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerAccount {
    /// Share in absolute units, including all growth applied so far
    pub local_stake: FixedPoint,
    /// Index of the last compound record applied (0 = none)
    pub caught_up_to: u64,
}

impl StakerAccount {
    pub fn new(caught_up_to: u64) -> Self {
        Self { local_stake: FixedPoint::ZERO, caught_up_to }
    }

    /// Withdrawable integer amount.
    pub fn floor_stake(&self) -> u64 {
        self.local_stake.floor()
    }

    pub fn is_caught_up(&self, ledger_len: u64) -> bool {
        self.caught_up_to == ledger_len
    }
}

// ─── Compound record ───────────────────────────────────────────────────────
// Immutable once appended: the multiplicative growth of one compounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundRecord {
    pub index: u64,
    /// 1 + claimed / total_stake_before_claim
    pub growth: FixedPoint,
}

impl CompoundRecord {
    /// Storage key: big-endian index (8 bytes).
    pub fn key_bytes(&self) -> [u8; 8] {
        self.index.to_be_bytes()
    }

    /// Storage value: big-endian Q64.64 growth (16 bytes).
    pub fn value_bytes(&self) -> [u8; 16] {
        self.growth.to_be_bytes()
    }
}

// ─── Treasury ──────────────────────────────────────────────────────────────
// Balances held by the pool account itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    /// Native balance: prepaid fees plus storage deposits
    pub native_balance: u64,
    /// Staking asset not currently staked in the backend
    pub asset_balance: u64,
}

impl Treasury {
    pub fn credit_native(&mut self, amount: u64) -> Result<()> {
        self.native_balance = self
            .native_balance
            .checked_add(amount)
            .ok_or(AutocompounderError::MathOverflow)?;
        Ok(())
    }

    /// Spend prepaid fees.
    pub fn debit_native(&mut self, amount: u64) -> Result<()> {
        self.native_balance = self.native_balance.checked_sub(amount).ok_or(
            AutocompounderError::InsufficientFunding {
                required: amount,
                provided: self.native_balance,
            },
        )?;
        Ok(())
    }

    pub fn credit_asset(&mut self, amount: u64) -> Result<()> {
        self.asset_balance = self
            .asset_balance
            .checked_add(amount)
            .ok_or(AutocompounderError::MathOverflow)?;
        Ok(())
    }

    /// Move staking asset out of the pool; a shortfall means the books are off.
    pub fn debit_asset(&mut self, amount: u64) -> Result<()> {
        self.asset_balance = self
            .asset_balance
            .checked_sub(amount)
            .ok_or(AutocompounderError::InvariantViolation("asset balance below payout"))?;
        Ok(())
    }
}
