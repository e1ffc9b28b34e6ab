use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    error::{AutocompounderError, Result},
};

// ─── Fee schedule ──────────────────────────────────────────────────────────
// Every backend call carries a fixed minimum fee. Stakers prepay these fees
// through companion payments; the pool's own balance spends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Host minimum transaction fee
    pub min_tx_fee: u64,
    pub record_fee_base: u64,
    pub record_fee_per_byte: u64,
    pub record_key_size: u64,
    pub record_value_size: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            min_tx_fee: MIN_TX_FEE,
            record_fee_base: RECORD_FEE_BASE,
            record_fee_per_byte: RECORD_FEE_PER_BYTE,
            record_key_size: RECORD_KEY_SIZE,
            record_value_size: RECORD_VALUE_SIZE,
        }
    }
}

impl FeeSchedule {
    pub fn stake_fee(&self) -> Result<u64> {
        mul_fee(self.min_tx_fee, STAKE_FEE_MULTIPLIER)
    }

    pub fn unstake_fee(&self) -> Result<u64> {
        mul_fee(self.min_tx_fee, UNSTAKE_FEE_MULTIPLIER)
    }

    pub fn claim_fee(&self) -> Result<u64> {
        mul_fee(self.min_tx_fee, CLAIM_FEE_MULTIPLIER)
    }

    /// Storage deposit locked by one ledger entry.
    pub fn record_fee(&self) -> Result<u64> {
        let bytes = self
            .record_key_size
            .checked_add(self.record_value_size)
            .ok_or(AutocompounderError::MathOverflow)?;
        mul_fee(self.record_fee_per_byte, bytes)?
            .checked_add(self.record_fee_base)
            .ok_or(AutocompounderError::MathOverflow)
    }

    /// Everything one compounding costs: ledger entry + claim + re-stake.
    pub fn compound_fee(&self) -> Result<u64> {
        let (record, claim, stake) = (self.record_fee()?, self.claim_fee()?, self.stake_fee()?);
        record
            .checked_add(claim)
            .and_then(|v| v.checked_add(stake))
            .ok_or(AutocompounderError::MathOverflow)
    }
}

fn mul_fee(value: u64, factor: u64) -> Result<u64> {
    value
        .checked_mul(factor)
        .ok_or(AutocompounderError::MathOverflow)
}

// ─── Pool configuration ────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub fees: FeeSchedule,
    /// Minimum balance of the pool account once funded
    pub account_min_balance: u64,
    /// Extra minimum balance while opted into the staking asset
    pub asset_opt_in_min_balance: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            fees: FeeSchedule::default(),
            account_min_balance: ACCOUNT_MIN_BALANCE,
            asset_opt_in_min_balance: ASSET_OPT_IN_MIN_BALANCE,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fees.min_tx_fee == 0 {
            return Err(AutocompounderError::InvalidState("min_tx_fee must be non-zero"));
        }
        if self.fees.record_key_size == 0 || self.fees.record_value_size == 0 {
            return Err(AutocompounderError::InvalidState("ledger entry size must be non-zero"));
        }
        // Surfaces overflow in any derived fee up front.
        self.fees.compound_fee()?;
        self.fees.unstake_fee()?;
        Ok(())
    }

    /// Native balance the pool must keep: nothing until it is set up, then
    /// the account and asset minimums plus the deposit of every live record.
    pub fn min_balance(&self, set_up: bool, records: u64) -> Result<u64> {
        if !set_up {
            return Ok(0);
        }
        let deposits = mul_fee(self.fees.record_fee()?, records)?;
        self.account_min_balance
            .checked_add(self.asset_opt_in_min_balance)
            .and_then(|v| v.checked_add(deposits))
            .ok_or(AutocompounderError::MathOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fee_table() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.stake_fee().unwrap(), 3_000);
        assert_eq!(fees.unstake_fee().unwrap(), 3_000);
        assert_eq!(fees.claim_fee().unwrap(), 4_000);
        assert_eq!(fees.record_fee().unwrap(), 2_500 + 400 * 24);
        assert_eq!(fees.compound_fee().unwrap(), 12_100 + 4_000 + 3_000);
    }

    #[test]
    fn fees_scale_with_base() {
        let fees = FeeSchedule { min_tx_fee: 2_000, ..FeeSchedule::default() };
        assert_eq!(fees.stake_fee().unwrap(), 6_000);
        assert_eq!(fees.claim_fee().unwrap(), 8_000);
        assert_eq!(fees.record_fee().unwrap(), 12_100);
    }

    #[test]
    fn validate_rejects_zero_base_fee() {
        let mut config = PoolConfig::default();
        assert!(config.validate().is_ok());
        config.fees.min_tx_fee = 0;
        assert!(matches!(
            config.validate(),
            Err(AutocompounderError::InvalidState(_))
        ));
    }

    #[test]
    fn validate_rejects_overflowing_fees() {
        let config = PoolConfig {
            fees: FeeSchedule { min_tx_fee: u64::MAX, ..FeeSchedule::default() },
            ..PoolConfig::default()
        };
        assert_eq!(config.validate(), Err(AutocompounderError::MathOverflow));
    }

    #[test]
    fn min_balance_grows_with_records() {
        let config = PoolConfig::default();
        assert_eq!(config.min_balance(false, 5).unwrap(), 0);
        assert_eq!(config.min_balance(true, 0).unwrap(), 200_000);
        assert_eq!(config.min_balance(true, 3).unwrap(), 200_000 + 3 * 12_100);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: PoolConfig =
            serde_json::from_str(r#"{ "fees": { "min_tx_fee": 2000 } }"#).unwrap();
        assert_eq!(config.fees.min_tx_fee, 2_000);
        assert_eq!(config.fees.record_fee_base, RECORD_FEE_BASE);
        assert_eq!(config.account_min_balance, ACCOUNT_MIN_BALANCE);
    }
}
