//! Caller identity, round and the value transfers bundled with a call.
//!
//! Fees for backend calls are prepaid by the caller: every entry point that
//! spends them expects companion transfers at fixed positions just before
//! the call, counted back from the call itself.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::{
    error::{AutocompounderError, Result},
    state::Treasury,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transfer {
    /// Native-currency payment
    Payment { receiver: Pubkey, amount: u64 },
    /// Transfer of some asset
    AssetTransfer { receiver: Pubkey, asset_id: u64, amount: u64 },
}

impl Transfer {
    pub fn receiver(&self) -> Pubkey {
        match self {
            Transfer::Payment { receiver, .. } | Transfer::AssetTransfer { receiver, .. } => *receiver,
        }
    }
}

/// One externally invoked call, as the host presents it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub caller: Pubkey,
    pub round: u64,
    /// Transfers grouped ahead of the call, in group order
    pub companions: Vec<Transfer>,
}

impl Invocation {
    pub fn new(caller: Pubkey, round: u64) -> Self {
        Self { caller, round, companions: Vec::new() }
    }

    pub fn with(mut self, transfer: Transfer) -> Self {
        self.companions.push(transfer);
        self
    }

    /// Transfer `back` positions before the call (1 = directly before).
    fn companion(&self, back: usize) -> Result<&Transfer> {
        self.companions
            .len()
            .checked_sub(back)
            .and_then(|i| self.companions.get(i))
            .ok_or(AutocompounderError::InvalidCompanion("missing companion transfer"))
    }

    /// Amount of the native payment to `pool` at position `back`.
    pub fn expect_payment(&self, back: usize, pool: &Pubkey) -> Result<u64> {
        match self.companion(back)? {
            Transfer::Payment { receiver, amount } if receiver == pool => Ok(*amount),
            Transfer::Payment { .. } => {
                Err(AutocompounderError::InvalidCompanion("payment not addressed to the pool"))
            }
            Transfer::AssetTransfer { .. } => {
                Err(AutocompounderError::InvalidCompanion("expected a payment"))
            }
        }
    }

    /// Amount of the `asset_id` transfer to `pool` at position `back`.
    pub fn expect_asset_transfer(&self, back: usize, pool: &Pubkey, asset_id: u64) -> Result<u64> {
        match self.companion(back)? {
            Transfer::AssetTransfer { receiver, asset_id: id, amount } => {
                if receiver != pool {
                    return Err(AutocompounderError::InvalidCompanion(
                        "asset transfer not addressed to the pool",
                    ));
                }
                if *id != asset_id {
                    return Err(AutocompounderError::InvalidCompanion("wrong asset"));
                }
                Ok(*amount)
            }
            Transfer::Payment { .. } => {
                Err(AutocompounderError::InvalidCompanion("expected an asset transfer"))
            }
        }
    }
}

/// Credit every transfer addressed to `pool` to its treasury.
///
/// Asset transfers are accepted only once the pool holds the staking asset.
pub fn credit_companions(
    invocation: &Invocation,
    pool: &Pubkey,
    staking_asset: Option<u64>,
    treasury: &mut Treasury,
) -> Result<()> {
    for transfer in invocation.companions.iter().filter(|t| t.receiver() == *pool) {
        match *transfer {
            Transfer::Payment { amount, .. } => treasury.credit_native(amount)?,
            Transfer::AssetTransfer { asset_id, amount, .. } => match staking_asset {
                Some(id) if id == asset_id => treasury.credit_asset(amount)?,
                Some(_) => return Err(AutocompounderError::InvalidCompanion("wrong asset")),
                None => {
                    return Err(AutocompounderError::InvalidCompanion(
                        "pool is not opted into the staking asset",
                    ))
                }
            },
        }
    }
    Ok(())
}

pub fn require_min(provided: u64, required: u64) -> Result<()> {
    if provided < required {
        return Err(AutocompounderError::InsufficientFunding { required, provided });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pay(to: Pubkey, amount: u64) -> Transfer {
        Transfer::Payment { receiver: to, amount }
    }

    fn xfer(to: Pubkey, asset_id: u64, amount: u64) -> Transfer {
        Transfer::AssetTransfer { receiver: to, asset_id, amount }
    }

    #[test]
    fn positions_count_back_from_the_call() {
        let pool = Pubkey::new_unique();
        let ix = Invocation::new(Pubkey::new_unique(), 5)
            .with(pay(pool, 38_200))
            .with(xfer(pool, 7, 500));
        assert_eq!(ix.expect_asset_transfer(1, &pool, 7).unwrap(), 500);
        assert_eq!(ix.expect_payment(2, &pool).unwrap(), 38_200);
        assert_eq!(
            ix.expect_payment(3, &pool),
            Err(AutocompounderError::InvalidCompanion("missing companion transfer"))
        );
    }

    #[test]
    fn wrong_kind_receiver_or_asset_is_rejected() {
        let pool = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let ix = Invocation::new(other, 5).with(pay(other, 1)).with(xfer(pool, 8, 1));
        assert!(matches!(
            ix.expect_payment(2, &pool),
            Err(AutocompounderError::InvalidCompanion(_))
        ));
        assert!(matches!(
            ix.expect_payment(1, &pool),
            Err(AutocompounderError::InvalidCompanion(_))
        ));
        assert_eq!(
            ix.expect_asset_transfer(1, &pool, 7),
            Err(AutocompounderError::InvalidCompanion("wrong asset"))
        );
    }

    #[test]
    fn only_transfers_to_the_pool_are_credited() {
        let pool = Pubkey::new_unique();
        let ix = Invocation::new(Pubkey::new_unique(), 5)
            .with(pay(pool, 100))
            .with(pay(Pubkey::new_unique(), 999))
            .with(xfer(pool, 7, 40));
        let mut treasury = Treasury::default();
        credit_companions(&ix, &pool, Some(7), &mut treasury).unwrap();
        assert_eq!(treasury, Treasury { native_balance: 100, asset_balance: 40 });
    }

    #[test]
    fn asset_before_opt_in_is_rejected() {
        let pool = Pubkey::new_unique();
        let ix = Invocation::new(Pubkey::new_unique(), 5).with(xfer(pool, 7, 40));
        let mut treasury = Treasury::default();
        assert!(credit_companions(&ix, &pool, None, &mut treasury).is_err());
    }

    #[test]
    fn require_min_reports_both_sides() {
        assert!(require_min(10, 10).is_ok());
        assert_eq!(
            require_min(9, 10),
            Err(AutocompounderError::InsufficientFunding { required: 10, provided: 9 })
        );
    }
}
