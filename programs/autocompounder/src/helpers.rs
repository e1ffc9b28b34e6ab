use solana_sdk::pubkey::Pubkey;

use crate::{
    error::{AutocompounderError, Result},
    state::{PoolState, StakerAccount},
    Autocompounder,
};

pub fn require_admin<B>(pool: &Autocompounder<B>, caller: &Pubkey) -> Result<()> {
    if *caller != pool.admin {
        return Err(AutocompounderError::Unauthorized { caller: *caller });
    }
    Ok(())
}

pub fn require_set_up(state: &PoolState) -> Result<()> {
    if !state.is_set_up() {
        return Err(AutocompounderError::InvalidState("pool not set up"));
    }
    Ok(())
}

/// Copy of the caller's account; write it back with `store_account`.
pub fn load_account<B>(pool: &Autocompounder<B>, owner: &Pubkey) -> Result<StakerAccount> {
    pool.accounts
        .get(owner)
        .copied()
        .ok_or(AutocompounderError::AccountNotFound(*owner))
}

pub fn store_account<B>(pool: &mut Autocompounder<B>, owner: Pubkey, account: StakerAccount) {
    pool.accounts.insert(owner, account);
}

/// The caller must reflect every record before its balance may change.
pub fn require_caught_up(account: &StakerAccount, ledger_len: u64) -> Result<()> {
    if !account.is_caught_up(ledger_len) {
        return Err(AutocompounderError::OutOfSequence {
            expected: ledger_len,
            got: account.caught_up_to,
        });
    }
    Ok(())
}
