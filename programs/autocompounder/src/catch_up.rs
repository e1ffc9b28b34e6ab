//! Lazy application of compound records to one staker's balance.
//!
//! Records must be applied strictly in order, each exactly once: the cursor
//! `caught_up_to` tells which records the balance already reflects.

use tracing::debug;

use crate::{
    error::{AutocompounderError, Result},
    fixed_point::FixedPoint,
    ledger::CompoundLedger,
    state::{CompoundRecord, StakerAccount},
};

/// Apply record `index`, which must directly follow the account's cursor.
pub fn apply(account: &mut StakerAccount, ledger: &CompoundLedger, index: u64) -> Result<()> {
    apply_record(account, ledger.get(index)?)
}

fn apply_record(account: &mut StakerAccount, record: &CompoundRecord) -> Result<()> {
    let expected = account
        .caught_up_to
        .checked_add(1)
        .ok_or(AutocompounderError::MathOverflow)?;
    if record.index != expected {
        return Err(AutocompounderError::OutOfSequence { expected, got: record.index });
    }

    account.local_stake = account.local_stake.checked_mul(record.growth)?;
    account.caught_up_to = record.index;
    debug!(index = record.index, local_stake = %account.local_stake, "record applied");
    Ok(())
}

/// Apply every record after the cursor up to and including `up_to`.
/// A target at or behind the cursor leaves the account unchanged.
pub fn apply_through(account: &mut StakerAccount, ledger: &CompoundLedger, up_to: u64) -> Result<()> {
    if up_to > ledger.len() {
        return Err(AutocompounderError::RecordNotFound(up_to));
    }
    // Work on a copy so a failure half-way leaves the account untouched.
    let mut next = *account;
    for record in ledger.range(next.caught_up_to.saturating_add(1), up_to)? {
        apply_record(&mut next, record)?;
    }
    *account = next;
    Ok(())
}

/// Balance the account would hold after catching up through the whole ledger.
pub fn pending_stake(account: &StakerAccount, ledger: &CompoundLedger) -> Result<FixedPoint> {
    let mut projected = *account;
    apply_through(&mut projected, ledger, ledger.len())?;
    Ok(projected.local_stake)
}
