//! Pool-wide invariants.
//!
//! `check_touched` runs after every operation before it commits and only
//! looks at what the operation wrote. `check_invariants` walks the whole
//! pool and backs `Autocompounder::audit`.

use crate::{
    book::StakerBook,
    error::{AutocompounderError, Result},
    ledger::CompoundLedger,
    state::{PoolState, StakerAccount},
};

/// Stable identifiers for the checked invariants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvariantId {
    /// Ledger indices run 1..=len without gaps.
    LedgerContiguous,
    /// No cursor points past the newest record, until records are deleted.
    CursorsWithinLedger,
    /// `staker_count` matches the number of accounts.
    StakerCountMatches,
    /// Withdrawable balances never exceed the pool total.
    StakesCovered,
    /// The book's running sum matches its accounts.
    RunningFloorsMatch,
}

impl InvariantId {
    pub fn describe(self) -> &'static str {
        match self {
            InvariantId::LedgerContiguous => "ledger indices are not contiguous",
            InvariantId::CursorsWithinLedger => "account cursor past the newest record",
            InvariantId::StakerCountMatches => "staker count does not match accounts",
            InvariantId::StakesCovered => "account balances exceed total stake",
            InvariantId::RunningFloorsMatch => "running balance sum out of step",
        }
    }
}

impl From<InvariantId> for AutocompounderError {
    fn from(id: InvariantId) -> Self {
        AutocompounderError::InvariantViolation(id.describe())
    }
}

/// Full scan over the ledger and every account.
pub fn check_invariants<'a>(
    state: &PoolState,
    ledger: &CompoundLedger,
    accounts: impl IntoIterator<Item = &'a StakerAccount>,
) -> Result<()> {
    if !ledger.is_contiguous() {
        return Err(InvariantId::LedgerContiguous.into());
    }

    let len = ledger.len();
    let mut count: u64 = 0;
    let mut floors: u128 = 0;
    for account in accounts {
        if !state.ledger_truncated && account.caught_up_to > len {
            return Err(InvariantId::CursorsWithinLedger.into());
        }
        count += 1;
        floors += u128::from(account.floor_stake());
    }

    if count != state.staker_count {
        return Err(InvariantId::StakerCountMatches.into());
    }
    if floors > u128::from(state.total_stake.floor()) {
        return Err(InvariantId::StakesCovered.into());
    }
    Ok(())
}

/// Checks bounded by what the current operation wrote.
///
/// Operations only append at the tip or delete from it, so a consistent
/// tip implies a contiguous ledger given one before.
pub fn check_touched(state: &PoolState, ledger: &CompoundLedger, book: &StakerBook) -> Result<()> {
    if !ledger.tip_consistent() {
        return Err(InvariantId::LedgerContiguous.into());
    }
    if !state.ledger_truncated {
        let len = ledger.len();
        if book.touched().any(|account| account.caught_up_to > len) {
            return Err(InvariantId::CursorsWithinLedger.into());
        }
    }
    if book.len() != state.staker_count {
        return Err(InvariantId::StakerCountMatches.into());
    }
    if book.floors() > u128::from(state.total_stake.floor()) {
        return Err(InvariantId::StakesCovered.into());
    }
    Ok(())
}

/// Recomputes the book's running sum.
pub fn check_running_floors(book: &StakerBook) -> Result<()> {
    let floors: u128 = book.iter().map(|(_, account)| u128::from(account.floor_stake())).sum();
    if floors != book.floors() {
        return Err(InvariantId::RunningFloorsMatch.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::FixedPoint;
    use solana_sdk::pubkey::Pubkey;

    fn account(stake: u64, cursor: u64) -> StakerAccount {
        StakerAccount { local_stake: FixedPoint::from_int(stake), caught_up_to: cursor }
    }

    fn pool(total: u64, stakers: u64) -> PoolState {
        PoolState {
            total_stake: FixedPoint::from_int(total),
            staker_count: stakers,
            ..PoolState::default()
        }
    }

    #[test]
    fn consistent_pool_passes() {
        let mut ledger = CompoundLedger::new();
        ledger.append(FixedPoint::ONE);
        let accounts = [account(600, 1), account(400, 0)];
        assert!(check_invariants(&pool(1_000, 2), &ledger, &accounts).is_ok());
    }

    #[test]
    fn each_violation_is_reported() {
        let ledger = CompoundLedger::new();

        let err = check_invariants(&pool(1_000, 1), &ledger, &[account(10, 1)]).unwrap_err();
        assert_eq!(err, AutocompounderError::from(InvariantId::CursorsWithinLedger));

        let err = check_invariants(&pool(1_000, 2), &ledger, &[account(10, 0)]).unwrap_err();
        assert_eq!(err, AutocompounderError::from(InvariantId::StakerCountMatches));

        let err = check_invariants(&pool(1_000, 2), &ledger, &[account(600, 0), account(401, 0)])
            .unwrap_err();
        assert_eq!(err, AutocompounderError::from(InvariantId::StakesCovered));
    }

    #[test]
    fn fractional_dust_does_not_count() {
        let ledger = CompoundLedger::new();
        let dusty = StakerAccount {
            local_stake: FixedPoint::from_bits(FixedPoint::from_int(500).to_bits() + (1 << 63)),
            caught_up_to: 0,
        };
        assert!(check_invariants(&pool(1_000, 2), &ledger, &[dusty, dusty]).is_ok());
    }

    #[test]
    fn truncated_ledger_tolerates_stale_cursors() {
        let mut ledger = CompoundLedger::new();
        ledger.append(FixedPoint::ONE);
        ledger.delete_range(0).unwrap();

        let mut state = pool(1_000, 1);
        assert!(check_invariants(&state, &ledger, &[account(10, 1)]).is_err());
        state.ledger_truncated = true;
        assert!(check_invariants(&state, &ledger, &[account(10, 1)]).is_ok());
    }

    #[test]
    fn touched_check_sees_only_journaled_accounts() {
        let ledger = CompoundLedger::new();
        let (stale, fresh) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut book = StakerBook::default();
        book.insert(stale, account(10, 3));

        book.begin();
        book.insert(fresh, account(20, 0));
        assert!(check_touched(&pool(1_000, 2), &ledger, &book).is_ok());

        book.insert(fresh, account(20, 1));
        let err = check_touched(&pool(1_000, 2), &ledger, &book).unwrap_err();
        assert_eq!(err, AutocompounderError::from(InvariantId::CursorsWithinLedger));

        book.insert(fresh, account(20, 0));
        let err = check_touched(&pool(25, 2), &ledger, &book).unwrap_err();
        assert_eq!(err, AutocompounderError::from(InvariantId::StakesCovered));

        let err = check_touched(&pool(1_000, 3), &ledger, &book).unwrap_err();
        assert_eq!(err, AutocompounderError::from(InvariantId::StakerCountMatches));
    }

    #[test]
    fn running_floors_agree_with_accounts() {
        let mut book = StakerBook::default();
        book.insert(Pubkey::new_unique(), account(10, 0));
        book.insert(Pubkey::new_unique(), account(32, 0));
        assert!(check_running_floors(&book).is_ok());
        assert_eq!(book.floors(), 42);
    }
}
