//! Staker accounts keyed by owner, with a running sum of withdrawable
//! balances.
//!
//! While a journal is open the first change to each account records its
//! prior value, so an aborted operation restores only what it touched.

use std::collections::BTreeMap;

use solana_sdk::pubkey::Pubkey;

use crate::state::StakerAccount;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakerBook {
    accounts: BTreeMap<Pubkey, StakerAccount>,
    /// Sum of `floor_stake()` over every account
    floors: u128,
    journal: Option<BTreeMap<Pubkey, Option<StakerAccount>>>,
}

impl StakerBook {
    pub fn len(&self) -> u64 {
        self.accounts.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get(&self, owner: &Pubkey) -> Option<&StakerAccount> {
        self.accounts.get(owner)
    }

    pub fn contains(&self, owner: &Pubkey) -> bool {
        self.accounts.contains_key(owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pubkey, &StakerAccount)> {
        self.accounts.iter()
    }

    /// Sum of withdrawable balances, kept up to date on every write.
    pub fn floors(&self) -> u128 {
        self.floors
    }

    pub fn insert(&mut self, owner: Pubkey, account: StakerAccount) {
        self.remember(owner);
        self.put(owner, Some(account));
    }

    pub fn remove(&mut self, owner: &Pubkey) -> Option<StakerAccount> {
        self.remember(*owner);
        self.put(*owner, None)
    }

    pub fn clear(&mut self) {
        let owners: Vec<Pubkey> = self.accounts.keys().copied().collect();
        for owner in owners {
            self.remember(owner);
        }
        self.accounts.clear();
        self.floors = 0;
    }

    /// Accounts written since `begin` that still exist.
    pub fn touched(&self) -> impl Iterator<Item = &StakerAccount> {
        self.journal
            .iter()
            .flat_map(|journal| journal.keys())
            .filter_map(|owner| self.accounts.get(owner))
    }

    // ─── Journal ──────────────────────────────────────────────────────────────

    pub(crate) fn begin(&mut self) {
        self.journal = Some(BTreeMap::new());
    }

    pub(crate) fn commit(&mut self) {
        self.journal = None;
    }

    pub(crate) fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (owner, prior) in journal {
            self.put(owner, prior);
        }
    }

    fn remember(&mut self, owner: Pubkey) {
        let prior = self.accounts.get(&owner).copied();
        if let Some(journal) = self.journal.as_mut() {
            journal.entry(owner).or_insert(prior);
        }
    }

    /// Write without journaling, keeping `floors` in step.
    fn put(&mut self, owner: Pubkey, account: Option<StakerAccount>) -> Option<StakerAccount> {
        let old = match account {
            Some(account) => {
                self.floors += u128::from(account.floor_stake());
                self.accounts.insert(owner, account)
            }
            None => self.accounts.remove(&owner),
        };
        if let Some(old) = old {
            self.floors -= u128::from(old.floor_stake());
        }
        old
    }
}
