//! Shared pool fixture for the integration tests.

#![allow(dead_code)]

use autocompounder::{
    Autocompounder, BackendConfig, CreateArgs, FixedPoint, Invocation, PoolConfig,
    SimulatedBackend, Transfer,
};
use solana_sdk::pubkey::Pubkey;

pub const BACKEND_ID: u64 = 42;
pub const ASSOCIATED_ID: u64 = 9;
pub const ASSET: u64 = 7;
pub const START: u64 = 100;
pub const END: u64 = 1_000;
pub const CLAIM_PERIOD: u64 = 500;

/// Account plus asset opt-in minimum balance
pub const SETUP_FUNDING: u64 = 200_000;
pub const COMPOUND_FEE: u64 = 19_100;
pub const STAKE_FEE: u64 = 3_000;
pub const UNSTAKE_FEE: u64 = 3_000;
pub const RECORD_FEE: u64 = 12_100;

/// Prepaid fee for a deposit that does not compound first
pub const PRE_LIVE_STAKE_FEE: u64 = COMPOUND_FEE + STAKE_FEE;
/// Prepaid fee for a deposit that compounds first
pub const LIVE_STAKE_FEE: u64 = 2 * COMPOUND_FEE;
/// Prepaid fee for a withdrawal that compounds first
pub const LIVE_WITHDRAW_FEE: u64 = COMPOUND_FEE + UNSTAKE_FEE;

pub type Pool = Autocompounder<SimulatedBackend>;

pub struct Harness {
    pub pool: Pool,
    pub admin: Pubkey,
}

impl Harness {
    /// Created but not set up.
    pub fn created() -> Self {
        let backend = SimulatedBackend::new(
            BACKEND_ID,
            BackendConfig { start_round: START, end_round: END, asset_id: ASSET },
        );
        let admin = Pubkey::new_unique();
        let pool = Autocompounder::create(
            Pubkey::new_unique(),
            &Invocation::new(admin, 1),
            backend,
            CreateArgs {
                backend_id: BACKEND_ID,
                associated_id: ASSOCIATED_ID,
                claiming_period: CLAIM_PERIOD,
            },
            PoolConfig::default(),
        )
        .expect("create");
        Self { pool, admin }
    }

    /// Created, funded and set up.
    pub fn new() -> Self {
        let mut h = Self::created();
        let ix = Invocation::new(h.admin, 2).with(h.pay(SETUP_FUNDING));
        h.pool.setup(&ix).expect("setup");
        h
    }

    pub fn pay(&self, amount: u64) -> Transfer {
        Transfer::Payment { receiver: self.pool.address(), amount }
    }

    pub fn deposit(&self, amount: u64) -> Transfer {
        Transfer::AssetTransfer { receiver: self.pool.address(), asset_id: ASSET, amount }
    }

    /// Opt in a fresh staker.
    pub fn staker(&mut self, round: u64) -> Pubkey {
        let who = Pubkey::new_unique();
        self.pool.opt_in(&Invocation::new(who, round)).expect("opt in");
        who
    }

    pub fn stake_ix(&self, who: Pubkey, round: u64, fee: u64, amount: u64) -> Invocation {
        Invocation::new(who, round).with(self.pay(fee)).with(self.deposit(amount))
    }

    pub fn withdraw_ix(&self, who: Pubkey, round: u64, fee: u64) -> Invocation {
        Invocation::new(who, round).with(self.pay(fee))
    }

    pub fn accrue(&mut self, amount: u64) {
        self.pool.backend_mut().accrue(amount).expect("accrue");
    }

    pub fn local(&self, who: &Pubkey) -> FixedPoint {
        self.pool.account(who).expect("opted in").local_stake
    }

    pub fn cursor(&self, who: &Pubkey) -> u64 {
        self.pool.account(who).expect("opted in").caught_up_to
    }

    /// Sum of withdrawable balances over all accounts.
    pub fn floors(&self) -> u64 {
        self.pool.accounts().map(|(_, a)| a.floor_stake()).sum()
    }
}

/// 1 + num/den as recorded by the pool.
pub fn growth(num: u64, den: u64) -> FixedPoint {
    FixedPoint::ONE
        .checked_add(FixedPoint::from_fraction(num, den).unwrap())
        .unwrap()
}
