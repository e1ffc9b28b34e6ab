//! Autocompounder: staking-pool proxy that claims and re-stakes rewards
//! for all of its stakers at once.
//!
//! Each compounding appends one growth factor to an append-only ledger;
//! stakers apply the factors they missed lazily, in order, exactly once.
//!
//! 11 instructions:
//!   create            read the backend window and asset; caller becomes admin
//!   setup             opt into the staking asset and the backend (admin, once)
//!   opt_in            open a staker account, caught up to the ledger
//!   stake             deposit the staking asset (compounds first while live)
//!   trigger_compound  permissionless keeper trigger, paced by prepaid fees
//!   compound_now      immediate compounding paid by the caller
//!   withdraw          withdraw stake; full withdrawals include fresh growth
//!   local_claim       apply missed growth records up to an index
//!   delete_boxes      drop ledger records after pool end (admin)
//!   close_out         close an account without withdrawable stake
//!   delete            recover funds and tear the pool down (admin)

// ─── Modules ──────────────────────────────────────────────────────────────────

pub mod backend;
pub mod book;
pub mod catch_up;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod fixed_point;
pub mod funding;
pub mod helpers;
pub mod instructions;
pub mod invariants;
pub mod ledger;
pub mod simulated;
pub mod state;

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

pub use backend::{BackendConfig, CallResult, FeeMode, StakingBackend};
pub use book::StakerBook;
pub use config::{FeeSchedule, PoolConfig};
pub use engine::CompoundEngine;
pub use error::{AutocompounderError, ErrorKind, Result};
pub use fixed_point::FixedPoint;
pub use funding::{Invocation, Transfer};
pub use instructions::{CreateArgs, Teardown};
pub use ledger::CompoundLedger;
pub use simulated::SimulatedBackend;
pub use state::{CompoundRecord, PoolPhase, PoolState, StakerAccount, Treasury};

// ─── Pool ─────────────────────────────────────────────────────────────────────

/// One pool instance with everything it owns.
///
/// Every entry point commits only if the handler and the post-condition
/// checks all succeed. Ledger and accounts journal their writes, so undoing
/// a failed operation costs what the operation touched.
#[derive(Debug, Clone)]
pub struct Autocompounder<B> {
    pub(crate) address: Pubkey,
    pub(crate) admin: Pubkey,
    pub(crate) config: PoolConfig,
    pub(crate) state: PoolState,
    pub(crate) ledger: CompoundLedger,
    pub(crate) accounts: StakerBook,
    pub(crate) treasury: Treasury,
    pub(crate) backend: B,
}

/// Read-only snapshot for keepers and dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub round: u64,
    pub phase: PoolPhase,
    pub total_stake: u64,
    pub staker_count: u64,
    pub ledger_len: u64,
    pub pool_start_round: u64,
    pub pool_end_round: u64,
    pub last_compound_round: u64,
    pub last_compound_done: bool,
    pub treasury: Treasury,
    pub min_balance: u64,
    /// `None` while no keeper trigger is funded or possible
    pub next_compound_round: Option<u64>,
}

impl<B: StakingBackend + Clone> Autocompounder<B> {
    /// Create a pool at `address`; `ix.caller` becomes the administrator.
    pub fn create(
        address: Pubkey,
        ix: &Invocation,
        backend: B,
        args: CreateArgs,
        config: PoolConfig,
    ) -> Result<Self> {
        let pool = instructions::create::handler(address, ix, backend, args, config)?;
        pool.check_post_conditions()?;
        Ok(pool)
    }

    pub fn setup(&mut self, ix: &Invocation) -> Result<()> {
        self.atomically("setup", ix, |pool| instructions::setup::handler(pool, ix))
    }

    pub fn opt_in(&mut self, ix: &Invocation) -> Result<()> {
        self.atomically("opt_in", ix, |pool| instructions::opt_in::handler(pool, ix))
    }

    pub fn stake(&mut self, ix: &Invocation) -> Result<()> {
        self.atomically("stake", ix, |pool| instructions::stake::handler(pool, ix))
    }

    pub fn trigger_compound(&mut self, ix: &Invocation) -> Result<FixedPoint> {
        self.atomically("trigger_compound", ix, |pool| {
            instructions::trigger_compound::handler(pool, ix)
        })
    }

    pub fn compound_now(&mut self, ix: &Invocation) -> Result<FixedPoint> {
        self.atomically("compound_now", ix, |pool| instructions::compound_now::handler(pool, ix))
    }

    pub fn withdraw(&mut self, ix: &Invocation, amount: u64) -> Result<u64> {
        self.atomically("withdraw", ix, |pool| {
            instructions::withdraw::handler(pool, ix, amount)
        })
    }

    pub fn local_claim(&mut self, ix: &Invocation, up_to: u64) -> Result<()> {
        self.atomically("local_claim", ix, |pool| {
            instructions::local_claim::handler(pool, ix, up_to)
        })
    }

    pub fn delete_boxes(&mut self, ix: &Invocation, down_to: u64) -> Result<u64> {
        self.atomically("delete_boxes", ix, |pool| {
            instructions::delete_boxes::handler(pool, ix, down_to)
        })
    }

    pub fn close_out(&mut self, ix: &Invocation) -> Result<()> {
        self.atomically("close_out", ix, |pool| instructions::close_out::handler(pool, ix))
    }

    pub fn delete(&mut self, ix: &Invocation) -> Result<Teardown> {
        self.atomically("delete", ix, |pool| instructions::delete::handler(pool, ix))
    }

    /// Run `handler` and keep its effects only on full success.
    fn atomically<T>(
        &mut self,
        op: &'static str,
        ix: &Invocation,
        handler: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if let Err(err) = self.state.ensure_not_deleted() {
            warn!(op, caller = %ix.caller, round = ix.round, kind = ?err.kind(), %err, "rejected");
            return Err(err);
        }

        let checkpoint = Checkpoint {
            state: self.state.clone(),
            treasury: self.treasury,
            backend: self.backend.clone(),
        };
        self.ledger.begin();
        self.accounts.begin();

        let outcome = self.credit_companions(ix).and_then(|()| {
            let out = handler(self)?;
            self.check_post_conditions()?;
            Ok(out)
        });

        match outcome {
            Ok(out) => {
                self.ledger.commit();
                self.accounts.commit();
                Ok(out)
            }
            Err(err) => {
                self.ledger.rollback();
                self.accounts.rollback();
                self.state = checkpoint.state;
                self.treasury = checkpoint.treasury;
                self.backend = checkpoint.backend;
                warn!(op, caller = %ix.caller, round = ix.round, kind = ?err.kind(), %err, "rolled back");
                Err(err)
            }
        }
    }
}

/// Fixed-size parts of the pool, restored wholesale on failure.
struct Checkpoint<B> {
    state: PoolState,
    treasury: Treasury,
    backend: B,
}

impl<B: StakingBackend> Autocompounder<B> {
    // ─── Queries ──────────────────────────────────────────────────────────────

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn admin(&self) -> Pubkey {
        self.admin
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn ledger(&self) -> &CompoundLedger {
        &self.ledger
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn account(&self, owner: &Pubkey) -> Option<&StakerAccount> {
        self.accounts.get(owner)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Pubkey, &StakerAccount)> {
        self.accounts.iter()
    }

    /// Full consistency scan over the ledger and every account.
    ///
    /// Operations check only what they touched; this walks everything.
    pub fn audit(&self) -> Result<()> {
        let accounts = self.accounts.iter().map(|(_, account)| account);
        invariants::check_invariants(&self.state, &self.ledger, accounts)?;
        invariants::check_running_floors(&self.accounts)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend evolves on its own (rewards accrue, outages happen).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Balance `owner` would hold after catching up on every record.
    pub fn pending_stake(&self, owner: &Pubkey) -> Result<FixedPoint> {
        let account = helpers::load_account(self, owner)?;
        catch_up::pending_stake(&account, &self.ledger)
    }

    /// Native balance the pool must keep at all times.
    pub fn min_balance(&self) -> Result<u64> {
        let live = self.state.is_set_up() && !self.state.deleted;
        self.config.min_balance(live, self.ledger.len())
    }

    /// Earliest round a keeper trigger is accepted, given the prepaid fees.
    pub fn next_compound_round(&self) -> Result<u64> {
        helpers::require_set_up(&self.state)?;
        let available = self.treasury.native_balance.saturating_sub(self.min_balance()?);
        engine::next_eligible_round(&self.state, available, self.config.fees.compound_fee()?)
    }

    pub fn status(&self, round: u64) -> Result<PoolStatus> {
        let next_compound_round = if self.state.deleted || self.state.last_compound_done {
            None
        } else {
            self.next_compound_round().ok()
        };
        Ok(PoolStatus {
            round,
            phase: self.state.phase(round),
            total_stake: self.state.total_stake.floor(),
            staker_count: self.state.staker_count,
            ledger_len: self.ledger.len(),
            pool_start_round: self.state.pool_start_round,
            pool_end_round: self.state.pool_end_round,
            last_compound_round: self.state.last_compound_round,
            last_compound_done: self.state.last_compound_done,
            treasury: self.treasury,
            min_balance: self.min_balance()?,
            next_compound_round,
        })
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    pub(crate) fn engine(&mut self) -> CompoundEngine<'_, B> {
        CompoundEngine {
            state: &mut self.state,
            ledger: &mut self.ledger,
            treasury: &mut self.treasury,
            backend: &mut self.backend,
            fees: &self.config.fees,
        }
    }

    fn credit_companions(&mut self, ix: &Invocation) -> Result<()> {
        let asset = self.state.asset_opted_in.then_some(self.state.staking_asset_id);
        funding::credit_companions(ix, &self.address, asset, &mut self.treasury)
    }

    fn check_post_conditions(&self) -> Result<()> {
        let required = self.min_balance()?;
        if self.treasury.native_balance < required {
            return Err(AutocompounderError::InsufficientFunding {
                required,
                provided: self.treasury.native_balance,
            });
        }
        invariants::check_touched(&self.state, &self.ledger, &self.accounts)
    }
}
