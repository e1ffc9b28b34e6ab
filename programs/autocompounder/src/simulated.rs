//! Deterministic in-memory staking backend.
//!
//! Holds the pool's stake, accrues rewards on demand and fails on request,
//! so lifecycle flows can be exercised without a host ledger. Published
//! state and claim logs use the same byte layouts as the real backend.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::{
    backend::{BackendConfig, CallResult, FeeMode, StakingBackend},
    error::{AutocompounderError, Result},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatedBackend {
    pub backend_id: u64,
    /// `None` simulates a backend whose address cannot be resolved
    pub address: Option<Pubkey>,
    pub start_round: u64,
    pub end_round: u64,
    pub asset_id: u64,
    /// Amount the pool has staked
    pub staked: u64,
    /// Rewards the next claim will deliver
    pub pending_rewards: u64,
    pub registered: bool,
    /// Calls made with the pool paying the fee
    pub paid_calls: u64,
    /// Calls whose fee was pooled by the caller
    pub pooled_calls: u64,
    /// While set, every call fails with this reason
    #[serde(skip)]
    outage: Option<String>,
}

impl SimulatedBackend {
    pub fn new(backend_id: u64, config: BackendConfig) -> Self {
        Self {
            backend_id,
            address: Some(Pubkey::new_unique()),
            start_round: config.start_round,
            end_round: config.end_round,
            asset_id: config.asset_id,
            staked: 0,
            pending_rewards: 0,
            registered: false,
            paid_calls: 0,
            pooled_calls: 0,
            outage: None,
        }
    }

    /// Add rewards for the next claim to deliver.
    pub fn accrue(&mut self, amount: u64) -> Result<()> {
        self.pending_rewards = self
            .pending_rewards
            .checked_add(amount)
            .ok_or(AutocompounderError::MathOverflow)?;
        debug!(amount, pending = self.pending_rewards, "rewards accrued");
        Ok(())
    }

    /// Fail every call with `reason` until `restore` is called.
    pub fn fail_calls(&mut self, reason: impl Into<String>) {
        self.outage = Some(reason.into());
    }

    pub fn restore(&mut self) {
        self.outage = None;
    }

    /// The state blob this backend publishes.
    pub fn published_state(&self) -> Vec<u8> {
        let mut blob = BackendConfig {
            start_round: self.start_round,
            end_round: self.end_round,
            asset_id: self.asset_id,
        }
        .encode();
        // Real backends publish more fields after the ones read here.
        blob.extend_from_slice(&self.staked.to_be_bytes());
        blob
    }

    fn begin_call(&mut self, fee: FeeMode) -> Result<()> {
        if let Some(reason) = &self.outage {
            return Err(AutocompounderError::Backend(reason.clone()));
        }
        match fee {
            FeeMode::Pay => self.paid_calls += 1,
            FeeMode::DoNotPay => self.pooled_calls += 1,
        }
        Ok(())
    }

    fn ensure_registered(&self) -> Result<()> {
        if !self.registered {
            return Err(AutocompounderError::Backend("pool is not registered".into()));
        }
        Ok(())
    }
}

impl StakingBackend for SimulatedBackend {
    fn address(&self) -> Option<Pubkey> {
        self.address
    }

    fn configuration(&self, backend_id: u64) -> Result<BackendConfig> {
        if backend_id != self.backend_id {
            return Err(AutocompounderError::Backend(format!(
                "unknown backend {backend_id}"
            )));
        }
        BackendConfig::decode(&self.published_state())
    }

    fn register(&mut self) -> Result<()> {
        self.begin_call(FeeMode::DoNotPay)?;
        if self.registered {
            return Err(AutocompounderError::Backend("pool already registered".into()));
        }
        self.registered = true;
        Ok(())
    }

    fn deregister(&mut self) -> Result<()> {
        self.begin_call(FeeMode::DoNotPay)?;
        self.registered = false;
        Ok(())
    }

    fn stake(&mut self, amount: u64, fee: FeeMode) -> Result<()> {
        self.begin_call(fee)?;
        self.ensure_registered()?;
        self.staked = self
            .staked
            .checked_add(amount)
            .ok_or(AutocompounderError::MathOverflow)?;
        Ok(())
    }

    fn unstake(&mut self, amount: u64, fee: FeeMode) -> Result<()> {
        self.begin_call(fee)?;
        self.ensure_registered()?;
        self.staked = self.staked.checked_sub(amount).ok_or_else(|| {
            AutocompounderError::Backend(format!(
                "cannot unstake {amount}: only {} staked",
                self.staked
            ))
        })?;
        Ok(())
    }

    fn claim(&mut self, fee: FeeMode) -> Result<CallResult> {
        self.begin_call(fee)?;
        self.ensure_registered()?;
        let claimed = std::mem::take(&mut self.pending_rewards);
        Ok(CallResult::claim(claimed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SimulatedBackend {
        let mut b = SimulatedBackend::new(
            42,
            BackendConfig { start_round: 10, end_round: 20, asset_id: 7 },
        );
        b.register().unwrap();
        b
    }

    #[test]
    fn configuration_round_trips_through_the_blob() {
        let b = backend();
        assert!(b.published_state().len() > BackendConfig::MIN_BLOB_LEN);
        let config = b.configuration(42).unwrap();
        assert_eq!(config.start_round, 10);
        assert_eq!(config.end_round, 20);
        assert_eq!(config.asset_id, 7);
        assert!(b.configuration(43).is_err());
    }

    #[test]
    fn claim_drains_pending_rewards() {
        let mut b = backend();
        b.accrue(60).unwrap();
        b.accrue(40).unwrap();
        assert_eq!(b.claim(FeeMode::Pay).unwrap().claimed_amount().unwrap(), 100);
        assert_eq!(b.claim(FeeMode::Pay).unwrap().claimed_amount().unwrap(), 0);
        assert_eq!(b.paid_calls, 2);
    }

    #[test]
    fn unstake_more_than_staked_fails() {
        let mut b = backend();
        b.stake(50, FeeMode::Pay).unwrap();
        assert!(matches!(
            b.unstake(51, FeeMode::DoNotPay),
            Err(AutocompounderError::Backend(_))
        ));
        b.unstake(50, FeeMode::DoNotPay).unwrap();
        assert_eq!(b.staked, 0);
    }

    #[test]
    fn outage_fails_calls_until_restored() {
        let mut b = backend();
        b.fail_calls("node unreachable");
        assert_eq!(
            b.stake(1, FeeMode::Pay),
            Err(AutocompounderError::Backend("node unreachable".into()))
        );
        assert!(b.claim(FeeMode::Pay).is_err());
        b.restore();
        b.stake(1, FeeMode::Pay).unwrap();
        assert_eq!(b.staked, 1);
    }

    #[test]
    fn calls_require_registration() {
        let mut b = backend();
        b.deregister().unwrap();
        assert!(b.stake(1, FeeMode::Pay).is_err());
    }
}
