use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::{
    backend::StakingBackend,
    book::StakerBook,
    config::PoolConfig,
    error::{AutocompounderError, Result},
    funding::{credit_companions, Invocation},
    ledger::CompoundLedger,
    state::{PoolState, Treasury},
    Autocompounder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateArgs {
    /// Staking backend to compound into
    pub backend_id: u64,
    /// Application the backend interacts with
    pub associated_id: u64,
    /// Rounds after pool end before the pool may be torn down
    pub claiming_period: u64,
}

/// Create the pool and read the backend's window and asset once.
/// The caller becomes the administrator.
pub fn handler<B: StakingBackend>(
    address: Pubkey,
    ix: &Invocation,
    backend: B,
    args: CreateArgs,
    config: PoolConfig,
) -> Result<Autocompounder<B>> {
    config.validate()?;

    let published = backend.configuration(args.backend_id)?;
    if published.start_round == 0 {
        return Err(AutocompounderError::InvalidState("backend start round is zero"));
    }
    if published.end_round <= published.start_round {
        return Err(AutocompounderError::InvalidState("backend pool window is empty"));
    }

    let blank = PoolState::default();
    let state = PoolState {
        pool_start_round: published.start_round,
        pool_end_round: published.end_round,
        claiming_period: args.claiming_period,
        backend_id: args.backend_id,
        associated_id: args.associated_id,
        staking_asset_id: published.asset_id,
        ..blank.clone()
    };

    // Only native payments can arrive before the asset opt-in.
    let mut treasury = Treasury::default();
    credit_companions(ix, &address, None, &mut treasury)?;

    debug!(from = ?blank.phase(ix.round), to = ?state.phase(ix.round), "pool configured");
    info!(
        pool = %address,
        admin = %ix.caller,
        backend_id = args.backend_id,
        start = published.start_round,
        end = published.end_round,
        asset_id = published.asset_id,
        "pool created"
    );

    Ok(Autocompounder {
        address,
        admin: ix.caller,
        config,
        state,
        ledger: CompoundLedger::new(),
        accounts: StakerBook::default(),
        treasury,
        backend,
    })
}
