use tracing::debug;

use crate::{
    catch_up,
    error::Result,
    funding::Invocation,
    helpers::{load_account, store_account},
    Autocompounder,
};

/// Apply every record after the caller's cursor up to `up_to`.
pub fn handler<B>(pool: &mut Autocompounder<B>, ix: &Invocation, up_to: u64) -> Result<()> {
    let mut account = load_account(pool, &ix.caller)?;
    let from = account.caught_up_to;

    catch_up::apply_through(&mut account, &pool.ledger, up_to)?;
    store_account(pool, ix.caller, account);

    debug!(
        staker = %ix.caller,
        from,
        to = account.caught_up_to,
        local_stake = %account.local_stake,
        "caught up"
    );
    Ok(())
}
