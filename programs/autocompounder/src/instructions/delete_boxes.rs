use tracing::info;

use crate::{
    error::{AutocompounderError, Result},
    funding::Invocation,
    helpers::require_admin,
    Autocompounder,
};

/// Delete compound records from the newest down to, but excluding,
/// `down_to`. Returns how many were removed.
///
/// Once any record is gone no compounding may append again, and cursors of
/// remaining accounts may point past the ledger until `delete`.
pub fn handler<B>(pool: &mut Autocompounder<B>, ix: &Invocation, down_to: u64) -> Result<u64> {
    require_admin(pool, &ix.caller)?;
    if !pool.state.teardown_allowed(ix.round) {
        return Err(AutocompounderError::InvalidState(
            "records stay until stakers leave or the claim window closes",
        ));
    }

    let removed = pool.ledger.delete_range(down_to)?;
    if removed > 0 {
        pool.state.ledger_truncated = true;
    }
    info!(removed, remaining = pool.ledger.len(), round = ix.round, "compound records deleted");
    Ok(removed)
}
