//! Narrow call interface to the staking backend being compounded into.
//!
//! Calls are synchronous and fatal on failure: an error aborts the whole
//! enclosing operation and nothing is retried here.

use solana_sdk::pubkey::Pubkey;

use crate::{
    constants::*,
    error::{AutocompounderError, Result},
};

/// Who pays the fixed fee of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeMode {
    /// The pool's own balance pays the fee
    Pay,
    /// The fee is pooled from the caller's companion transaction
    DoNotPay,
}

/// Configuration the backend publishes, read once at pool creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    pub start_round: u64,
    pub end_round: u64,
    pub asset_id: u64,
}

impl BackendConfig {
    /// Smallest blob holding every field.
    pub const MIN_BLOB_LEN: usize = BACKEND_END_ROUND_OFFSET + 8;

    /// Decode the backend's published state blob.
    ///
    /// Layout (big-endian u64s at fixed offsets):
    /// ```text
    /// … asset_id @48  start_round @56  end_round @64 …
    /// ```
    pub fn decode(blob: &[u8]) -> Result<Self> {
        if blob.len() < Self::MIN_BLOB_LEN {
            return Err(AutocompounderError::ParseError {
                offset: 0,
                reason: format!(
                    "backend state is {} bytes; expected at least {}",
                    blob.len(),
                    Self::MIN_BLOB_LEN
                ),
            });
        }
        Ok(Self {
            start_round: read_u64_be(blob, BACKEND_START_ROUND_OFFSET)?,
            end_round: read_u64_be(blob, BACKEND_END_ROUND_OFFSET)?,
            asset_id: read_u64_be(blob, BACKEND_ASSET_ID_OFFSET)?,
        })
    }

    /// Write the fields into a blob of `MIN_BLOB_LEN` bytes, other bytes zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut blob = vec![0u8; Self::MIN_BLOB_LEN];
        write_u64_be(&mut blob, BACKEND_ASSET_ID_OFFSET, self.asset_id);
        write_u64_be(&mut blob, BACKEND_START_ROUND_OFFSET, self.start_round);
        write_u64_be(&mut blob, BACKEND_END_ROUND_OFFSET, self.end_round);
        blob
    }
}

/// Structured result of a backend call: the logs it emitted, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallResult {
    pub logs: Vec<Vec<u8>>,
}

impl CallResult {
    /// Build the result the backend emits for a claim of `amount`.
    pub fn claim(amount: u64) -> Self {
        let mut log = vec![0u8; CLAIM_LOG_AMOUNT_OFFSET + 8];
        write_u64_be(&mut log, CLAIM_LOG_AMOUNT_OFFSET, amount);
        Self { logs: vec![log] }
    }

    /// Claimed amount: big-endian u64 at byte 16 of the last log.
    pub fn claimed_amount(&self) -> Result<u64> {
        let last = self.logs.last().ok_or_else(|| AutocompounderError::ParseError {
            offset: CLAIM_LOG_AMOUNT_OFFSET,
            reason: "claim produced no log".into(),
        })?;
        read_u64_be(last, CLAIM_LOG_AMOUNT_OFFSET)
    }
}

pub trait StakingBackend {
    /// Address receiving staked funds; `None` if the backend cannot be resolved.
    fn address(&self) -> Option<Pubkey>;

    fn configuration(&self, backend_id: u64) -> Result<BackendConfig>;

    /// Opt the pool into the backend.
    fn register(&mut self) -> Result<()>;

    /// Clear the pool's registration with the backend.
    fn deregister(&mut self) -> Result<()>;

    fn stake(&mut self, amount: u64, fee: FeeMode) -> Result<()>;

    fn unstake(&mut self, amount: u64, fee: FeeMode) -> Result<()>;

    /// Claim accrued rewards; they are delivered to the pool.
    fn claim(&mut self, fee: FeeMode) -> Result<CallResult>;
}

// ─── Byte-slice primitives ────────────────────────────────────────────────────

pub(crate) fn read_u64_be(data: &[u8], offset: usize) -> Result<u64> {
    let b: [u8; 8] = data
        .get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| AutocompounderError::ParseError {
            offset,
            reason: "slice too short for u64".into(),
        })?;
    Ok(u64::from_be_bytes(b))
}

fn write_u64_be(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
}
