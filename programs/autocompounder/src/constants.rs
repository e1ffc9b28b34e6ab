/// Host minimum transaction fee (base unit of every fee below)
pub const MIN_TX_FEE: u64 = 1_000;

/// Backend call fees, as multiples of MIN_TX_FEE.
/// Must match the backend exactly: it rejects under-funded inner calls.
pub const STAKE_FEE_MULTIPLIER: u64 = 3;
pub const UNSTAKE_FEE_MULTIPLIER: u64 = 3;
pub const CLAIM_FEE_MULTIPLIER: u64 = 4;

/// Ledger-entry storage fee: base + per_byte × (key + value)
pub const RECORD_FEE_BASE: u64 = 2_500;
pub const RECORD_FEE_PER_BYTE: u64 = 400;
/// Ledger-entry key: big-endian u64 index
pub const RECORD_KEY_SIZE: u64 = 8;
/// Ledger-entry value: Q64.64 growth factor, 16 bytes
pub const RECORD_VALUE_SIZE: u64 = 16;

/// Minimum balance of any funded host account
pub const ACCOUNT_MIN_BALANCE: u64 = 100_000;
/// Additional minimum balance held while opted into the staking asset
pub const ASSET_OPT_IN_MIN_BALANCE: u64 = 100_000;

/// Byte offsets inside the backend's published state blob (big-endian u64s)
pub const BACKEND_ASSET_ID_OFFSET: usize = 48;
pub const BACKEND_START_ROUND_OFFSET: usize = 56;
pub const BACKEND_END_ROUND_OFFSET: usize = 64;

/// Byte offset of the claimed amount inside the backend's last claim log
pub const CLAIM_LOG_AMOUNT_OFFSET: usize = 16;

/// Q64.64 fixed-point scale
pub const Q64: u128 = 1u128 << 64;
