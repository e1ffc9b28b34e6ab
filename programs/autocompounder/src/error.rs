//! Error type shared by every pool operation.

use solana_sdk::pubkey::Pubkey;

/// Failure categories. Every failure aborts the whole operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    State,
    Sequence,
    InsufficientFunding,
    NotFound,
    InvariantViolation,
    Arithmetic,
    Backend,
    Parse,
}

/// All errors returned by the autocompounder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutocompounderError {
    // ── Authorization ────────────────────────────────────────────────────────
    #[error("Caller {caller} is not the pool administrator")]
    Unauthorized { caller: Pubkey },

    // ── Lifecycle ────────────────────────────────────────────────────────────
    /// Operation invoked outside its legal lifecycle phase.
    #[error("Invalid pool state: {0}")]
    InvalidState(&'static str),

    #[error("Account {0} is already opted in")]
    AlreadyOptedIn(Pubkey),

    #[error("Requested {requested} exceeds withdrawable stake {available}")]
    InsufficientStake { requested: u64, available: u64 },

    // ── Ordering ─────────────────────────────────────────────────────────────
    /// Catch-up or deletion supplied out of strict order.
    #[error("Out of sequence: expected {expected}, got {got}")]
    OutOfSequence { expected: u64, got: u64 },

    // ── Funding ──────────────────────────────────────────────────────────────
    #[error("Insufficient funding: required {required}, provided {provided}")]
    InsufficientFunding { required: u64, provided: u64 },

    /// Companion transfer has the wrong kind, receiver or asset.
    #[error("Invalid companion transfer: {0}")]
    InvalidCompanion(&'static str),

    // ── Lookup ───────────────────────────────────────────────────────────────
    #[error("Compound record {0} not found")]
    RecordNotFound(u64),

    #[error("Account {0} is not opted in")]
    AccountNotFound(Pubkey),

    // ── Bugs ─────────────────────────────────────────────────────────────────
    #[error("Invariant violation: {0}")]
    InvariantViolation(&'static str),

    // ── Arithmetic ───────────────────────────────────────────────────────────
    #[error("Math overflow")]
    MathOverflow,

    #[error("Division by zero")]
    DivideByZero,

    // ── Staking backend ──────────────────────────────────────────────────────
    #[error("Staking backend error: {0}")]
    Backend(String),

    /// Raw backend bytes could not be decoded.
    #[error("Parse error at offset {offset}: {reason}")]
    ParseError { offset: usize, reason: String },
}

impl AutocompounderError {
    pub fn kind(&self) -> ErrorKind {
        use AutocompounderError::*;
        match self {
            Unauthorized { .. } => ErrorKind::Authorization,
            InvalidState(_) | AlreadyOptedIn(_) | InsufficientStake { .. } => ErrorKind::State,
            OutOfSequence { .. } => ErrorKind::Sequence,
            InsufficientFunding { .. } | InvalidCompanion(_) => ErrorKind::InsufficientFunding,
            RecordNotFound(_) | AccountNotFound(_) => ErrorKind::NotFound,
            InvariantViolation(_) => ErrorKind::InvariantViolation,
            MathOverflow | DivideByZero => ErrorKind::Arithmetic,
            Backend(_) => ErrorKind::Backend,
            ParseError { .. } => ErrorKind::Parse,
        }
    }
}

/// Convenience alias so every module can write `Result<T>`.
pub type Result<T> = std::result::Result<T, AutocompounderError>;
