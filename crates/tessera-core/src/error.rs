use thiserror::Error;

#[derive(Debug, Error)]
pub enum TesseraError {
    // ── Structural validation ────────────────────────────────────────────────
    #[error("invalid transaction structure: {0}")]
    Structural(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    // ── Spend validation ─────────────────────────────────────────────────────
    #[error("input transaction `{0}` does not exist")]
    InputDoesNotExist(String),

    #[error("double spend: {0}")]
    DoubleSpend(String),

    #[error("asset id mismatch: {0}")]
    AssetIdMismatch(String),

    #[error("amount error: {0}")]
    AmountError(String),

    // ── Signing ──────────────────────────────────────────────────────────────
    #[error("public key `{0}` is not paired with any of the given private keys")]
    KeypairMismatch(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    // ── Storage ──────────────────────────────────────────────────────────────
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
