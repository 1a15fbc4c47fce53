use thiserror::Error;

/// Structural failures of the transaction tree: caller misuse, not ledger contention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("transaction {0} not found in tree")]
    NotFound(String),

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("invalid tree encoding: {0}")]
    InvalidEncoding(String),
}

/// Why a transaction was not admitted into a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxRejection {
    #[error("duplicate transaction {0}")]
    Duplicate(String),

    #[error("unsigned transaction {0}")]
    Unsigned(String),

    #[error("invalid signature for transaction {0}")]
    InvalidSignature(String),

    #[error("insufficient funds for transaction {0}")]
    InsufficientFunds(String),

    #[error("block is already full")]
    BlockFull,

    #[error("replayed transaction {id} (nonce {nonce}, expected {expected})")]
    Replayed { id: String, nonce: u64, expected: u64 },

    #[error("out of order transaction {id} (nonce {nonce}, expected {expected})")]
    OutOfOrder { id: String, nonce: u64, expected: u64 },

    #[error("balance overflow crediting {0}")]
    BalanceOverflow(String),
}

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error("invalid block encoding: {0}")]
    InvalidEncoding(&'static str),

    #[error("rerun rejected transaction {id}: {reason}")]
    Rerun { id: String, reason: TxRejection },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("invalid hex: {0}")]
    InvalidHex(&'static str),

    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid DER signature")]
    InvalidSignature,

    #[error("invalid message length")]
    InvalidMessage,
}
