//! Block validation and integrity core for a small proof-of-work chain:
//! fixed-capacity Merkle trees of transactions, account balances with
//! replay-safe nonces, and proof-of-work checks against a target that
//! halves every few blocks.

pub mod blockchain;
pub mod config;
pub mod error;
pub mod hashing;
pub mod merkle;
pub mod transaction;
pub mod wallet;

pub use blockchain::Block;
pub use config::ChainConfig;
pub use error::{BlockError, MerkleError, TxRejection, WalletError};
pub use merkle::{FixedMerkleTree, MerkleProof};
pub use transaction::{Transaction, TxOutput};
