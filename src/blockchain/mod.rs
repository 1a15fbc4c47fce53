pub mod block;

pub use block::Block;

use num_bigint::BigUint;

/// Default number of leading zero bits a block hash needs at chain length 0.
pub const POW_LEADING_ZEROES: u32 = 15;

/// Coinbase reward a miner may claim for finding a block proof.
pub const COINBASE_AMT_ALLOWED: u64 = 25;

/// Transaction slots per block (the Merkle tree capacity).
pub const MAX_BLOCK_TRANSACTIONS: usize = 8;

/// The target halves every this many blocks.
pub const DIFFICULTY_STEP_BLOCKS: u64 = 5;

/// 2^256 - 1: every SHA-256 value is at or below it.
pub fn pow_base_target() -> BigUint {
    (BigUint::from(1u8) << 256usize) - 1u32
}

pub fn pow_target(leading_zeroes: u32) -> BigUint {
    pow_base_target() >> leading_zeroes as usize
}
