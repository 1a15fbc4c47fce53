use num_bigint::BigUint;
use std::env;

use crate::blockchain::{
    COINBASE_AMT_ALLOWED, MAX_BLOCK_TRANSACTIONS, POW_LEADING_ZEROES, pow_target,
};

/// Parameters every block of a chain is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Base proof-of-work target before the per-length difficulty steps.
    pub pow_target: BigUint,
    pub coinbase_reward: u64,
    pub max_block_transactions: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            pow_target: pow_target(POW_LEADING_ZEROES),
            coinbase_reward: COINBASE_AMT_ALLOWED,
            max_block_transactions: MAX_BLOCK_TRANSACTIONS,
        }
    }
}

impl ChainConfig {
    /// Load `.env` (if present) and read `POW_LEADING_ZEROES`, `COINBASE_REWARD`
    /// and `MAX_BLOCK_TRANSACTIONS`. Missing or unparsable values fall back
    /// to the defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let leading_zeroes: Option<u32> =
            lookup("POW_LEADING_ZEROES").and_then(|v| v.parse().ok());

        Self {
            pow_target: leading_zeroes.map_or(defaults.pow_target, pow_target),
            coinbase_reward: lookup("COINBASE_REWARD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.coinbase_reward),
            max_block_transactions: lookup("MAX_BLOCK_TRANSACTIONS")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_block_transactions),
        }
    }

    pub fn with_leading_zeroes(mut self, leading_zeroes: u32) -> Self {
        self.pow_target = pow_target(leading_zeroes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(ChainConfig::from_lookup(|_| None), ChainConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let vars = HashMap::from([
            ("POW_LEADING_ZEROES", "4"),
            ("COINBASE_REWARD", "10"),
            ("MAX_BLOCK_TRANSACTIONS", "4"),
        ]);
        let cfg = ChainConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.pow_target, pow_target(4));
        assert_eq!(cfg.coinbase_reward, 10);
        assert_eq!(cfg.max_block_transactions, 4);
    }

    #[test]
    fn ignores_garbage() {
        let vars = HashMap::from([
            ("POW_LEADING_ZEROES", "lots"),
            ("COINBASE_REWARD", "-1"),
            ("MAX_BLOCK_TRANSACTIONS", "0"),
        ]);
        let cfg = ChainConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg, ChainConfig::default());
    }
}
