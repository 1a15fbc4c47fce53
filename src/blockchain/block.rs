use chrono::Utc;
use log::{debug, info, warn};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::DIFFICULTY_STEP_BLOCKS;
use crate::config::ChainConfig;
use crate::error::{BlockError, TxRejection};
use crate::hashing::{sha256_digest, sha256_hex};
use crate::merkle::{FixedMerkleTree, MerkleProof, index};
use crate::transaction::Transaction;

/// A block of transactions chained to its predecessor by hash.
///
/// `balances` and `next_nonce` are derived ledger state: they are cloned from
/// the predecessor at construction, mutated by admitted transactions, and
/// left out of the canonical encoding (except for the genesis block, whose
/// balances are the initial allocation). `rerun` rebuilds them.
#[derive(Debug, Clone)]
pub struct Block {
    prev_block_hash: Option<String>,
    chain_length: u64,
    timestamp: i64, // Unix millis (UTC)
    target: BigUint,
    reward_addr: Option<String>,
    coinbase_reward: u64,
    proof: Option<u64>,
    balances: BTreeMap<String, u64>,
    next_nonce: BTreeMap<String, u64>,
    tx_tree: FixedMerkleTree<Transaction>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenesisEncoding<'a> {
    chain_length: u64,
    timestamp: i64,
    balances: Vec<(&'a str, u64)>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockEncoding<'a> {
    chain_length: u64,
    timestamp: i64,
    tx_merkle_tree: &'a FixedMerkleTree<Transaction>,
    prev_block_hash: Option<&'a str>,
    proof: Option<u64>,
    reward_addr: Option<&'a str>,
}

/// Either shape of the canonical encoding, as read back from the wire.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodedBlock {
    chain_length: u64,
    timestamp: i64,
    balances: Option<Vec<(String, u64)>>,
    tx_merkle_tree: Option<FixedMerkleTree<Transaction>>,
    prev_block_hash: Option<String>,
    proof: Option<u64>,
    reward_addr: Option<String>,
}

impl Block {
    /// Create a block on top of `prev` (or a genesis block if `None`) with the
    /// default target, coinbase reward and capacity.
    pub fn new(reward_addr: Option<String>, prev: Option<&Block>) -> Self {
        Self::with_config(reward_addr, prev, &ChainConfig::default())
    }

    pub fn with_config(
        reward_addr: Option<String>,
        prev: Option<&Block>,
        config: &ChainConfig,
    ) -> Self {
        let chain_length = prev.map_or(0, |b| b.chain_length + 1);
        if chain_length != 0 && chain_length % DIFFICULTY_STEP_BLOCKS == 0 {
            info!("difficulty increasing at chain length {chain_length}");
        }

        let mut block = Self {
            prev_block_hash: prev.map(Block::hash_val),
            chain_length,
            timestamp: Utc::now().timestamp_millis(),
            target: Self::target_for(&config.pow_target, chain_length),
            reward_addr,
            coinbase_reward: config.coinbase_reward,
            proof: None,
            balances: BTreeMap::new(),
            next_nonce: BTreeMap::new(),
            tx_tree: FixedMerkleTree::new(config.max_block_transactions),
        };
        if let Some(prev) = prev {
            block.inherit_ledger(prev);
        }
        block
    }

    /// Genesis block carrying the initial allocation. It has no reward
    /// address, so nothing is credited when the first child is built on it.
    pub fn genesis(balances: BTreeMap<String, u64>) -> Self {
        Self::genesis_with_config(balances, &ChainConfig::default())
    }

    pub fn genesis_with_config(balances: BTreeMap<String, u64>, config: &ChainConfig) -> Self {
        let mut block = Self::with_config(None, None, config);
        block.balances = balances;
        block
    }

    /// `base` halved once for every full `DIFFICULTY_STEP_BLOCKS` of chain length.
    pub fn target_for(base: &BigUint, chain_length: u64) -> BigUint {
        base >> (chain_length / DIFFICULTY_STEP_BLOCKS) as usize
    }

    /// Reset ledger state to a copy of `prev`'s and pay `prev`'s miner.
    fn inherit_ledger(&mut self, prev: &Block) {
        self.balances = prev.balances.clone();
        self.next_nonce = prev.next_nonce.clone();

        if let Some(addr) = &prev.reward_addr {
            let reward = prev.total_rewards();
            let balance = self.balances.entry(addr.clone()).or_insert(0);
            *balance = balance.saturating_add(reward);
        }
    }

    pub fn is_genesis_block(&self) -> bool {
        self.chain_length == 0
    }

    /// True if the block hash, read as an unsigned integer, is below the target.
    pub fn has_valid_proof(&self) -> bool {
        BigUint::from_bytes_be(&sha256_digest(&self.serialize())) < self.target
    }

    /// Search proofs upward from the current one. Returns true once
    /// `has_valid_proof` holds, false if `max_attempts` run out first.
    pub fn mine(&mut self, max_attempts: u64) -> bool {
        let mut proof = self.proof.unwrap_or(0);
        for _ in 0..max_attempts {
            self.proof = Some(proof);
            if self.has_valid_proof() {
                debug!("found proof {} for block {}", proof, self.chain_length);
                return true;
            }
            proof = proof.wrapping_add(1);
        }
        false
    }

    /// Canonical JSON encoding. The genesis block carries its balances; every
    /// other block carries its transaction tree and proof details instead.
    pub fn serialize(&self) -> String {
        if self.is_genesis_block() {
            let enc = GenesisEncoding {
                chain_length: self.chain_length,
                timestamp: self.timestamp,
                balances: self
                    .balances
                    .iter()
                    .map(|(addr, amount)| (addr.as_str(), *amount))
                    .collect(),
            };
            serde_json::to_string(&enc).expect("serialize genesis block")
        } else {
            let enc = BlockEncoding {
                chain_length: self.chain_length,
                timestamp: self.timestamp,
                tx_merkle_tree: &self.tx_tree,
                prev_block_hash: self.prev_block_hash.as_deref(),
                proof: self.proof,
                reward_addr: self.reward_addr.as_deref(),
            };
            serde_json::to_string(&enc).expect("serialize block")
        }
    }

    /// Rebuild a block from its canonical encoding. Target and coinbase come
    /// from `config`. A non-genesis block has empty ledgers until `rerun`.
    pub fn deserialize(data: &str, config: &ChainConfig) -> Result<Self, BlockError> {
        let enc: EncodedBlock = serde_json::from_str(data)?;
        let target = Self::target_for(&config.pow_target, enc.chain_length);

        if enc.chain_length == 0 {
            let encoded = enc
                .balances
                .ok_or(BlockError::InvalidEncoding("genesis block without balances"))?;
            // Strictly ascending addresses: no repeats, and re-encoding gives the same bytes.
            if !encoded.windows(2).all(|w| w[0].0 < w[1].0) {
                return Err(BlockError::InvalidEncoding(
                    "genesis balances repeated or out of order",
                ));
            }
            let balances: BTreeMap<String, u64> = encoded.into_iter().collect();
            return Ok(Self {
                prev_block_hash: None,
                chain_length: 0,
                timestamp: enc.timestamp,
                target,
                reward_addr: None,
                coinbase_reward: config.coinbase_reward,
                proof: None,
                balances,
                next_nonce: BTreeMap::new(),
                tx_tree: FixedMerkleTree::new(config.max_block_transactions),
            });
        }

        let tx_tree = enc
            .tx_merkle_tree
            .ok_or(BlockError::InvalidEncoding("block without transaction tree"))?;
        // Received blocks get the same slot limit as locally built ones.
        if tx_tree.capacity() != index::leaf_count_for(config.max_block_transactions) {
            return Err(BlockError::InvalidEncoding("transaction tree capacity mismatch"));
        }
        Ok(Self {
            prev_block_hash: enc.prev_block_hash,
            chain_length: enc.chain_length,
            timestamp: enc.timestamp,
            target,
            reward_addr: enc.reward_addr,
            coinbase_reward: config.coinbase_reward,
            proof: enc.proof,
            balances: BTreeMap::new(),
            next_nonce: BTreeMap::new(),
            tx_tree,
        })
    }

    pub fn hash_val(&self) -> String {
        sha256_hex(&self.serialize())
    }

    pub fn id(&self) -> String {
        self.hash_val()
    }

    /// Admit `tx` and apply it to the ledger, or explain why not.
    /// Nothing is mutated when a check fails.
    pub fn try_add_transaction(&mut self, tx: Transaction) -> Result<(), TxRejection> {
        if self.tx_tree.has(&tx) {
            return Err(TxRejection::Duplicate(tx.id()));
        }
        if !tx.is_signed() {
            return Err(TxRejection::Unsigned(tx.id()));
        }
        if !tx.valid_signature() {
            return Err(TxRejection::InvalidSignature(tx.id()));
        }
        if !tx.sufficient_funds(self) {
            return Err(TxRejection::InsufficientFunds(tx.id()));
        }
        if self.tx_tree.is_full() {
            return Err(TxRejection::BlockFull);
        }

        // No reordering buffer: only the exact next nonce is accepted.
        let expected = self.next_nonce(&tx.from);
        match tx.nonce.cmp(&expected) {
            Ordering::Less => {
                return Err(TxRejection::Replayed {
                    id: tx.id(),
                    nonce: tx.nonce,
                    expected,
                });
            }
            Ordering::Greater => {
                return Err(TxRejection::OutOfOrder {
                    id: tx.id(),
                    nonce: tx.nonce,
                    expected,
                });
            }
            Ordering::Equal => {}
        }

        let staged = self.stage_transfer(&tx)?;
        self.next_nonce.insert(tx.from.clone(), expected + 1);
        self.balances.extend(staged);
        self.tx_tree.insert(tx);
        Ok(())
    }

    /// Balances of every account `tx` touches, after the debit and credits.
    fn stage_transfer(&self, tx: &Transaction) -> Result<BTreeMap<String, u64>, TxRejection> {
        let remaining = u128::from(self.balance_of(&tx.from))
            .checked_sub(tx.total_output())
            .ok_or_else(|| TxRejection::InsufficientFunds(tx.id()))?;

        let mut staged = BTreeMap::new();
        // remaining <= current balance, so it fits
        staged.insert(tx.from.clone(), remaining as u64);
        for out in &tx.outputs {
            let current = staged
                .get(&out.address)
                .copied()
                .unwrap_or_else(|| self.balance_of(&out.address));
            let credited = current
                .checked_add(out.amount)
                .ok_or_else(|| TxRejection::BalanceOverflow(out.address.clone()))?;
            staged.insert(out.address.clone(), credited);
        }
        Ok(staged)
    }

    /// Admit `tx`; true if accepted. Rejection reasons go to the debug log.
    pub fn add_transaction(&mut self, tx: Transaction) -> bool {
        match self.try_add_transaction(tx) {
            Ok(()) => true,
            Err(reason) => {
                debug!("block {}: {}", self.chain_length, reason);
                false
            }
        }
    }

    /// Rebuild balances and nonces from `prev` by replaying this block's
    /// transactions in their original order. Stops at the first transaction
    /// that no longer applies; the ledger is then partial and the whole block
    /// must be discarded.
    pub fn try_rerun(&mut self, prev: &Block) -> Result<(), BlockError> {
        self.inherit_ledger(prev);

        let capacity = self.tx_tree.capacity();
        let previous = std::mem::replace(&mut self.tx_tree, FixedMerkleTree::new(capacity));
        for tx in previous.transactions() {
            self.try_add_transaction(tx.clone())
                .map_err(|reason| BlockError::Rerun {
                    id: tx.id(),
                    reason,
                })?;
        }
        Ok(())
    }

    pub fn rerun(&mut self, prev: &Block) -> bool {
        match self.try_rerun(prev) {
            Ok(()) => true,
            Err(e) => {
                warn!("block {} invalid: {}", self.chain_length, e);
                false
            }
        }
    }

    pub fn balance_of(&self, addr: &str) -> u64 {
        self.balances.get(addr).copied().unwrap_or(0)
    }

    pub fn next_nonce(&self, addr: &str) -> u64 {
        self.next_nonce.get(addr).copied().unwrap_or(0)
    }

    /// Coinbase reward plus every contained transaction's fee.
    pub fn total_rewards(&self) -> u64 {
        self.tx_tree
            .transactions()
            .fold(self.coinbase_reward, |sum, tx| sum.saturating_add(tx.fee))
    }

    /// Only this block is checked, not its ancestors.
    pub fn contains(&self, tx: &Transaction) -> bool {
        self.tx_tree.has(tx)
    }

    /// Contained, and its inclusion proof checks out against our own root.
    pub fn is_valid(&self, tx: &Transaction) -> bool {
        if !self.contains(tx) {
            return false;
        }
        self.tx_tree
            .generate_proof(tx)
            .and_then(|proof| self.tx_tree.verify_proof(tx, &proof, self.tx_tree.root()))
            .unwrap_or(false)
    }

    pub fn inclusion_proof(&self, tx: &Transaction) -> Result<MerkleProof, BlockError> {
        Ok(self.tx_tree.generate_proof(tx)?)
    }

    pub fn merkle_root(&self) -> &str {
        self.tx_tree.root()
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.tx_tree.transactions()
    }

    pub fn tx_tree(&self) -> &FixedMerkleTree<Transaction> {
        &self.tx_tree
    }

    pub fn balances(&self) -> &BTreeMap<String, u64> {
        &self.balances
    }

    pub fn prev_block_hash(&self) -> Option<&str> {
        self.prev_block_hash.as_deref()
    }

    pub fn chain_length(&self) -> u64 {
        self.chain_length
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn target(&self) -> &BigUint {
        &self.target
    }

    pub fn reward_addr(&self) -> Option<&str> {
        self.reward_addr.as_deref()
    }

    pub fn coinbase_reward(&self) -> u64 {
        self.coinbase_reward
    }

    pub fn proof(&self) -> Option<u64> {
        self.proof
    }

    pub fn set_proof(&mut self, proof: u64) {
        self.proof = Some(proof);
    }
}
