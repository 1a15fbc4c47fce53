use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::env;

use pow_ledger::wallet::generate_keypair_hex;
use pow_ledger::{Block, ChainConfig, Transaction, TxOutput};

const MAX_PROOF_ATTEMPTS: u64 = 50_000_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ChainConfig::from_env();
    env_logger::init();

    let blocks: u64 = env::var("DEMO_BLOCKS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3);

    let (alice_sk, alice) = generate_keypair_hex();
    let (_, bob) = generate_keypair_hex();
    let (_, miner) = generate_keypair_hex();

    println!("⛓️ Mining {blocks} blocks (coinbase={})", config.coinbase_reward);

    let mut tip = Block::genesis_with_config(BTreeMap::from([(alice.clone(), 500)]), &config);
    let mut nonce = 0;

    for _ in 0..blocks {
        let mut block = Block::with_config(Some(miner.clone()), Some(&tip), &config);

        let mut tx = Transaction::new(
            alice.clone(),
            nonce,
            vec![TxOutput {
                amount: 10,
                address: bob.clone(),
            }],
            1,
        );
        tx.sign(&alice_sk)?;
        if block.add_transaction(tx) {
            nonce += 1;
        }

        if !block.mine(MAX_PROOF_ATTEMPTS) {
            warn!("no proof found for block #{}", block.chain_length());
            break;
        }

        // Replay the block the way a receiving peer would.
        let mut received = Block::deserialize(&block.serialize(), &config)?;
        if !received.rerun(&tip) {
            warn!("block #{} rejected on rerun", received.chain_length());
            break;
        }
        for row in received.tx_tree().levels() {
            debug!("  {row}");
        }
        info!(
            "block #{} hash={} proof={:?} root={}",
            received.chain_length(),
            received.hash_val(),
            received.proof(),
            received.merkle_root()
        );
        tip = received;
    }

    println!(
        "height={} alice={} bob={} miner={}",
        tip.chain_length(),
        tip.balance_of(&alice),
        tip.balance_of(&bob),
        tip.balance_of(&miner)
    );
    Ok(())
}
