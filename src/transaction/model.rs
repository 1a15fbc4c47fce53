use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::blockchain::Block;
use crate::error::WalletError;
use crate::merkle::MerkleLeaf;
use crate::wallet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub address: String,
}

/// Account-model transfer from `from` to one or more outputs.
/// `from` is the hex compressed public key of the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: String,
    pub nonce: u64,
    pub outputs: Vec<TxOutput>,
    pub fee: u64,
    /// Hex-encoded DER ECDSA signature over `sighash()`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

impl Transaction {
    pub fn new(from: impl Into<String>, nonce: u64, outputs: Vec<TxOutput>, fee: u64) -> Self {
        Self {
            from: from.into(),
            nonce,
            outputs,
            fee,
            sig: None,
        }
    }

    /// Canonical signing payload (JSON, keys sorted) that excludes the signature.
    pub fn signing_payload(&self) -> Vec<u8> {
        let payload = serde_json::json!({
            "from": self.from,
            "nonce": self.nonce,
            "outputs": self.outputs,
            "fee": self.fee,
        });
        serde_json::to_vec(&payload).expect("serialize signing payload")
    }

    /// SHA-256 of the signing payload.
    pub fn sighash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_payload());
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        out
    }

    /// Content identity. Re-signing does not change it.
    pub fn id(&self) -> String {
        hex::encode(self.sighash())
    }

    pub fn sign(&mut self, sk_hex: &str) -> Result<(), WalletError> {
        self.sig = Some(wallet::sign_hex(sk_hex, self.sighash())?);
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        self.sig.is_some()
    }

    pub fn valid_signature(&self) -> bool {
        match &self.sig {
            None => false,
            Some(sig) => wallet::verify_signature_hex(&self.from, sig, self.sighash())
                .unwrap_or(false),
        }
    }

    /// Everything the sender pays: all output amounts plus the fee.
    pub fn total_output(&self) -> u128 {
        self.outputs
            .iter()
            .map(|o| o.amount as u128)
            .sum::<u128>()
            + self.fee as u128
    }

    /// Whether the sender's balance as tracked by `block` covers `total_output`.
    pub fn sufficient_funds(&self, block: &Block) -> bool {
        self.total_output() <= block.balance_of(&self.from) as u128
    }
}

impl MerkleLeaf for Transaction {
    fn leaf_id(&self) -> String {
        self.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn transfer(from: &str, nonce: u64) -> Transaction {
        Transaction::new(
            from,
            nonce,
            vec![
                TxOutput {
                    amount: 10,
                    address: "bob".into(),
                },
                TxOutput {
                    amount: 5,
                    address: "carol".into(),
                },
            ],
            2,
        )
    }

    #[test]
    fn id_ignores_signature() {
        let (sk, addr) = wallet::generate_keypair_hex();
        let mut tx = transfer(&addr, 0);
        let before = tx.id();
        tx.sign(&sk).unwrap();
        assert_eq!(tx.id(), before);
        assert_eq!(tx.leaf_id(), before);
        assert_ne!(transfer(&addr, 1).id(), before);
    }

    #[test]
    fn signature_checks() {
        let (sk, addr) = wallet::generate_keypair_hex();
        let mut tx = transfer(&addr, 0);
        assert!(!tx.is_signed());
        assert!(!tx.valid_signature());

        tx.sign(&sk).unwrap();
        assert!(tx.valid_signature());

        let mut tampered = tx.clone();
        tampered.outputs[0].amount = 1_000;
        assert!(!tampered.valid_signature());

        let (other_sk, _) = wallet::generate_keypair_hex();
        let mut wrong_key = transfer(&addr, 0);
        wrong_key.sign(&other_sk).unwrap();
        assert!(!wrong_key.valid_signature());
    }

    #[test]
    fn total_output_includes_fee() {
        assert_eq!(transfer("a", 0).total_output(), 17);
    }

    #[test]
    fn funds_checked_against_block_balances() {
        let genesis = Block::genesis(BTreeMap::from([("a".to_string(), 17u64)]));
        assert!(transfer("a", 0).sufficient_funds(&genesis));

        let poorer = Block::genesis(BTreeMap::from([("a".to_string(), 16u64)]));
        assert!(!transfer("a", 0).sufficient_funds(&poorer));
        assert!(!transfer("nobody", 0).sufficient_funds(&genesis));
    }
}
