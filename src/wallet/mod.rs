use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};

use crate::error::WalletError;

/// Generate a new secp256k1 keypair and return (priv_hex, address).
/// The address is the hex of the compressed public key.
pub fn generate_keypair_hex() -> (String, String) {
    let secp = Secp256k1::new();
    let (sk, pk) = secp.generate_keypair(&mut OsRng);
    (hex::encode(sk.secret_bytes()), hex::encode(pk.serialize()))
}

/// Normalize a hex pubkey into its address form (lowercase compressed hex).
pub fn pubkey_to_address_hex(pubkey_hex: &str) -> Result<String, WalletError> {
    let bytes = hex::decode(pubkey_hex).map_err(|_| WalletError::InvalidHex("pubkey"))?;
    let pk = PublicKey::from_slice(&bytes).map_err(|_| WalletError::InvalidPublicKey)?;
    Ok(hex::encode(pk.serialize()))
}

/// Address owned by a hex secret key.
pub fn address_of(sk_hex: &str) -> Result<String, WalletError> {
    let secp = Secp256k1::signing_only();
    let sk = parse_secret_key(sk_hex)?;
    Ok(hex::encode(PublicKey::from_secret_key(&secp, &sk).serialize()))
}

/// Sign a 32-byte message hash, returning a hex DER signature.
pub fn sign_hex(sk_hex: &str, msg32: [u8; 32]) -> Result<String, WalletError> {
    let secp = Secp256k1::signing_only();
    let sk = parse_secret_key(sk_hex)?;
    let msg = Message::from_digest_slice(&msg32).map_err(|_| WalletError::InvalidMessage)?;
    let sig = secp.sign_ecdsa(&msg, &sk);
    Ok(hex::encode(&sig.serialize_der()[..]))
}

/// Verify a hex DER signature against a hex compressed pubkey and message hash.
pub fn verify_signature_hex(
    pubkey_hex: &str,
    sig_hex: &str,
    msg32: [u8; 32],
) -> Result<bool, WalletError> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| WalletError::InvalidHex("signature"))?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| WalletError::InvalidSignature)?;

    let pk_bytes = hex::decode(pubkey_hex).map_err(|_| WalletError::InvalidHex("pubkey"))?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| WalletError::InvalidPublicKey)?;

    let msg = Message::from_digest_slice(&msg32).map_err(|_| WalletError::InvalidMessage)?;
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

fn parse_secret_key(sk_hex: &str) -> Result<SecretKey, WalletError> {
    let bytes = hex::decode(sk_hex).map_err(|_| WalletError::InvalidHex("secret key"))?;
    SecretKey::from_slice(&bytes).map_err(|_| WalletError::InvalidSecretKey)
}
