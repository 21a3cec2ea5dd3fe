//! Cryptographic primitives for Blockverse

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{constants::SECRET_KEY_SIZE, ecdsa, All, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
/// This prevents repeated, unnecessary context creation.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Length of a compressed secp256k1 public key.
pub const PUBLIC_KEY_SIZE: usize = secp256k1::constants::PUBLIC_KEY_SIZE;
/// Length of a compact ECDSA signature.
pub const SIGNATURE_SIZE: usize = secp256k1::constants::COMPACT_SIGNATURE_SIZE;
pub const HASH_SIZE: usize = 32;

pub type Sha256Hash = [u8; HASH_SIZE];

/// Type alias for the derived address, which is a 32-byte hash of the public key.
pub type Address = [u8; 32];

pub type Signature = [u8; SIGNATURE_SIZE];

/// Records that commit to a deterministic byte encoding.
///
/// Two logically equal records must write identical bytes, since the digest
/// is used both as content identity and as the signing target.
pub trait CanonicalHash {
    fn write_canonical(&self, hasher: &mut Sha256);

    fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        self.write_canonical(&mut hasher);
        hasher.finalize().into()
    }

    fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}

/// Writes a length-prefixed byte field so adjacent variable fields cannot alias.
pub fn write_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u32).to_le_bytes());
    hasher.update(bytes);
}

/// SHA-256 of arbitrary bytes.
pub fn sha256(bytes: &[u8]) -> Sha256Hash {
    Sha256::digest(bytes).into()
}

/// Derives the address of a serialized public key.
pub fn address_from_public_key(public_key_bytes: &[u8]) -> Address {
    sha256(public_key_bytes)
}

/// Convert an address to a hex string for display.
pub fn address_to_hex(addr: &Address) -> String {
    hex::encode(addr)
}

/// Convert a hex string to an address.
pub fn address_from_hex(hex_str: &str) -> Result<Address, ChainError> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| ChainError::CryptoError(format!("Invalid hex address: {}", e)))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        ChainError::CryptoError(format!("Address must be 32 bytes, got {}", b.len()))
    })
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(ChainError::CryptoError(format!(
                "Secret key must be {} bytes, got {}",
                SECRET_KEY_SIZE,
                bytes.len()
            )));
        }
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| ChainError::CryptoError(format!("Invalid secret key bytes: {}", e)))?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_secret_hex(hex_str: &str) -> Result<Self, ChainError> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| ChainError::CryptoError(format!("Invalid hex secret key: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Returns the KeyPair's public key as a compressed byte array.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// Computes the address (SHA-256 hash of the compressed public key).
    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key_bytes())
    }

    /// Signs a 32-byte hash and returns the compact signature bytes.
    pub fn sign(&self, hash: &Sha256Hash) -> Signature {
        let message = Message::from_digest(*hash);
        SECP256K1_CONTEXT
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_compact()
    }
}

/// Verifies a compact signature over `hash`, explaining why it was rejected.
pub fn check_signature(
    public_key_bytes: &[u8],
    hash: &Sha256Hash,
    signature_bytes: &[u8],
) -> Result<(), ChainError> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }
    if signature_bytes.len() != SIGNATURE_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;
    let signature = ecdsa::Signature::from_compact(signature_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;
    let message = Message::from_digest(*hash);

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))
}

/// Verifies a compact signature over `hash`.
///
/// Malformed keys or signatures of the wrong length are reported as `false`.
pub fn verify_signature(public_key_bytes: &[u8], hash: &Sha256Hash, signature_bytes: &[u8]) -> bool {
    check_signature(public_key_bytes, hash, signature_bytes).is_ok()
}
