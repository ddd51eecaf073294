//! AES-256-GCM envelope encryption primitives
//!
//! - Format: `[nonce: 12 bytes][ciphertext][tag: 16 bytes]`
//! - Every key is 32 bytes and arrives as a SHA-256 hash; other lengths are refused
//! - Nonces come from the OS RNG, one per seal
//!
//! Passwords are never stored. A password's SHA-256 hash is used as the AEAD key
//! that wraps a per-user validation blob or a per-membership store key, so a
//! correct password is recognized by a successful open.

use crate::error::{Result, VaultError};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::{Rng, RngCore};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Symmetric key (32 bytes for AES-256)
pub type Key = [u8; 32];

/// Required key length
pub const KEY_SIZE: usize = 32;

/// Nonce size for AES-GCM (96 bits / 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// Overhead added by sealing (nonce + tag)
pub const SEAL_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

pub const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_SIZE {
        return Err(VaultError::Crypto(format!(
            "key must be {} bytes, got {}",
            KEY_SIZE,
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| VaultError::Crypto(e.to_string()))
}

/// Seal `plaintext` under `key`
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::Crypto(format!("seal failed: {}", e)))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Open a blob produced by [`seal`], verifying its tag
pub fn open(key: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    if blob.len() < SEAL_OVERHEAD {
        return Err(VaultError::Crypto("sealed data too short".to_string()));
    }

    let nonce = Nonce::from_slice(&blob[..NONCE_SIZE]);
    cipher
        .decrypt(nonce, &blob[NONCE_SIZE..])
        .map_err(|_| VaultError::Crypto("authentication failed".to_string()))
}

/// Open a key wrapped by [`seal`] and check it has key length
pub fn open_key(wrapping: &[u8], wrapped: &[u8]) -> Result<Key> {
    let raw = open(wrapping, wrapped)?;
    raw.as_slice()
        .try_into()
        .map_err(|_| VaultError::Crypto(format!("unwrapped key has {} bytes", raw.len())))
}

/// SHA-256 digest
pub fn sha256(data: &[u8]) -> Key {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Key derived from a password
pub fn password_hash(password: &str) -> Key {
    sha256(password.as_bytes())
}

/// Lowercase hex SHA-1 digest, used for invitation uids
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Fresh random data key
pub fn random_key() -> Key {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    key
}

/// Random string of `n` characters drawn from `alphabet`
///
/// Draws 63-bit blocks and consumes them in index-sized chunks, rejecting
/// chunks that fall outside the alphabet. Not used for key material.
pub fn random_string(alphabet: &[u8], n: usize) -> String {
    if alphabet.is_empty() || n == 0 {
        return String::new();
    }
    let idx_bits = usize::BITS - (alphabet.len() - 1).leading_zeros();
    let idx_bits = idx_bits.max(1);
    let idx_mask: u64 = (1u64 << idx_bits) - 1;
    let idx_per_block = 63 / idx_bits;

    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(n);
    let mut cache: u64 = rng.gen::<u64>() >> 1;
    let mut remain = idx_per_block;
    while out.len() < n {
        if remain == 0 {
            cache = rng.gen::<u64>() >> 1;
            remain = idx_per_block;
        }
        let idx = (cache & idx_mask) as usize;
        if idx < alphabet.len() {
            out.push(alphabet[idx] as char);
        }
        cache >>= idx_bits;
        remain -= 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let key = sha256(b"secret");
        let blob = seal(&key, b"hello").unwrap();
        assert_eq!(blob.len(), 5 + SEAL_OVERHEAD);
        assert_eq!(open(&key, &blob).unwrap(), b"hello");
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = seal(&sha256(b"one"), b"message").unwrap();
        assert!(open(&sha256(b"two"), &blob).is_err());
    }

    #[test]
    fn test_tamper_detection() {
        let key = sha256(b"secret");
        let blob = seal(&key, b"hello").unwrap();
        for i in 0..blob.len() {
            let mut corrupted = blob.clone();
            corrupted[i] ^= 0x01;
            assert!(open(&key, &corrupted).is_err(), "byte {} not covered", i);
        }
    }

    #[test]
    fn test_key_length_enforced() {
        assert!(seal(&[0u8; 16], b"x").is_err());
        assert!(open(&[0u8; 31], &[0u8; 64]).is_err());
    }

    #[test]
    fn test_short_blob() {
        assert!(open(&random_key(), &[0u8; SEAL_OVERHEAD - 1]).is_err());
    }

    #[test]
    fn test_nonce_uniqueness() {
        let key = random_key();
        let a = seal(&key, b"same").unwrap();
        let b = seal(&key, b"same").unwrap();
        assert_ne!(&a[..NONCE_SIZE], &b[..NONCE_SIZE]);
    }

    #[test]
    fn test_open_key() {
        let wrapping = password_hash("pw");
        let data_key = random_key();
        let wrapped = seal(&wrapping, &data_key).unwrap();
        assert_eq!(open_key(&wrapping, &wrapped).unwrap(), data_key);

        let not_a_key = seal(&wrapping, b"short").unwrap();
        assert!(open_key(&wrapping, &not_a_key).is_err());
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha1_hex() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_random_string() {
        let s = random_string(ALPHANUMERIC, 40);
        assert_eq!(s.len(), 40);
        assert!(s.bytes().all(|b| ALPHANUMERIC.contains(&b)));
        assert_ne!(s, random_string(ALPHANUMERIC, 40));
        assert_eq!(random_string(b"x", 3), "xxx");
        assert_eq!(random_string(ALPHANUMERIC, 0), "");
    }
}
