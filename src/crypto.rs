//! # Vault Cryptography
//!
//! Password-based authenticated encryption for the secrets embedded in kitt
//! images, plus the base64 helpers used to armor binary file content.
//!
//! ## Token Format
//!
//! A sealed token is a single base64 string, so it fits in an image label:
//!
//! ```text
//! base64( version[1] || salt[16] || nonce[24] || ciphertext+tag )
//! ```
//!
//! - **KDF**: Argon2id (19 MiB, 2 passes) over the password and the token's
//!   random salt.
//! - **Cipher**: XChaCha20-Poly1305 with a random nonce. The Poly1305 tag
//!   detects a wrong password as well as any tampering.
//!
//! ## Failure Model
//!
//! Nothing here returns an error. Every operation yields `None` on failure so
//! callers treat "wrong password", "corrupted token" and "wrong shape" the
//! same way: there is no vault.
//!
//! ## Example
//!
//! ```rust
//! use kitt::crypto::{cipher_structured, uncipher_structured};
//! use std::collections::BTreeMap;
//!
//! let secrets = BTreeMap::from([("TOKEN".to_string(), "s3cr3t".to_string())]);
//! let token = cipher_structured("hunter2", &secrets).unwrap();
//!
//! let opened: Option<BTreeMap<String, String>> = uncipher_structured("hunter2", &token);
//! assert_eq!(opened, Some(secrets));
//! assert!(uncipher_structured::<BTreeMap<String, String>>("wrong", &token).is_none());
//! ```

use crate::constants::{
    VAULT_KDF_ITERATIONS, VAULT_KDF_MEMORY_KIB, VAULT_KDF_PARALLELISM, VAULT_KEY_SIZE,
    VAULT_NONCE_SIZE, VAULT_SALT_SIZE, VAULT_TOKEN_VERSION,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use zeroize::Zeroizing;

const HEADER_SIZE: usize = 1 + VAULT_SALT_SIZE + VAULT_NONCE_SIZE;

/// Symmetric key derived from a password and a salt.
///
/// Key bytes are zeroed on drop. The salt travels with every token the key
/// produces so the key can be re-derived from the password alone.
#[derive(Clone)]
pub struct VaultKey {
    key: Zeroizing<[u8; VAULT_KEY_SIZE]>,
    salt: [u8; VAULT_SALT_SIZE],
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKey").finish_non_exhaustive()
    }
}

impl VaultKey {
    /// Returns the salt this key was derived with.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

/// Derives a vault key from `password` and `salt` with Argon2id.
///
/// Deterministic for a given password and salt. Returns `None` when the salt
/// is not exactly [`VAULT_SALT_SIZE`] bytes or the KDF rejects its input.
pub fn derive_key(password: &str, salt: &[u8]) -> Option<VaultKey> {
    let salt: [u8; VAULT_SALT_SIZE] = salt.try_into().ok()?;

    let params = Params::new(
        VAULT_KDF_MEMORY_KIB,
        VAULT_KDF_ITERATIONS,
        VAULT_KDF_PARALLELISM,
        Some(VAULT_KEY_SIZE),
    )
    .map_err(|e| debug!("Invalid Argon2 params: {}", e))
    .ok()?;

    let mut key = Zeroizing::new([0u8; VAULT_KEY_SIZE]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password.as_bytes(), &salt, key.as_mut())
        .map_err(|e| debug!("Key derivation failed: {}", e))
        .ok()?;

    Some(VaultKey { key, salt })
}

/// Generates a fresh random salt.
pub fn random_salt() -> [u8; VAULT_SALT_SIZE] {
    let mut salt = [0u8; VAULT_SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Encrypts `plaintext` into a self-contained base64 token.
pub fn encrypt(key: &VaultKey, plaintext: &str) -> Option<String> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.key.as_ref()).ok()?;

    let mut nonce = [0u8; VAULT_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| debug!("Encryption failed: {}", e))
        .ok()?;

    let mut raw = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    raw.push(VAULT_TOKEN_VERSION);
    raw.extend_from_slice(&key.salt);
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);

    Some(b64encode(&raw))
}

/// Decrypts a token produced by [`encrypt`] with the same key.
///
/// Returns `None` on bad base64, unknown version, a salt that does not
/// belong to `key`, a failed authentication tag or non-UTF-8 plaintext.
pub fn decrypt(key: &VaultKey, token: &str) -> Option<String> {
    let raw = b64decode(token)?;
    let (salt, nonce, ciphertext) = split_token(&raw)?;

    if salt != key.salt {
        debug!("Token salt does not match key");
        return None;
    }

    let cipher = XChaCha20Poly1305::new_from_slice(key.key.as_ref()).ok()?;
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| debug!("Token authentication failed"))
        .ok()?;

    String::from_utf8(plaintext).ok()
}

/// Seals `plaintext` with a key derived from `password` and a fresh salt.
pub fn seal_text(password: &str, plaintext: &str) -> Option<String> {
    let key = derive_key(password, &random_salt())?;
    encrypt(&key, plaintext)
}

/// Opens a token produced by [`seal_text`], re-deriving the key from the
/// salt embedded in the token.
pub fn open_text(password: &str, token: &str) -> Option<String> {
    let raw = b64decode(token)?;
    let (salt, _, _) = split_token(&raw)?;
    let key = derive_key(password, salt)?;
    decrypt(&key, token)
}

/// Serializes `value` to JSON and seals it.
///
/// Only objects and arrays are accepted at the top level; scalars yield
/// `None`.
pub fn cipher_structured<T: Serialize + ?Sized>(password: &str, value: &T) -> Option<String> {
    let value = serde_json::to_value(value).ok()?;
    if !(value.is_object() || value.is_array()) {
        debug!("Refusing to seal a top-level scalar");
        return None;
    }
    seal_text(password, &value.to_string())
}

/// Opens a token produced by [`cipher_structured`] and parses it back.
///
/// Returns `None` if the token does not open, the plaintext is not a JSON
/// object or array, or it does not match `T`.
pub fn uncipher_structured<T: DeserializeOwned>(password: &str, token: &str) -> Option<T> {
    let plaintext = Zeroizing::new(open_text(password, token)?);
    let value: serde_json::Value = serde_json::from_str(&plaintext).ok()?;
    if !(value.is_object() || value.is_array()) {
        return None;
    }
    serde_json::from_value(value)
        .map_err(|e| debug!("Vault payload has unexpected shape: {}", e))
        .ok()
}

/// Standard base64 encoding.
pub fn b64encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Standard base64 decoding; `None` on invalid input.
pub fn b64decode(data: &str) -> Option<Vec<u8>> {
    STANDARD.decode(data.trim()).ok()
}

fn split_token(raw: &[u8]) -> Option<(&[u8], &[u8], &[u8])> {
    if raw.len() <= HEADER_SIZE || raw[0] != VAULT_TOKEN_VERSION {
        debug!("Token too short or unknown version");
        return None;
    }
    let (salt, rest) = raw[1..].split_at(VAULT_SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(VAULT_NONCE_SIZE);
    Some((salt, nonce, ciphertext))
}
