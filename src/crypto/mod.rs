//! Credential Encryption
//!
//! Authenticated encryption for persisted credential payloads. Each call
//! uses a fresh random salt and IV; the key is derived from the caller's
//! passphrase with Argon2id, so the same plaintext and passphrase never
//! produce the same blob twice.
//!
//! Blob layout: `salt(16) || iv(16) || tag(16) || ciphertext`, base64-encoded
//! so text-based storage backends can treat it as an uninterpreted string.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{aes::Aes256, AesGcm, Nonce};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};

use crate::error::{CryptoError, LifecycleError};

/// Size of the random key-derivation salt in bytes (128 bits).
const SALT_SIZE: usize = 16;

/// Size of the initialization vector in bytes (128 bits).
const IV_SIZE: usize = 16;

/// Size of the authentication tag in bytes (128 bits).
const TAG_SIZE: usize = 16;

/// Size of the derived encryption key in bytes (256 bits).
const KEY_SIZE: usize = 32;

/// AES-256-GCM with the 128-bit IV this blob format carries.
type BlobCipher = AesGcm<Aes256, U16>;

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<[u8; KEY_SIZE], LifecycleError> {
    let mut key = [0u8; KEY_SIZE];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| {
            LifecycleError::Crypto(CryptoError::KeyDerivationFailed {
                message: e.to_string(),
            })
        })?;
    Ok(key)
}

/// Encrypt `plaintext` under a key derived from `passphrase`.
///
/// Returns the base64-encoded `salt || iv || tag || ciphertext` blob.
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<String, LifecycleError> {
    let mut salt = [0u8; SALT_SIZE];
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(passphrase, &salt)?;
    let cipher = BlobCipher::new_from_slice(&key).map_err(|e| {
        LifecycleError::Crypto(CryptoError::EncryptionFailed {
            message: e.to_string(),
        })
    })?;

    // The aead crate appends the tag to the ciphertext; the blob layout
    // carries it between the IV and the ciphertext instead.
    let sealed = cipher
        .encrypt(
            Nonce::<U16>::from_slice(&iv),
            Payload::from(plaintext.as_bytes()),
        )
        .map_err(|e| {
            LifecycleError::Crypto(CryptoError::EncryptionFailed {
                message: e.to_string(),
            })
        })?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    let mut blob = Vec::with_capacity(SALT_SIZE + IV_SIZE + TAG_SIZE + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(tag);
    blob.extend_from_slice(ciphertext);

    Ok(BASE64.encode(blob))
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Fails with [`CryptoError::DecryptionFailed`] when the authentication tag
/// does not verify (wrong passphrase, corruption, tampering) or when the
/// blob is too short to carry `salt + iv + tag`.
pub fn decrypt(blob: &str, passphrase: &str) -> Result<String, LifecycleError> {
    let bytes = BASE64
        .decode(blob)
        .map_err(|_| LifecycleError::Crypto(CryptoError::DecryptionFailed))?;

    if bytes.len() < SALT_SIZE + IV_SIZE + TAG_SIZE {
        return Err(LifecycleError::Crypto(CryptoError::DecryptionFailed));
    }

    let (salt, rest) = bytes.split_at(SALT_SIZE);
    let (iv, rest) = rest.split_at(IV_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);

    let key = derive_key(passphrase, salt)?;
    let cipher = BlobCipher::new_from_slice(&key)
        .map_err(|_| LifecycleError::Crypto(CryptoError::DecryptionFailed))?;

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let plaintext = cipher
        .decrypt(Nonce::<U16>::from_slice(iv), Payload::from(sealed.as_ref()))
        .map_err(|_| LifecycleError::Crypto(CryptoError::DecryptionFailed))?;

    String::from_utf8(plaintext)
        .map_err(|_| LifecycleError::Crypto(CryptoError::DecryptionFailed))
}
