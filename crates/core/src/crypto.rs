//! Authenticated encryption for prompt content at rest.
//!
//! This module lives in `core` (zero internal deps) so it can be used by both
//! the prompt store service and any future worker or CLI tooling.
//!
//! Every encrypt call derives a fresh per-record key from the long-lived
//! master secret plus a random salt, so compromising one record's key does
//! not expose any other record. The wire format is a single base64 string:
//!
//! ```text
//! salt(16) || nonce(16) || tag(16) || ciphertext(variable)
//! ```
//!
//! The format is deliberately versionless; the algorithm (AES-256-GCM with an
//! Argon2id-derived key) is fixed by this engine and callers must treat the
//! string as opaque.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;

// ---------------------------------------------------------------------------
// Wire layout constants
// ---------------------------------------------------------------------------

/// Length of the random per-record KDF salt.
pub const SALT_LEN: usize = 16;

/// Length of the stored nonce field. AES-GCM consumes the first
/// [`GCM_NONCE_LEN`] bytes; the remainder is random padding kept so the
/// wire layout stays fixed-width.
pub const NONCE_LEN: usize = 16;

/// Length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Bytes of the stored nonce actually fed to AES-GCM (96-bit nonce).
const GCM_NONCE_LEN: usize = 12;

/// Derived key length (AES-256).
const KEY_LEN: usize = 32;

/// Minimum acceptable master secret length in characters.
pub const MIN_MASTER_SECRET_LEN: usize = 32;

/// Smallest possible decoded payload: all three fixed headers, empty body.
const MIN_PAYLOAD_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The master secret is missing or shorter than [`MIN_MASTER_SECRET_LEN`].
    /// Fatal at startup, never retried.
    #[error("Master secret must be at least {MIN_MASTER_SECRET_LEN} characters")]
    WeakMasterSecret,

    /// Key derivation failed (Argon2 parameter or output error).
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    EncryptFailed(String),

    /// Decryption failed: malformed input, truncated payload, or GCM tag
    /// mismatch. Deliberately carries no detail that would distinguish
    /// tampering from corruption.
    #[error("Decryption failed: ciphertext is malformed or has been tampered with")]
    DecryptFailed,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless AEAD engine for prompt content.
///
/// Holds only the master secret; safe to share across tasks via `Arc`.
/// Construct once at startup via [`CipherEngine::new`], which fails fast on a
/// weak secret.
pub struct CipherEngine {
    master_secret: Vec<u8>,
}

impl CipherEngine {
    /// Create an engine from the out-of-band master secret.
    ///
    /// Returns [`CryptoError::WeakMasterSecret`] if the secret is shorter
    /// than [`MIN_MASTER_SECRET_LEN`] characters.
    pub fn new(master_secret: &str) -> Result<Self, CryptoError> {
        if master_secret.chars().count() < MIN_MASTER_SECRET_LEN {
            return Err(CryptoError::WeakMasterSecret);
        }
        Ok(Self {
            master_secret: master_secret.as_bytes().to_vec(),
        })
    }

    /// Encrypt a plaintext, producing the opaque base64 wire string.
    ///
    /// A fresh salt and nonce are generated per call, so encrypting the same
    /// plaintext twice yields different ciphertexts.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        let mut rng = rand::rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        // The aead API returns ciphertext || tag; the wire format wants the
        // tag between the headers and the body.
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce[..GCM_NONCE_LEN]),
                Payload::from(plaintext.as_bytes()),
            )
            .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;
        let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut out = Vec::with_capacity(MIN_PAYLOAD_LEN + body.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(tag);
        out.extend_from_slice(body);
        Ok(BASE64.encode(out))
    }

    /// Decrypt a wire string produced by [`encrypt`](Self::encrypt).
    ///
    /// Any malformed input, truncated payload, non-UTF-8 plaintext or tag
    /// mismatch yields [`CryptoError::DecryptFailed`]; partial plaintext is
    /// never returned.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let payload = BASE64
            .decode(encoded)
            .map_err(|_| CryptoError::DecryptFailed)?;
        if payload.len() < MIN_PAYLOAD_LEN {
            return Err(CryptoError::DecryptFailed);
        }

        let (salt, rest) = payload.split_at(SALT_LEN);
        let (nonce, rest) = rest.split_at(NONCE_LEN);
        let (tag, body) = rest.split_at(TAG_LEN);

        let key = self.derive_key(salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

        let mut sealed = Vec::with_capacity(body.len() + TAG_LEN);
        sealed.extend_from_slice(body);
        sealed.extend_from_slice(tag);

        let plain = cipher
            .decrypt(
                Nonce::from_slice(&nonce[..GCM_NONCE_LEN]),
                Payload::from(sealed.as_slice()),
            )
            .map_err(|_| CryptoError::DecryptFailed)?;

        String::from_utf8(plain).map_err(|_| CryptoError::DecryptFailed)
    }

    /// Derive the 32-byte AES key for one record via Argon2id.
    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
        let mut key = [0u8; KEY_LEN];
        argon2::Argon2::default()
            .hash_password_into(&self.master_secret, salt, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(key)
    }
}
