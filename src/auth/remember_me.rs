// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted "remember me" identity tokens.
//!
//! A token is `base64(nonce (12 bytes) || ciphertext || tag)` where the
//! plaintext is the JSON form of [`RememberedIdentity`]. There is no
//! server-side record: a token is valid exactly when it decrypts under the
//! configured key. The key length picks the AES-GCM variant (16/24/32 bytes
//! → AES-128/192/256).
//!
//! A principal recovered this way is *remembered*, a weaker tier than
//! *authenticated*.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::CryptoError;
use crate::models::RememberedIdentity;

type Aes192Gcm = AesGcm<Aes192, U12>;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

enum Cipher {
    Aes128(Box<Aes128Gcm>),
    Aes192(Box<Aes192Gcm>),
    Aes256(Box<Aes256Gcm>),
}

/// Symmetric codec for remember-me tokens.
pub struct RememberMeCodec {
    cipher: Cipher,
}

impl RememberMeCodec {
    /// Build a codec from a raw key.
    ///
    /// # Errors
    /// `InvalidKeyLength` unless the key is 16, 24 or 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let invalid = |_| CryptoError::InvalidKeyLength(key.len());
        let cipher = match key.len() {
            16 => Cipher::Aes128(Box::new(Aes128Gcm::new_from_slice(key).map_err(invalid)?)),
            24 => Cipher::Aes192(Box::new(Aes192Gcm::new_from_slice(key).map_err(invalid)?)),
            32 => Cipher::Aes256(Box::new(Aes256Gcm::new_from_slice(key).map_err(invalid)?)),
            other => return Err(CryptoError::InvalidKeyLength(other)),
        };
        Ok(Self { cipher })
    }

    /// Build a codec from a base64 key as it appears in configuration.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let key = Base64::decode_vec(encoded.trim()).map_err(|_| CryptoError::InvalidKeyLength(0))?;
        Self::new(&key)
    }

    /// Build a codec around a freshly generated 128-bit key.
    pub fn ephemeral() -> Self {
        Self {
            cipher: Cipher::Aes128(Box::new(Aes128Gcm::new(&Aes128Gcm::generate_key(&mut OsRng)))),
        }
    }

    /// Key size in bits.
    pub fn key_bits(&self) -> usize {
        match self.cipher {
            Cipher::Aes128(_) => 128,
            Cipher::Aes192(_) => 192,
            Cipher::Aes256(_) => 256,
        }
    }

    /// Serialize and encrypt `(principal, issued_at)` into a cookie-safe token.
    pub fn encode(&self, principal: &str, issued_at: DateTime<Utc>) -> Result<String, CryptoError> {
        let identity = RememberedIdentity {
            principal: principal.to_string(),
            issued_at: issued_at.timestamp_millis(),
        };
        let plaintext = serde_json::to_vec(&identity).map_err(|_| CryptoError::EncryptionFailed)?;

        let (nonce, ciphertext) = match &self.cipher {
            Cipher::Aes128(c) => seal(&**c, &plaintext)?,
            Cipher::Aes192(c) => seal(&**c, &plaintext)?,
            Cipher::Aes256(c) => seal(&**c, &plaintext)?,
        };

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);
        Ok(Base64::encode_string(&raw))
    }

    /// Decrypt a token.
    ///
    /// # Errors
    /// `DecryptionFailed` for any malformed, truncated, tampered or foreign token.
    pub fn decode(&self, token: &str) -> Result<RememberedIdentity, CryptoError> {
        let raw = Base64::decode_vec(token.trim()).map_err(|_| CryptoError::DecryptionFailed)?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::DecryptionFailed);
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);

        let plaintext = match &self.cipher {
            Cipher::Aes128(c) => c.decrypt(nonce, ciphertext),
            Cipher::Aes192(c) => c.decrypt(nonce, ciphertext),
            Cipher::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
        .map_err(|_| CryptoError::DecryptionFailed)?;

        serde_json::from_slice(&plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Boundary form of [`decode`](Self::decode): failures mean "not remembered".
    pub fn recall(&self, token: &str) -> Option<RememberedIdentity> {
        match self.decode(token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!(error = %e, "Ignoring unusable remember-me token");
                None
            }
        }
    }
}

fn seal<C>(cipher: &C, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CryptoError>
where
    C: Aead + AeadCore<NonceSize = U12>,
{
    let nonce = C::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    Ok((nonce.to_vec(), ciphertext))
}
