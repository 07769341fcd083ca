//! Stock payload encryption with AES-256-GCM
//!
//! Delivered goods (keys, codes, download grants) are stored encrypted
//! at rest and only decrypted at redemption time.
//!
//! Format: base64(nonce_12bytes || ciphertext || tag_16bytes)

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Content encryption key (32 bytes for AES-256-GCM)
#[derive(Clone)]
pub struct ContentKey {
    key: [u8; KEY_LEN],
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl ContentKey {
    /// Parse a hex-encoded 32-byte key (64 hex chars)
    pub fn from_hex(hex_key: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let mut bytes = hex::decode(hex_key.trim())?;
        if bytes.len() != KEY_LEN {
            bytes.zeroize();
            return Err(format!(
                "Content key wrong length: {} (expected {KEY_LEN} bytes)",
                bytes.len()
            )
            .into());
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self { key })
    }

    /// Generate a random key. Used by tests and key provisioning.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut key);
        Self { key }
    }

    /// Encrypt plaintext → base64(nonce || ciphertext || tag)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, &'static str> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| "Invalid key")?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| "Encryption failed")?;

        // nonce || ciphertext (includes tag)
        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&result))
    }

    /// Decrypt base64(nonce || ciphertext || tag) → plaintext
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<Vec<u8>, &'static str> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(encrypted_b64)
            .map_err(|_| "Invalid base64")?;

        if data.len() < NONCE_LEN + 16 {
            return Err("Ciphertext too short");
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| "Invalid key")?;
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
        let ciphertext = &data[NONCE_LEN..];

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| "Decryption failed (wrong key or tampered data)")
    }

    /// Encrypt a string → base64 blob
    pub fn encrypt_string(&self, plaintext: &str) -> Result<String, &'static str> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt base64 blob → string
    pub fn decrypt_string(&self, encrypted_b64: &str) -> Result<String, &'static str> {
        let bytes = self.decrypt(encrypted_b64)?;
        String::from_utf8(bytes).map_err(|_| "Decrypted data is not valid UTF-8")
    }
}
