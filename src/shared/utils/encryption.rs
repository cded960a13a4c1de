/// AES-256-GCM encryption for template API keys at rest.
///
/// Ciphertext format: base64(nonce (12 bytes) || ciphertext).
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid encrypted data format")]
    InvalidFormat,
}

pub type EncryptionResult<T> = Result<T, EncryptionError>;

#[derive(Clone)]
pub struct KeyCipher {
    key: [u8; 32],
}

impl KeyCipher {
    /// Accepts a 32-byte key as hex or base64; any other string is stretched
    /// with SHA-256.
    pub fn from_secret(secret: &str) -> Self {
        if let Ok(bytes) = hex::decode(secret) {
            if let Ok(key) = <[u8; 32]>::try_from(bytes.as_slice()) {
                return Self { key };
            }
        }

        if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(secret) {
            if let Ok(key) = <[u8; 32]>::try_from(bytes.as_slice()) {
                return Self { key };
            }
        }

        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> EncryptionResult<String> {
        if plaintext.is_empty() {
            return Err(EncryptionError::EncryptionFailed(
                "Cannot encrypt empty value".to_string(),
            ));
        }

        let cipher = Aes256Gcm::new(&self.key.into());

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> EncryptionResult<String> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|_| EncryptionError::InvalidFormat)?;

        if combined.len() < 12 {
            return Err(EncryptionError::InvalidFormat);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let cipher = Aes256Gcm::new(&self.key.into());

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| EncryptionError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| EncryptionError::DecryptionFailed("Invalid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = KeyCipher::from_secret(HEX_KEY);
        let encrypted = cipher.encrypt("abcdefghijklmnopqrstuvwxyz012345").unwrap();
        assert_eq!(
            cipher.decrypt(&encrypted).unwrap(),
            "abcdefghijklmnopqrstuvwxyz012345"
        );
    }

    #[test]
    fn test_nonce_makes_ciphertexts_differ() {
        let cipher = KeyCipher::from_secret(HEX_KEY);
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), cipher.decrypt(&b).unwrap());
    }

    #[test]
    fn test_empty_plaintext_rejected() {
        assert!(KeyCipher::from_secret(HEX_KEY).encrypt("").is_err());
    }

    #[test]
    fn test_invalid_ciphertext() {
        let cipher = KeyCipher::from_secret(HEX_KEY);
        assert!(matches!(
            cipher.decrypt("not-valid-base64!!!"),
            Err(EncryptionError::InvalidFormat)
        ));
        // "abc" decodes but is shorter than a nonce
        assert!(matches!(
            cipher.decrypt("YWJj"),
            Err(EncryptionError::InvalidFormat)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = KeyCipher::from_secret("first passphrase").encrypt("secret").unwrap();
        assert!(KeyCipher::from_secret("second passphrase")
            .decrypt(&encrypted)
            .is_err());
    }

    #[test]
    fn test_passphrase_and_hex_keys_both_work() {
        for secret in [HEX_KEY, "a plain passphrase"] {
            let cipher = KeyCipher::from_secret(secret);
            let encrypted = cipher.encrypt("value").unwrap();
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), "value");
        }
    }
}
