//! API key generation/hashing and credential encryption.
//!
//! API keys are generated with 256 bits of entropy and stored only as SHA-256
//! hashes; the plaintext key is shown to the caller exactly once at creation.
//! Platform session credentials for managed accounts are encrypted at rest
//! with AES-256-GCM under the configured credentials key.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};
use rand::{Rng, thread_rng};
use sha2::{Digest, Sha256};

/// Prefix for standard (quota-limited) API keys.
pub const KEY_PREFIX: &str = "ozk_";

/// Prefix for administrative API keys, exempt from the daily quota.
pub const ADMIN_KEY_PREFIX: &str = "oza_";

/// Number of leading characters of the plaintext key kept for display.
const DISPLAY_PREFIX_LEN: usize = 12;

/// Generates a cryptographically secure API key with 256 bits of entropy.
///
/// The key is formatted as `ozk_{base64url}` (or `oza_{base64url}` for
/// administrative keys) where the random part is 32 bytes of cryptographically
/// secure random data, base64url encoded without padding.
pub fn generate_api_key(admin: bool) -> String {
    let mut key_bytes = [0u8; 32];
    thread_rng().fill(&mut key_bytes);

    let prefix = if admin { ADMIN_KEY_PREFIX } else { KEY_PREFIX };
    format!("{prefix}{}", general_purpose::URL_SAFE_NO_PAD.encode(key_bytes))
}

/// Whether a plaintext key carries the administrative prefix.
pub fn is_admin_key(key: &str) -> bool {
    key.starts_with(ADMIN_KEY_PREFIX)
}

/// The leading characters of a plaintext key, safe to store and display.
pub fn display_prefix(key: &str) -> String {
    key.chars().take(DISPLAY_PREFIX_LEN).collect()
}

/// One-way hash of a presented API key.
///
/// SHA-256, hex encoded. The gateway looks keys up by this value; the
/// plaintext never touches the database.
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode and validate a base64 AES-256 key.
fn decode_cipher_key(key_b64: &str) -> Result<Aes256Gcm, anyhow::Error> {
    let key_bytes = general_purpose::STANDARD
        .decode(key_b64)
        .map_err(|e| anyhow::anyhow!("Failed to decode credentials key: {}", e))?;

    if key_bytes.len() != 32 {
        return Err(anyhow::anyhow!(
            "Credentials key must be 32 bytes (256 bits), got {} bytes",
            key_bytes.len()
        ));
    }

    Aes256Gcm::new_from_slice(&key_bytes).map_err(|e| anyhow::anyhow!("Failed to create cipher: {}", e))
}

/// Encrypts data using AES-256-GCM under the given base64-encoded key.
///
/// Returns the encrypted data as a base64-encoded string (nonce + ciphertext).
pub fn encrypt_credentials(plaintext: &[u8], key_b64: &str) -> Result<String, anyhow::Error> {
    let cipher = decode_cipher_key(key_b64)?;

    // Random 96-bit nonce per encryption
    let mut nonce_bytes = [0u8; 12];
    thread_rng().fill(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

    // Combine nonce + ciphertext and encode as base64
    let mut result = nonce_bytes.to_vec();
    result.extend_from_slice(&ciphertext);

    Ok(general_purpose::STANDARD.encode(result))
}

/// Decrypts data that was encrypted with [`encrypt_credentials`].
pub fn decrypt_credentials(encrypted_b64: &str, key_b64: &str) -> Result<Vec<u8>, anyhow::Error> {
    let cipher = decode_cipher_key(key_b64)?;

    let encrypted_data = general_purpose::STANDARD
        .decode(encrypted_b64)
        .map_err(|e| anyhow::anyhow!("Failed to decode encrypted data: {}", e))?;

    if encrypted_data.len() < 12 {
        return Err(anyhow::anyhow!("Encrypted data too short"));
    }

    let (nonce_bytes, ciphertext) = encrypted_data.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_api_key_format() {
        let key = generate_api_key(false);

        assert!(key.starts_with("ozk_"));
        // "ozk_" (4) + base64url(32 bytes) (43)
        assert_eq!(key.len(), 47);

        let key_part = &key[4..];
        assert!(key_part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!key.contains('='));
    }

    #[test]
    fn test_generate_admin_key_prefix() {
        let key = generate_api_key(true);
        assert!(key.starts_with("oza_"));
        assert!(is_admin_key(&key));
        assert!(!is_admin_key(&generate_api_key(false)));
    }

    #[test]
    fn test_generate_api_key_uniqueness() {
        let mut keys = HashSet::new();

        for _ in 0..1000 {
            let key = generate_api_key(false);
            assert!(keys.insert(key), "Generated duplicate API key");
        }
    }

    #[test]
    fn test_hash_api_key_deterministic() {
        let key = generate_api_key(false);

        let hash1 = hash_api_key(&key);
        let hash2 = hash_api_key(&key);

        assert_eq!(hash1, hash2, "Hash must be deterministic for lookup by hash");
        assert_eq!(hash1.len(), 64, "SHA-256 hex digest is 64 chars");
        assert!(hash1.chars().all(|c| c.is_ascii_hexdigit()));

        // Different keys hash differently
        assert_ne!(hash1, hash_api_key(&generate_api_key(false)));
    }

    #[test]
    fn test_display_prefix() {
        let key = "ozk_abcdefghijklmnop";
        assert_eq!(display_prefix(key), "ozk_abcdefgh");
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let test_key = general_purpose::STANDARD.encode([7u8; 32]);
        let plaintext = b"ig-session-token: abc123";

        let encrypted = encrypt_credentials(plaintext, &test_key).expect("Encryption should succeed");
        assert!(general_purpose::STANDARD.decode(&encrypted).is_ok());

        let decrypted = decrypt_credentials(&encrypted, &test_key).expect("Decryption should succeed");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encryption_produces_different_ciphertexts() {
        let test_key = general_purpose::STANDARD.encode([0u8; 32]);
        let plaintext = b"same plaintext";

        let encrypted1 = encrypt_credentials(plaintext, &test_key).unwrap();
        let encrypted2 = encrypt_credentials(plaintext, &test_key).unwrap();

        // Different ciphertexts due to random nonce
        assert_ne!(encrypted1, encrypted2);

        assert_eq!(decrypt_credentials(&encrypted1, &test_key).unwrap(), plaintext);
        assert_eq!(decrypt_credentials(&encrypted2, &test_key).unwrap(), plaintext);
    }

    #[test]
    fn test_encrypt_with_invalid_key_length() {
        let short_key = general_purpose::STANDARD.encode([0u8; 16]);

        let result = encrypt_credentials(b"test", &short_key);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("32 bytes"));
    }

    #[test]
    fn test_decrypt_with_invalid_data() {
        let test_key = general_purpose::STANDARD.encode([0u8; 32]);

        // Too short to even contain a nonce
        let result = decrypt_credentials(&general_purpose::STANDARD.encode([0u8; 5]), &test_key);
        assert!(result.is_err());

        // Wrong key fails authentication
        let other_key = general_purpose::STANDARD.encode([1u8; 32]);
        let encrypted = encrypt_credentials(b"secret", &test_key).unwrap();
        assert!(decrypt_credentials(&encrypted, &other_key).is_err());
    }
}
