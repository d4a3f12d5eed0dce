//! Stored API-key decryption and environment overrides.
//!
//! Per-user platform keys are persisted AES-256-GCM encrypted (base64
//! ciphertext + base64 nonce). The master key and the process-wide override
//! keys are read from the environment exactly once, at startup; handlers
//! receive them as a [`CredentialOverrides`] value and never touch the
//! environment themselves.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

pub const ENCRYPTION_KEY_ENV: &str = "TETHER_ENCRYPTION_KEY";
pub const SHORTCUT_KEY_ENV: &str = "TETHER_SHORTCUT_API_KEY";
pub const GITHUB_KEY_ENV: &str = "TETHER_GITHUB_API_KEY";
pub const SHORTCUT_ADMIN_KEY_ENV: &str = "TETHER_SHORTCUT_ADMIN_KEY";

/// Process-wide credential configuration captured at startup.
///
/// `shortcut_api_key` / `github_api_key` substitute for every stored
/// per-user key when set. `shortcut_admin_key` enables anonymous mode for
/// repos whose sender has no sync configuration of their own.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub encryption_key: Option<String>,
    pub shortcut_api_key: Option<String>,
    pub github_api_key: Option<String>,
    pub shortcut_admin_key: Option<String>,
}

impl CredentialOverrides {
    pub fn from_env() -> Self {
        Self {
            encryption_key: env_value(ENCRYPTION_KEY_ENV),
            shortcut_api_key: env_value(SHORTCUT_KEY_ENV),
            github_api_key: env_value(GITHUB_KEY_ENV),
            shortcut_admin_key: env_value(SHORTCUT_ADMIN_KEY_ENV),
        }
    }

    /// Resolve a stored ciphertext into a usable token, preferring the
    /// process-wide override when one is configured.
    pub fn resolve(
        &self,
        override_key: Option<&str>,
        ciphertext_b64: &str,
        nonce_b64: &str,
    ) -> Result<String> {
        if let Some(key) = override_key {
            return Ok(key.to_string());
        }
        let master = self
            .encryption_key
            .as_deref()
            .context("no encryption key configured and no override key set")?;
        decrypt_api_key(ciphertext_b64, nonce_b64, master)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Decrypt a stored API key. `master_key_b64` must decode to 32 bytes.
pub fn decrypt_api_key(ciphertext_b64: &str, nonce_b64: &str, master_key_b64: &str) -> Result<String> {
    let cipher = cipher_from_key(master_key_b64)?;
    let nonce_bytes = BASE64
        .decode(nonce_b64.trim())
        .context("api key nonce is not valid base64")?;
    if nonce_bytes.len() != 12 {
        bail!("api key nonce must be 12 bytes, got {}", nonce_bytes.len());
    }
    let ciphertext = BASE64
        .decode(ciphertext_b64.trim())
        .context("api key ciphertext is not valid base64")?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| anyhow!("api key decryption failed"))?;
    String::from_utf8(plaintext).context("decrypted api key is not utf-8")
}

/// Encrypt an API key for storage. Returns `(ciphertext_b64, nonce_b64)`.
///
/// The connection flow is the writer; the engine only decrypts. Kept here so
/// both sides share one format.
pub fn encrypt_api_key(plaintext: &str, master_key_b64: &str) -> Result<(String, String)> {
    let cipher = cipher_from_key(master_key_b64)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| anyhow!("api key encryption failed"))?;
    Ok((BASE64.encode(ciphertext), BASE64.encode(nonce)))
}

fn cipher_from_key(master_key_b64: &str) -> Result<Aes256Gcm> {
    let key_bytes = BASE64
        .decode(master_key_b64.trim())
        .context("encryption key is not valid base64")?;
    Aes256Gcm::new_from_slice(&key_bytes)
        .map_err(|_| anyhow!("encryption key must be 32 bytes, got {}", key_bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_master_key() -> String {
        BASE64.encode([7u8; 32])
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let master = test_master_key();
        let (ciphertext, nonce) = encrypt_api_key("sc-token-123", &master).expect("encrypt");
        let plaintext = decrypt_api_key(&ciphertext, &nonce, &master).expect("decrypt");
        assert_eq!(plaintext, "sc-token-123");
    }

    #[test]
    fn tampered_ciphertext_is_an_error() {
        let master = test_master_key();
        let (ciphertext, nonce) = encrypt_api_key("sc-token-123", &master).expect("encrypt");
        let mut bytes = BASE64.decode(&ciphertext).expect("base64");
        bytes[0] ^= 0xff;
        let tampered = BASE64.encode(bytes);
        assert!(decrypt_api_key(&tampered, &nonce, &master).is_err());
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let short_key = BASE64.encode([1u8; 16]);
        assert!(decrypt_api_key("", "", &short_key).is_err());
    }

    #[test]
    fn override_key_wins_over_ciphertext() {
        let overrides = CredentialOverrides {
            encryption_key: None,
            ..Default::default()
        };
        let token = overrides
            .resolve(Some("env-token"), "not-even-base64", "nope")
            .expect("resolve");
        assert_eq!(token, "env-token");
    }

    #[test]
    fn missing_master_key_without_override_fails() {
        let overrides = CredentialOverrides::default();
        assert!(overrides.resolve(None, "AAAA", "AAAA").is_err());
    }
}
