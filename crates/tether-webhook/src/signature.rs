//! GitHub webhook signature verification.

use anyhow::{anyhow, bail, Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Verify a `sha256=<hex>` signature header against the raw request body.
/// Comparison is constant-time via the MAC verifier.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &str) -> Result<()> {
    let digest_hex = signature_header
        .trim()
        .strip_prefix("sha256=")
        .ok_or_else(|| anyhow!("signature must use sha256=<hex> format"))?;
    let signature_bytes = decode_hex(digest_hex)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .context("failed to initialize hmac verifier")?;
    mac.update(payload);
    mac.verify_slice(&signature_bytes)
        .map_err(|_| anyhow!("signature verification failed"))
}

/// Produce the `sha256=<hex>` header value for a payload; the counterpart
/// of [`verify_signature`], used by tests and webhook registration.
pub fn sign_payload(payload: &[u8], secret: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .context("failed to initialize hmac signer")?;
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    Ok(format!("sha256={hex}"))
}

fn decode_hex(raw: &str) -> Result<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("signature digest cannot be empty");
    }
    if trimmed.len() % 2 != 0 {
        bail!("signature digest must have an even number of hex characters");
    }
    let mut bytes = Vec::with_capacity(trimmed.len() / 2);
    let mut index = 0usize;
    while index < trimmed.len() {
        let pair = &trimmed[index..index + 2];
        let byte = u8::from_str_radix(pair, 16)
            .with_context(|| format!("invalid hex pair '{pair}' in signature digest"))?;
        bytes.push(byte);
        index += 2;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_payload_verifies() {
        let payload = br#"{"action":"opened"}"#;
        let header = sign_payload(payload, "hush").expect("sign");
        verify_signature(payload, &header, "hush").expect("verify");
    }

    #[test]
    fn single_byte_mutation_breaks_verification() {
        let payload = br#"{"action":"opened"}"#.to_vec();
        let header = sign_payload(&payload, "hush").expect("sign");
        let mut tampered = payload.clone();
        tampered[2] ^= 0x01;
        assert!(verify_signature(&tampered, &header, "hush").is_err());
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = b"body";
        let header = sign_payload(payload, "hush").expect("sign");
        assert!(verify_signature(payload, &header, "other").is_err());
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert!(verify_signature(b"body", "sha1=abcd", "hush").is_err());
        assert!(verify_signature(b"body", "sha256=", "hush").is_err());
        assert!(verify_signature(b"body", "sha256=abc", "hush").is_err());
        assert!(verify_signature(b"body", "sha256=zz", "hush").is_err());
    }
}
