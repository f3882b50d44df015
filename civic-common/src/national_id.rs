//! National ID protection
//!
//! National IDs are never stored in clear. Each is stored as
//! `salt_hex:digest_hex`, where the digest is HMAC-SHA256 keyed by the
//! configured pepper over `salt || national_id`. The 16-byte salt is random
//! per agent.

use crate::{Error, Result};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Required number of digits in a national ID
pub const NATIONAL_ID_DIGITS: usize = 8;

const SALT_LEN: usize = 16;

/// Check a national ID is exactly 8 ASCII digits
pub fn validate(national_id: &str) -> Result<()> {
    if national_id.len() == NATIONAL_ID_DIGITS && national_id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "National ID must be {} digits",
            NATIONAL_ID_DIGITS
        )))
    }
}

/// Validate and hash a national ID for storage
pub fn protect(national_id: &str, pepper: &str) -> Result<String> {
    validate(national_id)?;

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mac = keyed_digest(pepper, &salt, national_id)
        .map_err(|e| Error::Internal(format!("national ID digest: {}", e)))?;

    Ok(format!(
        "{}:{}",
        hex::encode(salt),
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check a clear national ID against a stored `salt_hex:digest_hex` value
///
/// The digest comparison runs in constant time.
pub fn matches(stored: &str, national_id: &str, pepper: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once(':') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };
    match keyed_digest(pepper, &salt, national_id) {
        Ok(mac) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

fn keyed_digest(
    pepper: &str,
    salt: &[u8],
    national_id: &str,
) -> std::result::Result<HmacSha256, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(pepper.as_bytes())?;
    mac.update(salt);
    mac.update(national_id.as_bytes());
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_eight_digits() {
        assert!(validate("12345678").is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ids() {
        for bad in ["1234567", "123456789", "1234567a", "", "１２３４５６７８"] {
            assert!(validate(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_protect_hides_id_and_verifies() {
        let stored = protect("12345678", "pepper").unwrap();
        assert!(!stored.contains("12345678"));
        assert!(matches(&stored, "12345678", "pepper"));
        assert!(!matches(&stored, "87654321", "pepper"));
        assert!(!matches(&stored, "12345678", "other-pepper"));
    }

    #[test]
    fn test_same_id_gets_different_salts() {
        let a = protect("12345678", "pepper").unwrap();
        let b = protect("12345678", "pepper").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_stored_value_never_matches() {
        assert!(!matches("nocolon", "12345678", "pepper"));
        assert!(!matches("zz:abcd", "12345678", "pepper"));
        assert!(!matches("abc:abcd", "12345678", "pepper"));
    }

    #[test]
    fn test_stored_digest_is_pepper_keyed_hmac() {
        let stored = protect("12345678", "pepper").unwrap();
        let (salt_hex, digest_hex) = stored.split_once(':').unwrap();
        assert_eq!(salt_hex.len(), SALT_LEN * 2);

        let salt = hex::decode(salt_hex).unwrap();
        let mut mac = HmacSha256::new_from_slice(b"pepper").unwrap();
        mac.update(&salt);
        mac.update(b"12345678");
        assert_eq!(digest_hex, hex::encode(mac.finalize().into_bytes()));
    }

    #[test]
    fn test_truncated_digest_never_matches() {
        let stored = protect("12345678", "pepper").unwrap();
        let truncated = &stored[..stored.len() - 2];
        assert!(!matches(truncated, "12345678", "pepper"));
        assert!(matches(&stored.to_uppercase(), "12345678", "pepper"));
    }
}
