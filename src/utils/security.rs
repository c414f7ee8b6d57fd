use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::InternalServerError(format!("HMAC init failed: {e}")))
}

/// Hex HMAC-SHA256 of `body`, as sent in `X-Signature`.
pub fn sign_hex(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = mac(secret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature, optionally prefixed with `sha256=`.
pub fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> Result<()> {
    let signature = signature
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AppError::InvalidSignature)?;
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let expected = hex::decode(signature).map_err(|_| AppError::InvalidSignature)?;

    let mut mac = mac(secret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::InvalidSignature)
}

/// Constant-time comparison of a presented API key against the configured one.
pub fn keys_match(expected: &str, presented: &str) -> bool {
    const PROBE: &[u8] = b"internal-key";

    sign_hex(presented, PROBE)
        .and_then(|probe| verify_signature(expected, PROBE, Some(&probe)))
        .is_ok()
}

pub fn mask_uri_token(uri: &str) -> String {
    if uri.contains("token=") {
        let mut masked = uri.to_string();
        if let Some(start) = masked.find("token=") {
            let rest = &masked[start + 6..];

            if let Some(end) = rest.find('&') {
                masked.replace_range(start + 6..start + end + 6, "***");
            } else {
                masked.replace_range(start + 6.., "***");
            }
        }
        masked
    } else {
        uri.to_string()
    }
}

/// Keeps the first four characters of a credential for log correlation.
pub fn mask_secret(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    format!("{prefix}***")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips_and_rejects_tampering() {
        let body = br#"{"order_number":"PET1","tracking_number":"SF1"}"#;
        let signature = sign_hex("callback-secret", body).unwrap();

        assert!(verify_signature("callback-secret", body, Some(&signature)).is_ok());
        assert!(
            verify_signature("callback-secret", body, Some(&format!("sha256={signature}"))).is_ok()
        );
        assert!(matches!(
            verify_signature("other-secret", body, Some(&signature)),
            Err(AppError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature("callback-secret", b"{}", Some(&signature)),
            Err(AppError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature("callback-secret", body, None),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn masks_tokens_in_query_strings() {
        assert_eq!(
            mask_uri_token("/api/selection?token=abc.def&x=1"),
            "/api/selection?token=***&x=1"
        );
        assert_eq!(mask_uri_token("/health"), "/health");
        assert_eq!(mask_secret("sk-live-123456"), "sk-l***");
    }

    #[test]
    fn api_keys_compare_exactly() {
        assert!(keys_match("internal-key-1", "internal-key-1"));
        assert!(!keys_match("internal-key-1", "internal-key-2"));
        assert!(!keys_match("internal-key-1", ""));
    }
}
