//! DNS-01 naming and value derivation (RFC 8555 section 8.4)

use sha2::{Digest, Sha256};

pub const CHALLENGE_PREFIX: &str = "_acme-challenge.";

/// Owner name of the TXT record validating `domain`.
///
/// Wildcard names are validated through their base domain.
pub fn challenge_domain(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('.');
    let domain = domain.strip_prefix("*.").unwrap_or(domain);

    if domain.starts_with(CHALLENGE_PREFIX) {
        return domain.to_string();
    }

    format!("{}{}", CHALLENGE_PREFIX, domain)
}

/// Key authorization for a challenge token and account key thumbprint
pub fn key_authorization(token: &str, thumbprint: &str) -> String {
    format!("{}.{}", token, thumbprint)
}

/// TXT record value for a key authorization: unpadded base64url of its
/// SHA-256 digest
pub fn txt_value(key_authorization: &str) -> String {
    let digest = Sha256::digest(key_authorization.as_bytes());

    base64::encode_config(digest, base64::URL_SAFE_NO_PAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_domain() {
        assert_eq!("_acme-challenge.example.com", challenge_domain("example.com"));
        assert_eq!("_acme-challenge.example.com", challenge_domain("*.example.com."));
        assert_eq!(
            "_acme-challenge.www.example.com",
            challenge_domain("_acme-challenge.www.example.com")
        );
    }

    #[test]
    fn test_txt_value() {
        assert_eq!("47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU", txt_value(""));

        let value = txt_value(&key_authorization("token", "thumbprint"));
        assert_eq!(43, value.len());
        assert!(!value.contains('='));
        assert!(!value.contains('+') && !value.contains('/'));
    }
}
