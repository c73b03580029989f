//! TSIG key material from BIND style key files or inline settings
//!
//! Key files hold one or more blocks of the form
//!
//! ```text
//! key "update-key." {
//!     algorithm hmac-sha256;
//!     secret "c2VjcmV0...";
//! };
//! ```
//!
//! Blocks are located with regular expressions rather than a full
//! `named.conf` parser; only the name, algorithm and secret are used.

use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::challenge::errors::{ChallengeError, Result};
use crate::dns::tsig::{TsigAlgorithm, TsigKey};

/// Algorithm used when inline settings do not name one
pub const DEFAULT_KEY_ALGORITHM: TsigAlgorithm = TsigAlgorithm::HmacMd5;

lazy_static! {
    static ref FIRST_KEY_NAME: Regex =
        Regex::new(r#"(?s)key\s+"?([^"{\s]+?)"?\s*\{.*\};"#).unwrap();
    static ref ALGORITHM: Regex = Regex::new(r"algorithm\s+([a-zA-Z0-9_.-]+?)\s*;").unwrap();
    static ref SECRET: Regex = Regex::new(r#"(?s)secret\s+"(.*?)""#).unwrap();
}

/// Reads the key `key_name` (or the first key) from the file at `path`
pub fn read_tsig_key<P: AsRef<Path>>(path: P, key_name: Option<&str>) -> Result<TsigKey> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|err| ChallengeError::KeyFileUnreadable {
        path: path.display().to_string(),
        source: err,
    })?;

    parse_tsig_key(&content, key_name)
}

/// Extracts a key from key file content
pub fn parse_tsig_key(content: &str, key_name: Option<&str>) -> Result<TsigKey> {
    let key_name = match key_name {
        Some(name) => name.trim().trim_end_matches('.').to_string(),
        None => FIRST_KEY_NAME
            .captures(content)
            .map(|caps| caps[1].trim_end_matches('.').to_string())
            .ok_or_else(|| ChallengeError::configuration("no key block found in key file"))?,
    };

    let block = Regex::new(&format!(
        r#"(?s)key\s+"?(?i:{})\.?"?\s*\{{(.*?)\}};"#,
        regex::escape(&key_name)
    ))
    .map_err(|e| ChallengeError::configuration(e.to_string()))?;

    let key_data = block
        .captures(content)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            ChallengeError::configuration(format!("key {} not found in key file", key_name))
        })?;

    let algorithm = ALGORITHM
        .captures(&key_data)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            ChallengeError::configuration(format!("key {} has no algorithm", key_name))
        })?;

    let secret = SECRET
        .captures(&key_data)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ChallengeError::configuration(format!("key {} has no secret", key_name)))?;

    tsig_key_from_config(&key_name, &secret, Some(&algorithm))
}

/// Builds a key from inline name, base64 secret and optional algorithm
pub fn tsig_key_from_config(name: &str, secret: &str, algorithm: Option<&str>) -> Result<TsigKey> {
    let algorithm = match algorithm {
        Some(name) => name.parse::<TsigAlgorithm>()?,
        None => DEFAULT_KEY_ALGORITHM,
    };

    let key = TsigKey::from_base64(name, secret, algorithm)?;
    log::debug!("Loaded TSIG key {} ({})", key.name(), key.algorithm());

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEYS: &str = r#"
# managed by ops
key "first-key." {
    algorithm hmac-sha256;
    secret "Zmlyc3Qtc2VjcmV0";
};

key second-key {
	algorithm HMAC-SHA512;
	secret "c2Vjb25kLXNlY3JldA==";
};
"#;

    #[test]
    fn test_first_key_is_default() {
        let key = parse_tsig_key(KEYS, None).unwrap();
        assert_eq!("first-key", key.name());
        assert_eq!(TsigAlgorithm::HmacSha256, key.algorithm());
    }

    #[test]
    fn test_named_key() {
        let key = parse_tsig_key(KEYS, Some("second-key")).unwrap();
        assert_eq!("second-key", key.name());
        assert_eq!(TsigAlgorithm::HmacSha512, key.algorithm());

        let key = parse_tsig_key(KEYS, Some("first-key.")).unwrap();
        assert_eq!("first-key", key.name());
    }

    #[test]
    fn test_unknown_key_name_is_rejected() {
        match parse_tsig_key(KEYS, Some("other-key")) {
            Err(ChallengeError::Configuration { message }) => {
                assert!(message.contains("other-key"))
            }
            other => panic!("expected configuration error, got {:?}", other),
        }

        // Prefix of an existing name must not match
        assert!(parse_tsig_key(KEYS, Some("first")).is_err());
    }

    #[test]
    fn test_key_name_ignores_case() {
        let key = parse_tsig_key(KEYS, Some("Second-Key.")).unwrap();
        assert_eq!("second-key", key.name());
        assert_eq!(TsigAlgorithm::HmacSha512, key.algorithm());
    }

    #[test]
    fn test_incomplete_blocks() {
        let no_secret = r#"key "k" { algorithm hmac-sha256; };"#;
        assert!(matches!(
            parse_tsig_key(no_secret, None),
            Err(ChallengeError::Configuration { .. })
        ));

        let no_algorithm = r#"key "k" { secret "c2VjcmV0"; };"#;
        assert!(matches!(
            parse_tsig_key(no_algorithm, None),
            Err(ChallengeError::Configuration { .. })
        ));

        let bad_algorithm = r#"key "k" { algorithm gss-tsig; secret "c2VjcmV0"; };"#;
        assert!(matches!(
            parse_tsig_key(bad_algorithm, None),
            Err(ChallengeError::Configuration { .. })
        ));

        assert!(parse_tsig_key("", None).is_err());
    }

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KEYS.as_bytes()).unwrap();

        let key = read_tsig_key(file.path(), Some("second-key")).unwrap();
        assert_eq!("second-key", key.name());
    }

    #[test]
    fn test_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.key");

        match read_tsig_key(&path, None) {
            Err(ChallengeError::KeyFileUnreadable { path: reported, .. }) => {
                assert!(reported.ends_with("missing.key"))
            }
            other => panic!("expected unreadable key file, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_key() {
        let key = tsig_key_from_config("inline", "c2VjcmV0", None).unwrap();
        assert_eq!(DEFAULT_KEY_ALGORITHM, key.algorithm());

        let key = tsig_key_from_config("inline", "c2VjcmV0", Some("hmac-sha1")).unwrap();
        assert_eq!(TsigAlgorithm::HmacSha1, key.algorithm());

        assert!(tsig_key_from_config("inline", "", None).is_err());
        assert!(tsig_key_from_config("inline", "c2VjcmV0", Some("rot13")).is_err());
    }
}
