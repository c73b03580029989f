//! Handler configuration
//!
//! Keys mirror the options of the `nsupdate` challenge mode. `nsupdate_verify`
//! accepts a boolean or the strings "true"/"false".

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::challenge::errors::{ChallengeError, Result};
use crate::challenge::keyfile::{read_tsig_key, tsig_key_from_config};
use crate::challenge::retry::WaitPolicy;
use crate::challenge::zone::DNS_PORT;
use crate::dns::tsig::TsigKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsupdateConfig {
    /// BIND style key file, takes precedence over the inline key
    pub nsupdate_keyfile: Option<PathBuf>,
    /// Key to pick from the key file, or the inline key name
    pub nsupdate_keyname: Option<String>,
    /// Inline base64 secret
    pub nsupdate_keyvalue: Option<String>,
    pub nsupdate_keyalgorithm: Option<String>,
    /// Fixed update server, by name or address
    pub nsupdate_server: Option<String>,
    #[serde(default = "default_port")]
    pub nsupdate_port: u16,
    #[serde(default = "default_true", deserialize_with = "bool_or_string")]
    pub nsupdate_verify: bool,
    #[serde(default = "default_ttl")]
    pub dns_ttl: u32,
    #[serde(default = "default_timeout")]
    pub dns_timeout_secs: u64,
    #[serde(default = "default_waittime")]
    pub dns_verify_waittime: u64,
    #[serde(default = "default_interval")]
    pub dns_verify_interval: u64,
    #[serde(default = "default_max_interval")]
    pub dns_verify_max_interval: u64,
}

fn default_port() -> u16 {
    DNS_PORT
}

fn default_true() -> bool {
    true
}

fn default_ttl() -> u32 {
    60
}

fn default_timeout() -> u64 {
    5
}

fn default_waittime() -> u64 {
    600
}

fn default_interval() -> u64 {
    2
}

fn default_max_interval() -> u64 {
    60
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Text(String),
}

fn bool_or_string<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(value) => Ok(value),
        BoolOrString::Text(text) => Ok(text.trim().eq_ignore_ascii_case("true")),
    }
}

impl Default for NsupdateConfig {
    fn default() -> Self {
        Self {
            nsupdate_keyfile: None,
            nsupdate_keyname: None,
            nsupdate_keyvalue: None,
            nsupdate_keyalgorithm: None,
            nsupdate_server: None,
            nsupdate_port: default_port(),
            nsupdate_verify: true,
            dns_ttl: default_ttl(),
            dns_timeout_secs: default_timeout(),
            dns_verify_waittime: default_waittime(),
            dns_verify_interval: default_interval(),
            dns_verify_max_interval: default_max_interval(),
        }
    }
}

impl NsupdateConfig {
    pub fn from_toml_str(content: &str) -> Result<NsupdateConfig> {
        toml::from_str(content).map_err(|e| ChallengeError::configuration(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<NsupdateConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ChallengeError::configuration(format!(
                "Could not read configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        NsupdateConfig::from_toml_str(&content)
    }

    /// The signing key, from the key file if one is configured
    pub fn tsig_key(&self) -> Result<TsigKey> {
        if let Some(ref keyfile) = self.nsupdate_keyfile {
            return read_tsig_key(keyfile, self.nsupdate_keyname.as_deref());
        }

        match (&self.nsupdate_keyname, &self.nsupdate_keyvalue) {
            (Some(name), Some(value)) => {
                tsig_key_from_config(name, value, self.nsupdate_keyalgorithm.as_deref())
            }
            _ => Err(ChallengeError::configuration(
                "either nsupdate_keyfile or nsupdate_keyname and nsupdate_keyvalue are required",
            )),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs.max(1))
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            max_wait: Duration::from_secs(self.dns_verify_waittime),
            initial_interval: Duration::from_secs(self.dns_verify_interval.max(1)),
            max_interval: Duration::from_secs(self.dns_verify_max_interval),
        }
    }
}
