//! Error taxonomy for challenge handling

use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;

use crate::dns::client::ClientError;
use crate::dns::protocol::ResultCode;
use crate::dns::tsig::{error_name, TsigError};

/// Errors raised while publishing, verifying or retracting a challenge
#[derive(Debug)]
pub enum ChallengeError {
    /// Malformed key material or incomplete configuration
    Configuration { message: String },
    /// The key file could not be read at all
    KeyFileUnreadable { path: String, source: io::Error },
    /// The label walk reached the top without any SOA answer
    ZoneNotFound { domain: String },
    /// A host name could not be turned into an address
    Resolution { message: String },
    /// The authoritative server refused the signed update
    UpdateRejected {
        server: String,
        rcode: ResultCode,
        tsig_error: Option<u16>,
    },
    /// Network failure while talking to the update server
    Transport { source: ClientError },
    /// The record did not become visible within the wait budget
    VerificationTimeout { domain: String, waited: Duration },
}

impl ChallengeError {
    pub fn configuration<S: Into<String>>(message: S) -> ChallengeError {
        ChallengeError::Configuration {
            message: message.into(),
        }
    }

    pub fn resolution<S: Into<String>>(message: S) -> ChallengeError {
        ChallengeError::Resolution {
            message: message.into(),
        }
    }

    /// Whether the whole challenge may succeed when tried again later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChallengeError::ZoneNotFound { .. }
                | ChallengeError::Resolution { .. }
                | ChallengeError::Transport { .. }
        )
    }
}

impl fmt::Display for ChallengeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeError::Configuration { message } => {
                write!(f, "Configuration error: {}", message)
            }
            ChallengeError::KeyFileUnreadable { path, source } => {
                write!(f, "Could not read TSIG key file {}: {}", path, source)
            }
            ChallengeError::ZoneNotFound { domain } => {
                write!(f, "Could not find SOA for {}", domain)
            }
            ChallengeError::Resolution { message } => write!(f, "Resolution error: {}", message),
            ChallengeError::UpdateRejected {
                server,
                rcode,
                tsig_error: Some(code),
            } => write!(
                f,
                "Update rejected by {}: {} ({})",
                server,
                rcode,
                error_name(*code)
            ),
            ChallengeError::UpdateRejected { server, rcode, .. } => {
                write!(f, "Update rejected by {}: {}", server, rcode)
            }
            ChallengeError::Transport { source } => write!(f, "Transport error: {}", source),
            ChallengeError::VerificationTimeout { domain, waited } => write!(
                f,
                "TXT record for {} not visible after {} seconds",
                domain,
                waited.as_secs()
            ),
        }
    }
}

impl Error for ChallengeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChallengeError::KeyFileUnreadable { source, .. } => Some(source),
            ChallengeError::Transport { source } => Some(source),
            _ => None,
        }
    }
}

impl From<ClientError> for ChallengeError {
    fn from(err: ClientError) -> Self {
        ChallengeError::Transport { source: err }
    }
}

impl From<TsigError> for ChallengeError {
    fn from(err: TsigError) -> Self {
        ChallengeError::Configuration {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChallengeError>;
