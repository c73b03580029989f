//! DNS-01 challenge handling
//!
//! # Module Structure
//!
//! * `keyfile` - TSIG key material from key files or inline settings
//! * `zone` - Zone apex and update server discovery
//! * `update` - Signed record add and delete
//! * `verify` - Direct TXT lookups on the authoritative server
//! * `handler` - The publish, verify and retract facade
//! * `acme` - DNS-01 record names and values
//! * `retry` - Waiting for propagation
//! * `config` - Handler configuration
//! * `errors` - Error types

/// DNS-01 record names and values
pub mod acme;

/// Handler configuration
pub mod config;

/// Error types shared by the challenge modules
pub mod errors;

/// The challenge handler facade
pub mod handler;

/// TSIG key loading
pub mod keyfile;

/// Propagation wait loop
pub mod retry;

/// Signed dynamic updates
pub mod update;

/// TXT record verification
pub mod verify;

/// Zone discovery
pub mod zone;

pub use self::errors::{ChallengeError, Result};
pub use self::handler::{DnsChallengeHandler, NsupdateHandler};
