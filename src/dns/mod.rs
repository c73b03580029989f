//! DNS protocol implementation
//!
//! This module provides the wire level pieces needed to locate a zone and to
//! change it remotely:
//! * DNS packet parsing and serialization
//! * A blocking client for queries over UDP and TCP
//! * TSIG message authentication for dynamic updates
//!
//! # Module Structure
//!
//! * `buffer` - Low-level packet buffer operations
//! * `protocol` - DNS protocol definitions and packet handling
//! * `netutil` - Length framing for messages carried over TCP
//! * `client` - DNS client for outgoing queries and update messages
//! * `tsig` - Transaction signatures

/// Low-level buffer operations for DNS packet handling
pub mod buffer;

/// DNS client for making outgoing queries
pub mod client;

/// Framing helpers for DNS over TCP
pub mod netutil;

/// DNS protocol definitions and packet structures
pub mod protocol;

/// Transaction signatures (TSIG)
pub mod tsig;
