//! acme-nsupdate
//!
//! DNS-01 challenge handler for ACME certificate issuance, backed by signed
//! dynamic updates (RFC 2136 with TSIG).
//!
//! # Features
//!
//! * Discovery of the authoritative zone and primary server through SOA lookups
//! * TSIG keys from BIND style key files or inline configuration
//! * Signed TXT record add and delete over TCP
//! * Verification directly against the authoritative server
//!
//! # Architecture
//!
//! The crate is divided into two main modules:
//! * `dns` - Wire protocol, client and TSIG
//! * `challenge` - Zone discovery, updates, verification and the handler facade

/// DNS protocol handling
pub mod dns;

/// DNS-01 challenge handling on top of dynamic updates
pub mod challenge;
