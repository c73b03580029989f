//! The challenge handler facade
//!
//! `NsupdateHandler` handles a single challenge round for one domain:
//! it publishes the TXT record with a signed update, confirms it on the
//! authoritative server and finally removes it again.

use std::fmt;
use std::net::SocketAddr;
use std::thread;

use crate::challenge::acme::{challenge_domain, key_authorization, txt_value};
use crate::challenge::config::NsupdateConfig;
use crate::challenge::errors::Result;
use crate::challenge::retry::{wait_for_propagation, WaitPolicy};
use crate::challenge::update::{apply_update, ChallengeRecord, UpdateOperation};
use crate::challenge::verify::txt_record_observed;
use crate::challenge::zone::{
    resolve_authority, system_nameservers, AddressLookup, Authority, SystemAddressLookup, DNS_PORT,
};
use crate::dns::client::{DnsClient, DnsNetworkClient};
use crate::dns::tsig::TsigKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeState {
    Unpublished,
    Published,
    LocallyVerified,
    Retracted,
}

impl fmt::Display for ChallengeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Check applied once the record is confirmed on the authoritative server
pub trait VerificationPolicy {
    fn confirm(&self, client: &dyn DnsClient, domain: &str, value: &str) -> bool;
}

/// Leaves the final word to the certificate authority's own validation
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl VerificationPolicy for AcceptAll {
    fn confirm(&self, _: &dyn DnsClient, _: &str, _: &str) -> bool {
        true
    }
}

/// Requires the value to be visible through the given recursive resolvers
#[derive(Clone, Debug)]
pub struct ResolverVisibility {
    resolvers: Vec<SocketAddr>,
}

impl ResolverVisibility {
    pub fn new(resolvers: Vec<SocketAddr>) -> ResolverVisibility {
        ResolverVisibility { resolvers }
    }

    pub fn system() -> Result<ResolverVisibility> {
        Ok(ResolverVisibility::new(system_nameservers()?))
    }
}

impl VerificationPolicy for ResolverVisibility {
    fn confirm(&self, client: &dyn DnsClient, domain: &str, value: &str) -> bool {
        self.resolvers
            .iter()
            .any(|resolver| txt_record_observed(client, domain, value, *resolver, false))
    }
}

/// The operations a certificate issuance workflow needs from a DNS-01
/// challenge handler
pub trait DnsChallengeHandler {
    /// Adds the TXT record `domain` with `value`
    fn publish(&mut self, domain: &str, value: &str) -> Result<()>;

    /// Whether the record is visible. Never waits.
    fn verify(&mut self, domain: &str, value: &str) -> Result<bool>;

    /// Removes the TXT record again
    fn retract(&mut self, domain: &str, value: &str) -> Result<()>;

    /// Derives record name and value for `domain` and publishes them
    fn create_challenge(
        &mut self,
        domain: &str,
        thumbprint: &str,
        token: &str,
    ) -> Result<(String, String)> {
        let name = challenge_domain(domain);
        let value = txt_value(&key_authorization(token, thumbprint));

        self.publish(&name, &value)?;

        Ok((name, value))
    }

    /// Blocks until the published record is visible
    fn start_challenge(&mut self, name: &str, value: &str, policy: &WaitPolicy) -> Result<()> {
        let mut sleep = thread::sleep;
        wait_for_propagation(self, name, value, policy, &mut sleep)
    }

    /// Removes the record, logging instead of failing
    fn stop_challenge(&mut self, name: &str, value: &str) {
        if let Err(err) = self.retract(name, value) {
            log::warn!("Could not remove TXT record {}: {}", name, err);
        }
    }
}

/// Challenge handler using signed dynamic updates
pub struct NsupdateHandler {
    key: TsigKey,
    server: Option<String>,
    port: u16,
    ttl: u32,
    verify_authoritative: bool,
    client: Box<dyn DnsClient + Send + Sync>,
    lookup: Box<dyn AddressLookup + Send + Sync>,
    resolvers: Option<Vec<SocketAddr>>,
    policy: Box<dyn VerificationPolicy + Send + Sync>,
    state: ChallengeState,
}

impl fmt::Debug for NsupdateHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NsupdateHandler")
            .field("key", &self.key)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("ttl", &self.ttl)
            .field("verify_authoritative", &self.verify_authoritative)
            .field("state", &self.state)
            .finish()
    }
}

impl NsupdateHandler {
    pub fn new(key: TsigKey) -> NsupdateHandler {
        NsupdateHandler {
            key,
            server: None,
            port: DNS_PORT,
            ttl: 60,
            verify_authoritative: true,
            client: Box::new(DnsNetworkClient::default()),
            lookup: Box::new(SystemAddressLookup),
            resolvers: None,
            policy: Box::new(AcceptAll),
            state: ChallengeState::Unpublished,
        }
    }

    pub fn from_config(config: &NsupdateConfig) -> Result<NsupdateHandler> {
        let handler = NsupdateHandler::new(config.tsig_key()?)
            .with_server(config.nsupdate_server.clone())
            .with_port(config.nsupdate_port)
            .with_ttl(config.dns_ttl)
            .with_verification(config.nsupdate_verify)
            .with_client(Box::new(DnsNetworkClient::new(config.query_timeout())));

        Ok(handler)
    }

    pub fn with_server(mut self, server: Option<String>) -> Self {
        self.server = server.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Whether `verify` checks the authoritative server before the policy
    pub fn with_verification(mut self, verify_authoritative: bool) -> Self {
        self.verify_authoritative = verify_authoritative;
        self
    }

    pub fn with_client(mut self, client: Box<dyn DnsClient + Send + Sync>) -> Self {
        self.client = client;
        self
    }

    pub fn with_lookup(mut self, lookup: Box<dyn AddressLookup + Send + Sync>) -> Self {
        self.lookup = lookup;
        self
    }

    /// Resolvers for the SOA walk instead of the system configuration
    pub fn with_resolvers(mut self, resolvers: Vec<SocketAddr>) -> Self {
        self.resolvers = Some(resolvers);
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn VerificationPolicy + Send + Sync>) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Zone and update server for `domain`, looked up again on every call
    pub fn authority(&self, domain: &str) -> Result<Authority> {
        let resolvers = match (&self.server, &self.resolvers) {
            (Some(_), _) => Vec::new(),
            (None, Some(resolvers)) => resolvers.clone(),
            (None, None) => system_nameservers()?,
        };

        resolve_authority(
            self.client.as_ref(),
            self.lookup.as_ref(),
            domain,
            self.server.as_deref(),
            self.port,
            &resolvers,
        )
    }

    fn update(&self, operation: UpdateOperation, domain: &str, value: &str) -> Result<()> {
        let authority = self.authority(domain)?;
        let record = ChallengeRecord::new(domain, self.ttl, value);

        apply_update(
            self.client.as_ref(),
            &self.key,
            operation,
            &authority.zone,
            &record,
            SocketAddr::new(authority.nameserver, self.port),
        )
    }
}

impl DnsChallengeHandler for NsupdateHandler {
    fn publish(&mut self, domain: &str, value: &str) -> Result<()> {
        self.update(UpdateOperation::Add, domain, value)?;

        if self.state != ChallengeState::LocallyVerified {
            self.state = ChallengeState::Published;
        }

        Ok(())
    }

    fn verify(&mut self, domain: &str, value: &str) -> Result<bool> {
        if self.state == ChallengeState::Retracted {
            return Ok(false);
        }

        if self.verify_authoritative && self.state != ChallengeState::LocallyVerified {
            let authority = match self.authority(domain) {
                Ok(authority) => authority,
                Err(err) if err.is_transient() => {
                    log::warn!("Could not locate authoritative server for {}: {}", domain, err);
                    return Ok(false);
                }
                Err(err) => return Err(err),
            };
            let server = SocketAddr::new(authority.nameserver, self.port);

            if !txt_record_observed(self.client.as_ref(), domain, value, server, true) {
                return Ok(false);
            }

            log::info!(
                "Verified '{} {} IN TXT \"{}\"' on {}",
                domain,
                self.ttl,
                value,
                authority.nameserver
            );
            self.state = ChallengeState::LocallyVerified;
        }

        Ok(self.policy.confirm(self.client.as_ref(), domain, value))
    }

    fn retract(&mut self, domain: &str, value: &str) -> Result<()> {
        let result = self.update(UpdateOperation::Delete, domain, value);
        self.state = ChallengeState::Retracted;

        result
    }
}
