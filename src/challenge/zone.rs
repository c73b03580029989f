//! Discovery of the zone apex and the server accepting updates for it
//!
//! The zone is found by walking up the labels of the challenge name and
//! asking for a SOA record at every step. The first answer decides both the
//! zone and its primary server (the SOA `mname`).

use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use lazy_static::lazy_static;
use regex::Regex;

use crate::challenge::errors::{ChallengeError, Result};
use crate::dns::client::{ClientError, DnsClient};
use crate::dns::protocol::{QueryType, ResultCode};

pub const DNS_PORT: u16 = 53;

lazy_static! {
    static ref IPV4_LITERAL: Regex = Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").unwrap();
    static ref IPV6_LITERAL: Regex =
        Regex::new(r"^[0-9a-fA-F]{0,4}(?::[0-9a-fA-F]{0,4}){1,7}(?::(?:[0-9]{1,3}\.){3}[0-9]{1,3})?$")
            .unwrap();
}

/// Name to address resolution, kept behind a trait so tests can count calls
pub trait AddressLookup {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolution through the operating system (`getaddrinfo`)
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAddressLookup;

impl AddressLookup for SystemAddressLookup {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = (host, DNS_PORT).to_socket_addrs()?;

        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// The zone a challenge name belongs to and the address of its update server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authority {
    /// Absolute zone name, e.g. `example.com.`
    pub zone: String,
    pub nameserver: IpAddr,
}

/// Parses `host` if it is written as an IPv4 or IPv6 address
pub fn literal_address(host: &str) -> Option<IpAddr> {
    let host = host.trim();
    if !IPV4_LITERAL.is_match(host) && !IPV6_LITERAL.is_match(host) {
        return None;
    }

    host.parse::<IpAddr>().ok()
}

/// Address of a name server given by name or as a literal address
pub fn lookup_nameserver(lookup: &dyn AddressLookup, host: &str) -> Result<IpAddr> {
    if let Some(addr) = literal_address(host) {
        return Ok(addr);
    }

    let addrs = lookup.lookup(host.trim()).map_err(|err| {
        ChallengeError::resolution(format!("Could not lookup dns ip for {}: {}", host, err))
    })?;

    addrs
        .into_iter()
        .next()
        .ok_or_else(|| ChallengeError::resolution(format!("Could not lookup dns ip for {}", host)))
}

/// The resolvers configured for this host, in order and without duplicates
pub fn system_nameservers() -> Result<Vec<SocketAddr>> {
    let (config, _) = hickory_resolver::system_conf::read_system_conf().map_err(|err| {
        ChallengeError::resolution(format!("Could not read system resolver configuration: {}", err))
    })?;

    let mut servers: Vec<SocketAddr> = Vec::new();
    for ns in config.name_servers() {
        if !servers.contains(&ns.socket_addr) {
            servers.push(ns.socket_addr);
        }
    }

    if servers.is_empty() {
        return Err(ChallengeError::resolution("No system resolvers configured"));
    }

    Ok(servers)
}

/// Names queried for SOA records, starting with `domain` itself.
///
/// Top level domains are never queried.
pub fn zone_candidates(domain: &str) -> Vec<String> {
    let domain = domain.trim().trim_end_matches('.');
    if domain.is_empty() {
        return Vec::new();
    }

    let labels: Vec<&str> = domain.split('.').collect();
    (0..labels.len().saturating_sub(1))
        .map(|i| labels[i..].join("."))
        .collect()
}

/// Walks up from `domain` until one of `resolvers` answers with a SOA record.
///
/// Returns the absolute zone name and the primary server name. A timeout
/// moves on to the next resolver for the same name; an error response or
/// any other failure moves on to the parent name.
pub fn find_soa(
    client: &dyn DnsClient,
    domain: &str,
    resolvers: &[SocketAddr],
) -> Result<(String, String)> {
    for candidate in zone_candidates(domain) {
        for resolver in resolvers {
            log::debug!("Querying SOA for {} at {}", candidate, resolver);

            match client.send_query(&candidate, QueryType::Soa, *resolver, false) {
                Ok(response) if response.header.rescode == ResultCode::NOERROR => {
                    if let Some(mname) = response.get_soa_mname() {
                        let mname = mname.split_whitespace().next().unwrap_or("").to_string();
                        return Ok((format!("{}.", candidate), mname));
                    }
                }
                Ok(response) => {
                    log::debug!(
                        "SOA query for {} at {} returned {}",
                        candidate,
                        resolver,
                        response.header.rescode
                    );
                    break;
                }
                Err(ClientError::TimeOut) => {
                    log::warn!("SOA query for {} at {} timed out", candidate, resolver);
                    continue;
                }
                Err(err) => {
                    log::debug!("SOA query for {} at {} failed: {}", candidate, resolver, err);
                    break;
                }
            }
        }
    }

    Err(ChallengeError::ZoneNotFound {
        domain: domain.to_string(),
    })
}

/// Determines zone and update server for `domain`.
///
/// With an `explicit_server` the SOA walk runs against that server only and
/// its address is the result. Otherwise `resolvers` are walked and the SOA
/// primary is resolved to an address.
pub fn resolve_authority(
    client: &dyn DnsClient,
    lookup: &dyn AddressLookup,
    domain: &str,
    explicit_server: Option<&str>,
    port: u16,
    resolvers: &[SocketAddr],
) -> Result<Authority> {
    match explicit_server {
        Some(server) => {
            let nameserver = lookup_nameserver(lookup, server)?;
            let (zone, _) = find_soa(client, domain, &[SocketAddr::new(nameserver, port)])?;

            Ok(Authority { zone, nameserver })
        }
        None => {
            let (zone, mname) = find_soa(client, domain, resolvers)?;
            let nameserver = lookup_nameserver(lookup, &mname)?;

            Ok(Authority { zone, nameserver })
        }
    }
}
