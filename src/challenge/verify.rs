//! Direct TXT lookups against a single server

use std::net::SocketAddr;

use crate::dns::client::DnsClient;
use crate::dns::protocol::{QueryType, ResultCode};

/// Whether `server` answers a TXT query for `domain` with `expected`.
///
/// Values are compared after stripping surrounding quotes. Lookup failures
/// and error responses count as "not visible yet".
pub fn txt_record_observed(
    client: &dyn DnsClient,
    domain: &str,
    expected: &str,
    server: SocketAddr,
    use_tcp: bool,
) -> bool {
    let response = match client.send_query(domain, QueryType::Txt, server, use_tcp) {
        Ok(response) => response,
        Err(err) => {
            log::warn!("TXT lookup for {} at {} failed: {}", domain, server, err);
            return false;
        }
    };

    if response.header.rescode != ResultCode::NOERROR {
        log::debug!(
            "TXT lookup for {} at {} returned {}",
            domain,
            server,
            response.header.rescode
        );
        return false;
    }

    response
        .get_txt_values()
        .iter()
        .any(|value| value.trim_matches('"') == expected)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dns::client::tests::DnsStubClient;
    use crate::dns::client::ClientError;
    use crate::dns::protocol::{DnsPacket, DnsRecord};

    fn server() -> SocketAddr {
        "192.0.2.53:53".parse().unwrap()
    }

    fn answering(values: &'static [&'static str]) -> DnsStubClient {
        DnsStubClient::new(Box::new(move |qname, qtype, _, use_tcp| {
            assert_eq!(QueryType::Txt, qtype);
            assert!(use_tcp);

            let mut packet = DnsPacket::new();
            packet.header.response = true;
            for value in values {
                packet.answers.push(DnsRecord::txt(qname, value, 60));
            }
            Ok(packet)
        }))
    }

    #[test]
    fn test_match_among_several_values() {
        let client = answering(&["other", "expected-value"]);
        assert!(txt_record_observed(
            &client,
            "_acme-challenge.example.com",
            "expected-value",
            server(),
            true
        ));
        assert!(!txt_record_observed(
            &client,
            "_acme-challenge.example.com",
            "missing",
            server(),
            true
        ));
    }

    #[test]
    fn test_quoted_value() {
        let client = answering(&["\"expected-value\""]);
        assert!(txt_record_observed(&client, "x.example.com", "expected-value", server(), true));
    }

    #[test]
    fn test_long_value_is_joined() {
        let long = "v".repeat(300);
        let data = vec![long[..255].to_string(), long[255..].to_string()];
        let client = DnsStubClient::new(Box::new(move |qname, _, _, _| {
            let mut packet = DnsPacket::new();
            packet.answers.push(DnsRecord::Txt {
                domain: qname.to_string(),
                data: data.clone(),
                ttl: crate::dns::protocol::TransientTtl(60),
            });
            Ok(packet)
        }));

        assert!(txt_record_observed(&client, "x.example.com", &long, server(), false));
    }

    #[test]
    fn test_failures_are_not_visible() {
        let client = DnsStubClient::new(Box::new(|_, _, _, _| Err(ClientError::TimeOut)));
        assert!(!txt_record_observed(&client, "x.example.com", "v", server(), true));

        let client = DnsStubClient::new(Box::new(|qname, _, _, _| {
            let mut packet = DnsPacket::new();
            packet.header.rescode = ResultCode::SERVFAIL;
            packet.answers.push(DnsRecord::txt(qname, "v", 60));
            Ok(packet)
        }));
        assert!(!txt_record_observed(&client, "x.example.com", "v", server(), true));
    }
}
