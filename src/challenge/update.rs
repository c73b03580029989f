//! Signed dynamic updates (RFC 2136) adding or deleting one TXT record

use std::fmt;
use std::net::SocketAddr;

use chrono::Utc;
use rand::random;

use crate::challenge::errors::{ChallengeError, Result};
use crate::dns::buffer::VectorPacketBuffer;
use crate::dns::client::{ClientError, DnsClient};
use crate::dns::protocol::{
    DnsClass, DnsHeader, DnsPacket, DnsQuestion, DnsRecord, QueryType, ResultCode, OPCODE_UPDATE,
};
use crate::dns::tsig::{TsigError, TsigKey, BADKEY, BADSIG, BADTIME};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOperation {
    Add,
    Delete,
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            UpdateOperation::Add => write!(f, "add"),
            UpdateOperation::Delete => write!(f, "delete"),
        }
    }
}

/// The TXT record carrying a challenge value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeRecord {
    pub owner: String,
    pub ttl: u32,
    pub value: String,
}

impl ChallengeRecord {
    pub fn new(owner: &str, ttl: u32, value: &str) -> ChallengeRecord {
        ChallengeRecord {
            owner: owner.trim_end_matches('.').to_string(),
            ttl,
            value: value.to_string(),
        }
    }

    fn to_record(&self) -> DnsRecord {
        DnsRecord::txt(&self.owner, &self.value, self.ttl)
    }
}

pub(crate) fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Encodes an unsigned UPDATE message for `zone` holding a single record
/// action. Adds use class IN, deletes of the specific record class NONE.
pub fn build_update(
    id: u16,
    zone: &str,
    operation: UpdateOperation,
    record: &ChallengeRecord,
) -> Result<Vec<u8>> {
    let mut header = DnsHeader::new();
    header.id = id;
    header.opcode = OPCODE_UPDATE;
    header.questions = 1;
    header.authoritative_entries = 1;

    let class = match operation {
        UpdateOperation::Add => DnsClass::In,
        UpdateOperation::Delete => DnsClass::None,
    };

    let mut buffer = VectorPacketBuffer::new();
    let written = header
        .write(&mut buffer)
        .and_then(|_| DnsQuestion::new(zone.to_string(), QueryType::Soa).write(&mut buffer))
        .and_then(|_| record.to_record().write_in_class(&mut buffer, class));

    if let Err(err) = written {
        return Err(ChallengeError::configuration(format!(
            "Could not encode update for {} in zone {}: {}",
            record.owner, zone, err
        )));
    }

    Ok(buffer.into_bytes())
}

/// Signs and sends a single record update for `zone` to `server` over TCP.
///
/// The response must be NOERROR and carry a valid signature by the same
/// key; anything else is reported as a rejected update.
pub fn apply_update(
    client: &dyn DnsClient,
    key: &TsigKey,
    operation: UpdateOperation,
    zone: &str,
    record: &ChallengeRecord,
    server: SocketAddr,
) -> Result<()> {
    let id = random::<u16>();
    let unsigned = build_update(id, zone, operation, record)?;
    let (signed, request_mac) = key.sign(&unsigned, None, unix_now())?;

    match operation {
        UpdateOperation::Add => log::info!(
            "Adding '{} {} IN TXT \"{}\"' to {}",
            record.owner,
            record.ttl,
            record.value,
            server.ip()
        ),
        UpdateOperation::Delete => log::info!(
            "Deleting '{} {} IN TXT \"{}\"' from {}",
            record.owner,
            record.ttl,
            record.value,
            server.ip()
        ),
    }

    let response_bytes = client.send_tcp_message(&signed, server)?;
    let response = DnsPacket::from_bytes(&response_bytes).map_err(ClientError::from)?;

    if response.header.id != id {
        return Err(ClientError::MismatchedResponse(response.header.id, id).into());
    }

    if response.header.rescode != ResultCode::NOERROR {
        let tsig_error = match response.get_tsig() {
            Some(DnsRecord::Tsig { error, .. }) if *error != 0 => Some(*error),
            _ => None,
        };

        return Err(ChallengeError::UpdateRejected {
            server: server.ip().to_string(),
            rcode: response.header.rescode,
            tsig_error,
        });
    }

    if let Err(err) = key.verify(&response_bytes, Some(&request_mac), unix_now()) {
        log::warn!(
            "Could not authenticate {} response from {}: {}",
            operation,
            server.ip(),
            err
        );

        let tsig_error = match err {
            TsigError::BadSig => Some(BADSIG),
            TsigError::BadKey => Some(BADKEY),
            TsigError::BadTime { .. } => Some(BADTIME),
            TsigError::PeerError { code } => Some(code),
            _ => None,
        };

        return Err(ChallengeError::UpdateRejected {
            server: server.ip().to_string(),
            rcode: ResultCode::NOTAUTH,
            tsig_error,
        });
    }

    Ok(())
}
