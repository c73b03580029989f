//! TSIG transaction signatures (RFC 8945)
//!
//! A `TsigKey` is the keyring of a handler instance: one key name, one
//! shared secret and one algorithm. It signs outgoing messages and
//! authenticates the matching responses. The same two operations serve the
//! server side (verify a request, sign its response), which is what the
//! loopback server in the integration tests relies on.

use std::fmt;
use std::str::FromStr;

use derive_more::{Display, Error};
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::dns::buffer::{BufferError, PacketBuffer, VectorPacketBuffer};
use crate::dns::protocol::{DnsClass, DnsPacket, DnsQuestion, DnsRecord, ProtocolError, QueryType};

/// Allowed clock skew between signer and verifier, in seconds
pub const DEFAULT_FUDGE: u16 = 300;

/// TSIG error codes carried in the TSIG record
pub const BADSIG: u16 = 16;
pub const BADKEY: u16 = 17;
pub const BADTIME: u16 = 18;
pub const BADTRUNC: u16 = 22;

#[derive(Debug, Display, Error)]
pub enum TsigError {
    Protocol(ProtocolError),
    #[display(fmt = "unsupported TSIG algorithm: {}", name)]
    UnsupportedAlgorithm { name: String },
    #[display(fmt = "invalid TSIG secret: {}", reason)]
    InvalidSecret { reason: String },
    #[display(fmt = "message is not signed")]
    Unsigned,
    #[display(fmt = "BADKEY: message signed with an unknown key or algorithm")]
    BadKey,
    #[display(fmt = "BADSIG: message authentication code does not verify")]
    BadSig,
    #[display(fmt = "BADTIME: signature time {} outside allowed window", time_signed)]
    BadTime { time_signed: u64 },
    #[display(fmt = "peer reported TSIG error {}", "error_name(*code)")]
    PeerError { code: u16 },
}

impl From<ProtocolError> for TsigError {
    fn from(err: ProtocolError) -> Self {
        TsigError::Protocol(err)
    }
}

impl From<BufferError> for TsigError {
    fn from(err: BufferError) -> Self {
        TsigError::Protocol(ProtocolError::Buffer(err))
    }
}

type Result<T> = std::result::Result<T, TsigError>;

/// Mnemonic for a TSIG error code
pub fn error_name(code: u16) -> String {
    match code {
        BADSIG => "BADSIG".to_string(),
        BADKEY => "BADKEY".to_string(),
        BADTIME => "BADTIME".to_string(),
        BADTRUNC => "BADTRUNC".to_string(),
        other => format!("TSIG error {}", other),
    }
}

macro_rules! with_hmac {
    ($alg:expr, $key:expr, |$mac:ident| $body:expr) => {
        match $alg {
            TsigAlgorithm::HmacMd5 => {
                let mut $mac = <Hmac<Md5> as Mac>::new_from_slice($key).map_err(invalid_length)?;
                $body
            }
            TsigAlgorithm::HmacSha1 => {
                let mut $mac = <Hmac<Sha1> as Mac>::new_from_slice($key).map_err(invalid_length)?;
                $body
            }
            TsigAlgorithm::HmacSha224 => {
                let mut $mac = <Hmac<Sha224> as Mac>::new_from_slice($key).map_err(invalid_length)?;
                $body
            }
            TsigAlgorithm::HmacSha256 => {
                let mut $mac = <Hmac<Sha256> as Mac>::new_from_slice($key).map_err(invalid_length)?;
                $body
            }
            TsigAlgorithm::HmacSha384 => {
                let mut $mac = <Hmac<Sha384> as Mac>::new_from_slice($key).map_err(invalid_length)?;
                $body
            }
            TsigAlgorithm::HmacSha512 => {
                let mut $mac = <Hmac<Sha512> as Mac>::new_from_slice($key).map_err(invalid_length)?;
                $body
            }
        }
    };
}

/// The allow-list of MAC algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TsigAlgorithm {
    HmacMd5,
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl TsigAlgorithm {
    /// Looks up an algorithm by its wire name or the short spelling used in
    /// BIND key files. Case and a trailing dot are ignored.
    pub fn from_name(name: &str) -> Option<TsigAlgorithm> {
        let name = name.trim().trim_end_matches('.').to_ascii_lowercase();
        match name.as_str() {
            "hmac-md5" | "hmac-md5.sig-alg.reg.int" => Some(TsigAlgorithm::HmacMd5),
            "hmac-sha1" => Some(TsigAlgorithm::HmacSha1),
            "hmac-sha224" => Some(TsigAlgorithm::HmacSha224),
            "hmac-sha256" => Some(TsigAlgorithm::HmacSha256),
            "hmac-sha384" => Some(TsigAlgorithm::HmacSha384),
            "hmac-sha512" => Some(TsigAlgorithm::HmacSha512),
            _ => None,
        }
    }

    /// Algorithm name as carried in the TSIG record
    pub fn name(&self) -> &'static str {
        match *self {
            TsigAlgorithm::HmacMd5 => "hmac-md5.sig-alg.reg.int",
            TsigAlgorithm::HmacSha1 => "hmac-sha1",
            TsigAlgorithm::HmacSha224 => "hmac-sha224",
            TsigAlgorithm::HmacSha256 => "hmac-sha256",
            TsigAlgorithm::HmacSha384 => "hmac-sha384",
            TsigAlgorithm::HmacSha512 => "hmac-sha512",
        }
    }

    pub fn digest(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        with_hmac!(*self, key, |mac| {
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        })
    }

    /// Constant time check of `expected` against the MAC of `data`
    pub fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> Result<()> {
        with_hmac!(*self, key, |mac| {
            mac.update(data);
            mac.verify_slice(expected).map_err(|_| TsigError::BadSig)
        })
    }
}

impl FromStr for TsigAlgorithm {
    type Err = TsigError;

    fn from_str(s: &str) -> Result<Self> {
        TsigAlgorithm::from_name(s).ok_or_else(|| TsigError::UnsupportedAlgorithm {
            name: s.to_string(),
        })
    }
}

impl fmt::Display for TsigAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}


fn invalid_length(err: hmac::digest::InvalidLength) -> TsigError {
    TsigError::InvalidSecret {
        reason: err.to_string(),
    }
}

/// A message split into its unsigned form and the TSIG record it carried
struct SignedParts {
    unsigned: Vec<u8>,
    key_name: String,
    algorithm: String,
    time_signed: u64,
    fudge: u16,
    mac: Vec<u8>,
    error: u16,
    other: Vec<u8>,
}

/// Shared-secret key used to sign update messages
#[derive(Clone)]
pub struct TsigKey {
    name: String,
    secret: Vec<u8>,
    algorithm: TsigAlgorithm,
    fudge: u16,
}

impl fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigKey")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TsigKey {
    pub fn new(name: &str, secret: Vec<u8>, algorithm: TsigAlgorithm) -> Result<TsigKey> {
        if secret.is_empty() {
            return Err(TsigError::InvalidSecret {
                reason: "secret is empty".to_string(),
            });
        }

        let name = canonical_name(name);
        if name.is_empty() {
            return Err(TsigError::InvalidSecret {
                reason: "key name is empty".to_string(),
            });
        }

        // Reject names that can not be encoded up front
        VectorPacketBuffer::new().write_qname(&name)?;

        Ok(TsigKey {
            name,
            secret,
            algorithm,
            fudge: DEFAULT_FUDGE,
        })
    }

    /// Builds a key from a base64 encoded secret as found in key files
    pub fn from_base64(name: &str, secret: &str, algorithm: TsigAlgorithm) -> Result<TsigKey> {
        let compact: String = secret.chars().filter(|c| !c.is_whitespace()).collect();
        let secret = base64::decode(&compact).map_err(|e| TsigError::InvalidSecret {
            reason: e.to_string(),
        })?;

        TsigKey::new(name, secret, algorithm)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> TsigAlgorithm {
        self.algorithm
    }

    /// Signs `unsigned`, a complete encoded message without TSIG record.
    ///
    /// `request_mac` is the MAC of the request when signing a response.
    /// Returns the signed message and its MAC.
    pub fn sign(
        &self,
        unsigned: &[u8],
        request_mac: Option<&[u8]>,
        time_signed: u64,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        if unsigned.len() < 12 {
            return Err(BufferError::EndOfBuffer.into());
        }

        let mut data = Vec::new();
        if let Some(request_mac) = request_mac {
            push_mac_prefix(&mut data, request_mac)?;
        }
        data.extend_from_slice(unsigned);
        data.extend_from_slice(&self.variables(
            self.algorithm.name(),
            time_signed,
            self.fudge,
            0,
            &[],
        )?);

        let mac = self.algorithm.digest(&self.secret, &data)?;

        let original_id = ((unsigned[0] as u16) << 8) | unsigned[1] as u16;
        let record = DnsRecord::Tsig {
            domain: self.name.clone(),
            algorithm: self.algorithm.name().to_string(),
            time_signed,
            fudge: self.fudge,
            mac: mac.clone(),
            original_id,
            error: 0,
            other: Vec::new(),
        };

        let mut buffer = VectorPacketBuffer::from_bytes(unsigned);
        buffer.seek(unsigned.len())?;
        record.write(&mut buffer)?;

        let arcount = ((unsigned[10] as u16) << 8 | unsigned[11] as u16) + 1;
        buffer.set_u16(10, arcount)?;

        Ok((buffer.into_bytes(), mac))
    }

    /// Authenticates a signed message and returns its MAC.
    ///
    /// `request_mac` is the MAC of the request when verifying a response,
    /// `now` the current time in seconds since the epoch.
    pub fn verify(&self, signed: &[u8], request_mac: Option<&[u8]>, now: u64) -> Result<Vec<u8>> {
        let parts = split_tsig(signed)?.ok_or(TsigError::Unsigned)?;

        if canonical_name(&parts.key_name) != self.name
            || TsigAlgorithm::from_name(&parts.algorithm) != Some(self.algorithm)
        {
            return Err(TsigError::BadKey);
        }

        if parts.error != 0 {
            return Err(TsigError::PeerError { code: parts.error });
        }

        let mut data = Vec::new();
        if let Some(request_mac) = request_mac {
            push_mac_prefix(&mut data, request_mac)?;
        }
        data.extend_from_slice(&parts.unsigned);
        data.extend_from_slice(&self.variables(
            &parts.algorithm,
            parts.time_signed,
            parts.fudge,
            parts.error,
            &parts.other,
        )?);

        self.algorithm.verify(&self.secret, &data, &parts.mac)?;

        let skew = if now > parts.time_signed {
            now - parts.time_signed
        } else {
            parts.time_signed - now
        };
        if skew > parts.fudge as u64 {
            return Err(TsigError::BadTime {
                time_signed: parts.time_signed,
            });
        }

        Ok(parts.mac)
    }

    /// TSIG variables in canonical form, appended to the message for the MAC
    fn variables(
        &self,
        algorithm: &str,
        time_signed: u64,
        fudge: u16,
        error: u16,
        other: &[u8],
    ) -> Result<Vec<u8>> {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_qname(&self.name)?;
        buffer.write_u16(DnsClass::Any.to_num())?;
        buffer.write_u32(0)?;
        buffer.write_qname(&canonical_name(algorithm))?;
        buffer.write_u48(time_signed)?;
        buffer.write_u16(fudge)?;
        buffer.write_u16(error)?;
        buffer.write_u16(other.len() as u16)?;
        buffer.write_bytes(other)?;

        Ok(buffer.into_bytes())
    }
}

fn canonical_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn push_mac_prefix(data: &mut Vec<u8>, mac: &[u8]) -> Result<()> {
    let mut buffer = VectorPacketBuffer::new();
    buffer.write_u16(mac.len() as u16)?;
    buffer.write_bytes(mac)?;
    data.extend_from_slice(&buffer.into_bytes());

    Ok(())
}

/// Separates the trailing TSIG record from `message`.
///
/// The unsigned form has the record removed, ARCOUNT decremented and the
/// message id restored to the original id.
fn split_tsig(message: &[u8]) -> Result<Option<SignedParts>> {
    let mut buffer = VectorPacketBuffer::from_bytes(message);

    let mut header = DnsPacket::new().header;
    header.read(&mut buffer)?;
    if header.resource_entries == 0 {
        return Ok(None);
    }

    for _ in 0..header.questions {
        let mut question = DnsQuestion::new(String::new(), QueryType::Unknown(0));
        question.read(&mut buffer)?;
    }

    let preceding = header.answers as usize
        + header.authoritative_entries as usize
        + header.resource_entries as usize
        - 1;
    for _ in 0..preceding {
        DnsRecord::read(&mut buffer)?;
    }

    let tsig_start = buffer.pos();
    let record = DnsRecord::read(&mut buffer)?;

    match record {
        DnsRecord::Tsig {
            domain,
            algorithm,
            time_signed,
            fudge,
            mac,
            original_id,
            error,
            other,
        } => {
            let mut unsigned = VectorPacketBuffer::from_bytes(&message[..tsig_start]);
            unsigned.set_u16(0, original_id)?;
            unsigned.set_u16(10, header.resource_entries - 1)?;

            Ok(Some(SignedParts {
                unsigned: unsigned.into_bytes(),
                key_name: domain,
                algorithm,
                time_signed,
                fudge,
                mac,
                error,
                other,
            }))
        }
        _ => Ok(None),
    }
}
