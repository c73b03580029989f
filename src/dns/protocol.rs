//! implements the subset of the DNS protocol needed for SOA/TXT lookups and
//! dynamic updates, in a transport agnostic fashion

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{Ipv4Addr, Ipv6Addr};

use derive_more::{Display, Error, From};

use crate::dns::buffer::{PacketBuffer, VectorPacketBuffer};

#[derive(Debug, Display, From, Error)]
pub enum ProtocolError {
    Buffer(crate::dns::buffer::BufferError),
    Io(std::io::Error),
}

type Result<T> = std::result::Result<T, ProtocolError>;

/// Maximum size of a single TXT character-string
const MAX_CHARACTER_STRING: usize = 255;

/// `QueryType` represents the requested Record Type of a query
///
/// The specific type Unknown that an integer parameter in order to retain the
/// id of an unknown query when compiling the reply. An integer can be converted
/// to a querytype using the `from_num` function, and back to an integer using
/// the `to_num` method.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy)]
pub enum QueryType {
    Unknown(u16),
    A,     // 1
    Ns,    // 2
    Cname, // 5
    Soa,   // 6
    Txt,   // 16
    Aaaa,  // 28
    Opt,   // 41
    Tsig,  // 250
    Any,   // 255
}

impl QueryType {
    pub fn to_num(&self) -> u16 {
        match *self {
            QueryType::Unknown(x) => x,
            QueryType::A => 1,
            QueryType::Ns => 2,
            QueryType::Cname => 5,
            QueryType::Soa => 6,
            QueryType::Txt => 16,
            QueryType::Aaaa => 28,
            QueryType::Opt => 41,
            QueryType::Tsig => 250,
            QueryType::Any => 255,
        }
    }

    pub fn from_num(num: u16) -> QueryType {
        match num {
            1 => QueryType::A,
            2 => QueryType::Ns,
            5 => QueryType::Cname,
            6 => QueryType::Soa,
            16 => QueryType::Txt,
            28 => QueryType::Aaaa,
            41 => QueryType::Opt,
            250 => QueryType::Tsig,
            255 => QueryType::Any,
            _ => QueryType::Unknown(num),
        }
    }
}

/// Record class. Updates use NONE to delete a specific record and TSIG
/// records always travel as ANY.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Copy)]
pub enum DnsClass {
    In,
    None,
    Any,
    Unknown(u16),
}

impl DnsClass {
    pub fn to_num(&self) -> u16 {
        match *self {
            DnsClass::In => 1,
            DnsClass::None => 254,
            DnsClass::Any => 255,
            DnsClass::Unknown(x) => x,
        }
    }

    pub fn from_num(num: u16) -> DnsClass {
        match num {
            1 => DnsClass::In,
            254 => DnsClass::None,
            255 => DnsClass::Any,
            _ => DnsClass::Unknown(num),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq)]
pub struct TransientTtl(pub u32);

impl PartialEq<TransientTtl> for TransientTtl {
    fn eq(&self, _: &TransientTtl) -> bool {
        true
    }
}

impl PartialOrd<TransientTtl> for TransientTtl {
    fn partial_cmp(&self, other: &TransientTtl) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransientTtl {
    fn cmp(&self, _: &TransientTtl) -> Ordering {
        Ordering::Equal
    }
}

impl Hash for TransientTtl {
    fn hash<H>(&self, _: &mut H)
    where
        H: Hasher,
    {
        // purposely left empty
    }
}

/// `DnsRecord` is the primary representation of a DNS record
///
/// The same enumeration is used for records read from responses and for the
/// records placed in the update section of an UPDATE message. Equality
/// ignores the TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DnsRecord {
    Unknown {
        domain: String,
        qtype: u16,
        data_len: u16,
        ttl: TransientTtl,
    }, // 0
    A {
        domain: String,
        addr: Ipv4Addr,
        ttl: TransientTtl,
    }, // 1
    Ns {
        domain: String,
        host: String,
        ttl: TransientTtl,
    }, // 2
    Cname {
        domain: String,
        host: String,
        ttl: TransientTtl,
    }, // 5
    Soa {
        domain: String,
        m_name: String,
        r_name: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
        ttl: TransientTtl,
    }, // 6
    Txt {
        domain: String,
        data: Vec<String>,
        ttl: TransientTtl,
    }, // 16
    Aaaa {
        domain: String,
        addr: Ipv6Addr,
        ttl: TransientTtl,
    }, // 28
    Tsig {
        domain: String,
        algorithm: String,
        time_signed: u64,
        fudge: u16,
        mac: Vec<u8>,
        original_id: u16,
        error: u16,
        other: Vec<u8>,
    }, // 250
}

impl DnsRecord {
    /// Builds a TXT record holding a single logical value
    pub fn txt(domain: &str, value: &str, ttl: u32) -> DnsRecord {
        DnsRecord::Txt {
            domain: domain.to_string(),
            data: vec![value.to_string()],
            ttl: TransientTtl(ttl),
        }
    }

    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<DnsRecord> {
        let (record, _) = DnsRecord::read_with_class(buffer)?;

        Ok(record)
    }

    /// Reads a record and also returns its class, which carries the
    /// operation for records in the update section of an UPDATE message.
    pub fn read_with_class<T: PacketBuffer>(buffer: &mut T) -> Result<(DnsRecord, DnsClass)> {
        let mut domain = String::new();
        buffer.read_qname(&mut domain)?;

        let qtype_num = buffer.read_u16()?;
        let qtype = QueryType::from_num(qtype_num);
        let class = DnsClass::from_num(buffer.read_u16()?);
        let ttl = buffer.read_u32()?;
        let data_len = buffer.read_u16()?;

        let data_start = buffer.pos();

        let record = match qtype {
            QueryType::A if data_len == 4 => {
                let raw_addr = buffer.read_u32()?;
                DnsRecord::A {
                    domain,
                    addr: Ipv4Addr::from(raw_addr),
                    ttl: TransientTtl(ttl),
                }
            }
            QueryType::Aaaa if data_len == 16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buffer.read_bytes(16)?);
                DnsRecord::Aaaa {
                    domain,
                    addr: Ipv6Addr::from(octets),
                    ttl: TransientTtl(ttl),
                }
            }
            QueryType::Ns => {
                let mut ns = String::new();
                buffer.read_qname(&mut ns)?;

                DnsRecord::Ns {
                    domain,
                    host: ns,
                    ttl: TransientTtl(ttl),
                }
            }
            QueryType::Cname => {
                let mut cname = String::new();
                buffer.read_qname(&mut cname)?;

                DnsRecord::Cname {
                    domain,
                    host: cname,
                    ttl: TransientTtl(ttl),
                }
            }
            QueryType::Soa if data_len > 0 => {
                let mut m_name = String::new();
                buffer.read_qname(&mut m_name)?;

                let mut r_name = String::new();
                buffer.read_qname(&mut r_name)?;

                let serial = buffer.read_u32()?;
                let refresh = buffer.read_u32()?;
                let retry = buffer.read_u32()?;
                let expire = buffer.read_u32()?;
                let minimum = buffer.read_u32()?;

                DnsRecord::Soa {
                    domain,
                    m_name,
                    r_name,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                    ttl: TransientTtl(ttl),
                }
            }
            QueryType::Txt => {
                let mut data = Vec::new();

                let end = data_start + data_len as usize;
                while buffer.pos() < end {
                    let len = buffer.read()? as usize;
                    let chunk = buffer.read_bytes(len)?;
                    data.push(String::from_utf8_lossy(&chunk).into_owned());
                }

                DnsRecord::Txt {
                    domain,
                    data,
                    ttl: TransientTtl(ttl),
                }
            }
            QueryType::Tsig if data_len > 0 => {
                let mut algorithm = String::new();
                buffer.read_qname(&mut algorithm)?;

                let time_signed = buffer.read_u48()?;
                let fudge = buffer.read_u16()?;
                let mac_len = buffer.read_u16()? as usize;
                let mac = buffer.read_bytes(mac_len)?;
                let original_id = buffer.read_u16()?;
                let error = buffer.read_u16()?;
                let other_len = buffer.read_u16()? as usize;
                let other = buffer.read_bytes(other_len)?;

                DnsRecord::Tsig {
                    domain,
                    algorithm,
                    time_signed,
                    fudge,
                    mac,
                    original_id,
                    error,
                    other,
                }
            }
            _ => {
                buffer.step(data_len as usize)?;

                DnsRecord::Unknown {
                    domain,
                    qtype: qtype_num,
                    data_len,
                    ttl: TransientTtl(ttl),
                }
            }
        };

        // Keep the buffer aligned with rdlength even if the rdata carried
        // trailing bytes we did not interpret.
        buffer.seek(data_start + data_len as usize)?;

        Ok((record, class))
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<usize> {
        let class = match *self {
            DnsRecord::Tsig { .. } => DnsClass::Any,
            _ => DnsClass::In,
        };

        self.write_in_class(buffer, class)
    }

    /// Writes the record with an explicit class. Records written with class
    /// NONE get a zero TTL, as required for deletions in the update section.
    pub fn write_in_class<T: PacketBuffer>(&self, buffer: &mut T, class: DnsClass) -> Result<usize> {
        let start_pos = buffer.pos();

        let ttl = match class {
            DnsClass::None => 0,
            _ => self.get_ttl(),
        };

        match *self {
            DnsRecord::A {
                ref domain,
                ref addr,
                ..
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::A.to_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(ttl)?;
                buffer.write_u16(4)?;

                buffer.write_bytes(&addr.octets())?;
            }
            DnsRecord::Aaaa {
                ref domain,
                ref addr,
                ..
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::Aaaa.to_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(ttl)?;
                buffer.write_u16(16)?;

                buffer.write_bytes(&addr.octets())?;
            }
            DnsRecord::Ns {
                ref domain,
                ref host,
                ..
            }
            | DnsRecord::Cname {
                ref domain,
                ref host,
                ..
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(self.get_querytype().to_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_qname(host)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            DnsRecord::Soa {
                ref domain,
                ref m_name,
                ref r_name,
                serial,
                refresh,
                retry,
                expire,
                minimum,
                ..
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::Soa.to_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_qname(m_name)?;
                buffer.write_qname(r_name)?;
                buffer.write_u32(serial)?;
                buffer.write_u32(refresh)?;
                buffer.write_u32(retry)?;
                buffer.write_u32(expire)?;
                buffer.write_u32(minimum)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            DnsRecord::Txt {
                ref domain,
                ref data,
                ..
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::Txt.to_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;

                for value in data {
                    let bytes = value.as_bytes();
                    if bytes.is_empty() {
                        buffer.write_u8(0)?;
                    }
                    for chunk in bytes.chunks(MAX_CHARACTER_STRING) {
                        buffer.write_u8(chunk.len() as u8)?;
                        buffer.write_bytes(chunk)?;
                    }
                }

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            DnsRecord::Tsig {
                ref domain,
                ref algorithm,
                time_signed,
                fudge,
                ref mac,
                original_id,
                error,
                ref other,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(QueryType::Tsig.to_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(0)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;

                buffer.write_qname(algorithm)?;
                buffer.write_u48(time_signed)?;
                buffer.write_u16(fudge)?;
                buffer.write_u16(mac.len() as u16)?;
                buffer.write_bytes(mac)?;
                buffer.write_u16(original_id)?;
                buffer.write_u16(error)?;
                buffer.write_u16(other.len() as u16)?;
                buffer.write_bytes(other)?;

                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            DnsRecord::Unknown { .. } => {
                log::info!("Skipping record: {:?}", self);
            }
        }

        Ok(buffer.pos() - start_pos)
    }

    pub fn get_querytype(&self) -> QueryType {
        match *self {
            DnsRecord::A { .. } => QueryType::A,
            DnsRecord::Aaaa { .. } => QueryType::Aaaa,
            DnsRecord::Ns { .. } => QueryType::Ns,
            DnsRecord::Cname { .. } => QueryType::Cname,
            DnsRecord::Unknown { qtype, .. } => QueryType::Unknown(qtype),
            DnsRecord::Soa { .. } => QueryType::Soa,
            DnsRecord::Txt { .. } => QueryType::Txt,
            DnsRecord::Tsig { .. } => QueryType::Tsig,
        }
    }

    pub fn get_domain(&self) -> &str {
        match *self {
            DnsRecord::A { ref domain, .. }
            | DnsRecord::Aaaa { ref domain, .. }
            | DnsRecord::Ns { ref domain, .. }
            | DnsRecord::Cname { ref domain, .. }
            | DnsRecord::Unknown { ref domain, .. }
            | DnsRecord::Soa { ref domain, .. }
            | DnsRecord::Txt { ref domain, .. }
            | DnsRecord::Tsig { ref domain, .. } => domain,
        }
    }

    pub fn get_ttl(&self) -> u32 {
        match *self {
            DnsRecord::A {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Aaaa {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Ns {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Cname {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Unknown {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Soa {
                ttl: TransientTtl(ttl),
                ..
            }
            | DnsRecord::Txt {
                ttl: TransientTtl(ttl),
                ..
            } => ttl,
            DnsRecord::Tsig { .. } => 0,
        }
    }

    /// Concatenated character-strings of a TXT record
    pub fn txt_value(&self) -> Option<String> {
        match *self {
            DnsRecord::Txt { ref data, .. } => Some(data.concat()),
            _ => None,
        }
    }
}

/// The result code for a DNS query or update, as described in RFC 1035 and
/// RFC 2136
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResultCode {
    NOERROR,
    FORMERR,
    SERVFAIL,
    NXDOMAIN,
    NOTIMP,
    REFUSED,
    YXDOMAIN,
    YXRRSET,
    NXRRSET,
    NOTAUTH,
    NOTZONE,
    Unknown(u8),
}

impl Default for ResultCode {
    fn default() -> Self {
        ResultCode::NOERROR
    }
}

impl ResultCode {
    pub fn from_num(num: u8) -> ResultCode {
        match num {
            0 => ResultCode::NOERROR,
            1 => ResultCode::FORMERR,
            2 => ResultCode::SERVFAIL,
            3 => ResultCode::NXDOMAIN,
            4 => ResultCode::NOTIMP,
            5 => ResultCode::REFUSED,
            6 => ResultCode::YXDOMAIN,
            7 => ResultCode::YXRRSET,
            8 => ResultCode::NXRRSET,
            9 => ResultCode::NOTAUTH,
            10 => ResultCode::NOTZONE,
            _ => ResultCode::Unknown(num),
        }
    }

    pub fn to_num(&self) -> u8 {
        match *self {
            ResultCode::NOERROR => 0,
            ResultCode::FORMERR => 1,
            ResultCode::SERVFAIL => 2,
            ResultCode::NXDOMAIN => 3,
            ResultCode::NOTIMP => 4,
            ResultCode::REFUSED => 5,
            ResultCode::YXDOMAIN => 6,
            ResultCode::YXRRSET => 7,
            ResultCode::NXRRSET => 8,
            ResultCode::NOTAUTH => 9,
            ResultCode::NOTZONE => 10,
            ResultCode::Unknown(x) => x,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ResultCode::Unknown(x) => write!(f, "RCODE{}", x),
            code => write!(f, "{:?}", code),
        }
    }
}

pub const OPCODE_QUERY: u8 = 0;
pub const OPCODE_UPDATE: u8 = 5;

/// Representation of a DNS header
#[derive(Clone, Debug, Default)]
pub struct DnsHeader {
    pub id: u16, // 16 bits

    pub recursion_desired: bool,    // 1 bit
    pub truncated_message: bool,    // 1 bit
    pub authoritative_answer: bool, // 1 bit
    pub opcode: u8,                 // 4 bits
    pub response: bool,             // 1 bit

    pub rescode: ResultCode,       // 4 bits
    pub checking_disabled: bool,   // 1 bit
    pub authed_data: bool,         // 1 bit
    pub z: bool,                   // 1 bit
    pub recursion_available: bool, // 1 bit

    pub questions: u16,             // 16 bits
    pub answers: u16,               // 16 bits
    pub authoritative_entries: u16, // 16 bits
    pub resource_entries: u16,      // 16 bits
}

impl DnsHeader {
    pub fn new() -> DnsHeader {
        DnsHeader::default()
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_u16(self.id)?;

        buffer.write_u8(
            (self.recursion_desired as u8)
                | ((self.truncated_message as u8) << 1)
                | ((self.authoritative_answer as u8) << 2)
                | ((self.opcode & 0x0F) << 3)
                | ((self.response as u8) << 7),
        )?;

        buffer.write_u8(
            (self.rescode.to_num() & 0x0F)
                | ((self.checking_disabled as u8) << 4)
                | ((self.authed_data as u8) << 5)
                | ((self.z as u8) << 6)
                | ((self.recursion_available as u8) << 7),
        )?;

        buffer.write_u16(self.questions)?;
        buffer.write_u16(self.answers)?;
        buffer.write_u16(self.authoritative_entries)?;
        buffer.write_u16(self.resource_entries)?;

        Ok(())
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        self.id = buffer.read_u16()?;

        let flags = buffer.read_u16()?;
        let a = (flags >> 8) as u8;
        let b = (flags & 0xFF) as u8;
        self.recursion_desired = (a & (1 << 0)) > 0;
        self.truncated_message = (a & (1 << 1)) > 0;
        self.authoritative_answer = (a & (1 << 2)) > 0;
        self.opcode = (a >> 3) & 0x0F;
        self.response = (a & (1 << 7)) > 0;

        self.rescode = ResultCode::from_num(b & 0x0F);
        self.checking_disabled = (b & (1 << 4)) > 0;
        self.authed_data = (b & (1 << 5)) > 0;
        self.z = (b & (1 << 6)) > 0;
        self.recursion_available = (b & (1 << 7)) > 0;

        self.questions = buffer.read_u16()?;
        self.answers = buffer.read_u16()?;
        self.authoritative_entries = buffer.read_u16()?;
        self.resource_entries = buffer.read_u16()?;

        Ok(())
    }
}

/// Representation of a DNS question, which doubles as the zone section of
/// an UPDATE message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: QueryType,
}

impl DnsQuestion {
    pub fn new(name: String, qtype: QueryType) -> DnsQuestion {
        DnsQuestion { name, qtype }
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_qname(&self.name)?;

        let typenum = self.qtype.to_num();
        buffer.write_u16(typenum)?;
        buffer.write_u16(DnsClass::In.to_num())?;

        Ok(())
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        buffer.read_qname(&mut self.name)?;
        self.qtype = QueryType::from_num(buffer.read_u16()?); // qtype
        let _ = buffer.read_u16()?; // class

        Ok(())
    }
}

/// Representation of a complete DNS packet
///
/// For UPDATE messages the sections are the zone, prerequisite, update and
/// additional sections respectively.
#[derive(Clone, Debug, Default)]
pub struct DnsPacket {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub resources: Vec<DnsRecord>,
}

impl DnsPacket {
    pub fn new() -> DnsPacket {
        DnsPacket::default()
    }

    pub fn from_buffer<T: PacketBuffer>(buffer: &mut T) -> Result<DnsPacket> {
        let mut result = DnsPacket::new();
        result.header.read(buffer)?;

        for _ in 0..result.header.questions {
            let mut question = DnsQuestion::new("".to_string(), QueryType::Unknown(0));
            question.read(buffer)?;
            result.questions.push(question);
        }

        for _ in 0..result.header.answers {
            let rec = DnsRecord::read(buffer)?;
            result.answers.push(rec);
        }
        for _ in 0..result.header.authoritative_entries {
            let rec = DnsRecord::read(buffer)?;
            result.authorities.push(rec);
        }
        for _ in 0..result.header.resource_entries {
            let rec = DnsRecord::read(buffer)?;
            result.resources.push(rec);
        }

        Ok(result)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<DnsPacket> {
        let mut buffer = VectorPacketBuffer::from_bytes(bytes);
        DnsPacket::from_buffer(&mut buffer)
    }

    /// Writes the packet, taking the section counts from the section vectors
    pub fn write<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        self.header.questions = self.questions.len() as u16;
        self.header.answers = self.answers.len() as u16;
        self.header.authoritative_entries = self.authorities.len() as u16;
        self.header.resource_entries = self.resources.len() as u16;

        self.header.write(buffer)?;

        for question in &self.questions {
            question.write(buffer)?;
        }

        for rec in self
            .answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.resources.iter())
        {
            rec.write(buffer)?;
        }

        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = VectorPacketBuffer::new();
        self.write(&mut buffer)?;

        Ok(buffer.into_bytes())
    }

    /// Primary server name of the first SOA record in the answer section
    pub fn get_soa_mname(&self) -> Option<&str> {
        self.answers.iter().find_map(|answer| match *answer {
            DnsRecord::Soa { ref m_name, .. } => Some(m_name.as_str()),
            _ => None,
        })
    }

    /// Values of all TXT records in the answer section
    pub fn get_txt_values(&self) -> Vec<String> {
        self.answers
            .iter()
            .filter_map(|answer| answer.txt_value())
            .collect()
    }

    /// The TSIG record, which is only valid as the last additional record
    pub fn get_tsig(&self) -> Option<&DnsRecord> {
        match self.resources.last() {
            Some(rec @ DnsRecord::Tsig { .. }) => Some(rec),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dns::buffer::{PacketBuffer, VectorPacketBuffer};

    #[test]
    fn test_packet() {
        let mut packet = DnsPacket::new();
        packet.header.id = 1337;
        packet.header.response = true;
        packet.header.rescode = ResultCode::NOERROR;

        packet
            .questions
            .push(DnsQuestion::new("example.com".to_string(), QueryType::Soa));
        packet.answers.push(DnsRecord::Soa {
            domain: "example.com".to_string(),
            m_name: "ns1.example.com".to_string(),
            r_name: "hostmaster.example.com".to_string(),
            serial: 2019010101,
            refresh: 3600,
            retry: 600,
            expire: 86400,
            minimum: 300,
            ttl: TransientTtl(3600),
        });
        packet.answers.push(DnsRecord::txt(
            "_acme-challenge.example.com",
            "Xn3oYYbGzrNk0JpGTwPU8jd7Y3d1HUvwh5U7IaB-WQk",
            60,
        ));
        packet.resources.push(DnsRecord::Aaaa {
            domain: "ns1.example.com".to_string(),
            addr: "2001:db8::53".parse().unwrap(),
            ttl: TransientTtl(3600),
        });

        let mut buffer = VectorPacketBuffer::new();
        packet.write(&mut buffer).unwrap();

        buffer.seek(0).unwrap();

        let parsed_packet = DnsPacket::from_buffer(&mut buffer).unwrap();

        assert_eq!(1337, parsed_packet.header.id);
        assert!(parsed_packet.header.response);
        assert_eq!(packet.questions[0], parsed_packet.questions[0]);
        assert_eq!(packet.answers, parsed_packet.answers);
        assert_eq!(packet.resources, parsed_packet.resources);
        assert_eq!(Some("ns1.example.com"), parsed_packet.get_soa_mname());
        assert_eq!(
            vec!["Xn3oYYbGzrNk0JpGTwPU8jd7Y3d1HUvwh5U7IaB-WQk".to_string()],
            parsed_packet.get_txt_values()
        );
    }

    #[test]
    fn test_long_txt_is_split_into_character_strings() {
        let value = "x".repeat(300);
        let record = DnsRecord::txt("long.example.com", &value, 60);

        let mut buffer = VectorPacketBuffer::new();
        record.write(&mut buffer).unwrap();

        buffer.seek(0).unwrap();
        match DnsRecord::read(&mut buffer).unwrap() {
            DnsRecord::Txt { data, .. } => {
                assert_eq!(2, data.len());
                assert_eq!(255, data[0].len());
                assert_eq!(45, data[1].len());
                assert_eq!(value, data.concat());
            }
            other => panic!("expected TXT record, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_record_uses_class_none_and_zero_ttl() {
        let record = DnsRecord::txt("_acme-challenge.example.com", "token", 60);

        let mut buffer = VectorPacketBuffer::new();
        record.write_in_class(&mut buffer, DnsClass::None).unwrap();

        buffer.seek(0).unwrap();
        let mut name = String::new();
        buffer.read_qname(&mut name).unwrap();
        assert_eq!(16, buffer.read_u16().unwrap());
        assert_eq!(254, buffer.read_u16().unwrap());
        assert_eq!(0, buffer.read_u32().unwrap());

        buffer.seek(0).unwrap();
        let (parsed, class) = DnsRecord::read_with_class(&mut buffer).unwrap();
        assert_eq!(DnsClass::None, class);
        assert_eq!(record, parsed);
    }

    #[test]
    fn test_unknown_record_is_skipped() {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_qname("example.com").unwrap();
        buffer.write_u16(99).unwrap();
        buffer.write_u16(1).unwrap();
        buffer.write_u32(300).unwrap();
        buffer.write_u16(3).unwrap();
        buffer.write_bytes(&[1, 2, 3]).unwrap();
        buffer.write_u8(0xFF).unwrap();

        buffer.seek(0).unwrap();
        let record = DnsRecord::read(&mut buffer).unwrap();
        assert_eq!(QueryType::Unknown(99), record.get_querytype());
        assert_eq!(0xFF, buffer.read().unwrap());
    }

    #[test]
    fn test_update_rcodes() {
        assert_eq!(ResultCode::NOTAUTH, ResultCode::from_num(9));
        assert_eq!(ResultCode::Unknown(12), ResultCode::from_num(12));
        assert_eq!("NOTZONE", ResultCode::NOTZONE.to_string());
        assert_eq!("RCODE12", ResultCode::Unknown(12).to_string());
    }
}
