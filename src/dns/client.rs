//! client for sending DNS queries and update messages to other servers
//!
//! Every request uses its own short-lived socket: the number of messages per
//! challenge is small and the servers addressed change between calls.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, UdpSocket};
use std::time::{Duration, Instant};

use derive_more::{Display, Error, From};
use rand::random;

use crate::dns::netutil::{read_framed, write_framed};
use crate::dns::protocol::{DnsPacket, DnsQuestion, QueryType, OPCODE_QUERY};

#[derive(Debug, Display, From, Error)]
pub enum ClientError {
    Protocol(crate::dns::protocol::ProtocolError),
    Io(std::io::Error),
    TimeOut,
    #[display(fmt = "response id {} does not match request id {}", _0, _1)]
    MismatchedResponse(u16, u16),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::TimeOut)
    }
}

type Result<T> = std::result::Result<T, ClientError>;

/// Largest UDP response accepted; queries carry no EDNS so servers stay
/// well below this.
const UDP_RECEIVE_SIZE: usize = 4096;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub trait DnsClient {
    /// Sends an unsigned query for `qname`/`qtype` to `server` and returns
    /// the parsed response.
    fn send_query(
        &self,
        qname: &str,
        qtype: QueryType,
        server: SocketAddr,
        use_tcp: bool,
    ) -> Result<DnsPacket>;

    /// Sends an already encoded (and possibly signed) message over TCP and
    /// returns the raw response bytes, so the caller can authenticate them.
    fn send_tcp_message(&self, message: &[u8], server: SocketAddr) -> Result<Vec<u8>>;
}

/// Network backed client
#[derive(Clone, Debug)]
pub struct DnsNetworkClient {
    timeout: Duration,
}

impl Default for DnsNetworkClient {
    fn default() -> Self {
        DnsNetworkClient::new(DEFAULT_TIMEOUT)
    }
}

impl DnsNetworkClient {
    pub fn new(timeout: Duration) -> DnsNetworkClient {
        DnsNetworkClient { timeout }
    }

    fn build_query(qname: &str, qtype: QueryType) -> Result<(u16, Vec<u8>)> {
        let mut packet = DnsPacket::new();
        packet.header.id = random::<u16>();
        packet.header.opcode = OPCODE_QUERY;
        packet.header.recursion_desired = true;
        packet
            .questions
            .push(DnsQuestion::new(qname.to_string(), qtype));

        let bytes = packet.to_bytes()?;

        Ok((packet.header.id, bytes))
    }

    /// Send a DNS query using TCP transport
    pub fn send_tcp_query(
        &self,
        qname: &str,
        qtype: QueryType,
        server: SocketAddr,
    ) -> Result<DnsPacket> {
        let (id, request) = DnsNetworkClient::build_query(qname, qtype)?;

        let response = self.send_tcp_message(&request, server)?;
        let packet = DnsPacket::from_bytes(&response)?;
        if packet.header.id != id {
            return Err(ClientError::MismatchedResponse(packet.header.id, id));
        }

        Ok(packet)
    }

    /// Send a DNS query using UDP transport
    ///
    /// Datagrams that do not carry the expected id are discarded until the
    /// timeout expires.
    pub fn send_udp_query(
        &self,
        qname: &str,
        qtype: QueryType,
        server: SocketAddr,
    ) -> Result<DnsPacket> {
        let (id, request) = DnsNetworkClient::build_query(qname, qtype)?;

        let local: SocketAddr = match server.ip() {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(server)?;
        socket.send(&request).map_err(map_io_error)?;

        let deadline = Instant::now() + self.timeout;
        let mut res_buffer = [0u8; UDP_RECEIVE_SIZE];
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|d| *d > Duration::from_millis(0))
                .ok_or(ClientError::TimeOut)?;
            socket.set_read_timeout(Some(remaining))?;

            let len = socket.recv(&mut res_buffer).map_err(map_io_error)?;

            match DnsPacket::from_bytes(&res_buffer[..len]) {
                Ok(packet) if packet.header.id == id && packet.header.response => {
                    return Ok(packet)
                }
                Ok(packet) => {
                    log::debug!(
                        "Discarding response with id {} from {} while waiting for {}",
                        packet.header.id,
                        server,
                        id
                    );
                }
                Err(err) => {
                    log::debug!("Discarding unparsable datagram from {}: {}", server, err);
                }
            }
        }
    }
}

impl DnsClient for DnsNetworkClient {
    fn send_query(
        &self,
        qname: &str,
        qtype: QueryType,
        server: SocketAddr,
        use_tcp: bool,
    ) -> Result<DnsPacket> {
        if use_tcp {
            return self.send_tcp_query(qname, qtype, server);
        }

        let packet = self.send_udp_query(qname, qtype, server)?;
        if !packet.header.truncated_message {
            return Ok(packet);
        }

        log::debug!("Truncated response - resending as TCP");
        self.send_tcp_query(qname, qtype, server)
    }

    fn send_tcp_message(&self, message: &[u8], server: SocketAddr) -> Result<Vec<u8>> {
        let mut socket = TcpStream::connect_timeout(&server, self.timeout).map_err(map_io_error)?;
        socket.set_read_timeout(Some(self.timeout))?;
        socket.set_write_timeout(Some(self.timeout))?;

        write_framed(&mut socket, message).map_err(map_io_error)?;
        let response = read_framed(&mut socket).map_err(map_io_error)?;

        Ok(response)
    }
}

fn map_io_error(err: std::io::Error) -> ClientError {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => ClientError::TimeOut,
        _ => ClientError::Io(err),
    }
}

#[cfg(test)]
pub mod tests {

    use super::*;
    use crate::dns::netutil::{read_framed, write_framed};
    use crate::dns::protocol::{DnsRecord, ResultCode, TransientTtl};
    use std::net::TcpListener;
    use std::thread;

    pub type StubCallback = dyn Fn(&str, QueryType, SocketAddr, bool) -> Result<DnsPacket> + Send + Sync;
    pub type StubUpdateCallback = dyn Fn(&[u8], SocketAddr) -> Result<Vec<u8>> + Send + Sync;

    /// Client answering from closures instead of the network
    pub struct DnsStubClient {
        callback: Box<StubCallback>,
        update_callback: Box<StubUpdateCallback>,
    }

    impl DnsStubClient {
        pub fn new(callback: Box<StubCallback>) -> DnsStubClient {
            DnsStubClient {
                callback,
                update_callback: Box::new(|_, _| Err(ClientError::TimeOut)),
            }
        }

        pub fn with_updates(
            callback: Box<StubCallback>,
            update_callback: Box<StubUpdateCallback>,
        ) -> DnsStubClient {
            DnsStubClient {
                callback,
                update_callback,
            }
        }
    }

    impl DnsClient for DnsStubClient {
        fn send_query(
            &self,
            qname: &str,
            qtype: QueryType,
            server: SocketAddr,
            use_tcp: bool,
        ) -> Result<DnsPacket> {
            (self.callback)(qname, qtype, server, use_tcp)
        }

        fn send_tcp_message(&self, message: &[u8], server: SocketAddr) -> Result<Vec<u8>> {
            (self.update_callback)(message, server)
        }
    }

    fn answer(request: &[u8]) -> Vec<u8> {
        let query = DnsPacket::from_bytes(request).unwrap();

        let mut packet = DnsPacket::new();
        packet.header.id = query.header.id;
        packet.header.response = true;
        packet.header.rescode = ResultCode::NOERROR;
        packet.questions = query.questions.clone();
        packet.answers.push(DnsRecord::A {
            domain: query.questions[0].name.clone(),
            addr: "192.0.2.10".parse().unwrap(),
            ttl: TransientTtl(300),
        });

        packet.to_bytes().unwrap()
    }

    #[test]
    pub fn test_udp_client() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        thread::spawn(move || {
            let mut buf = [0u8; 512];
            let (len, peer) = server.recv_from(&mut buf).unwrap();

            // A stray datagram first, which the client has to ignore
            let mut stray = DnsPacket::from_bytes(&buf[..len]).unwrap();
            stray.header.id = stray.header.id.wrapping_add(1);
            stray.header.response = true;
            server.send_to(&stray.to_bytes().unwrap(), peer).unwrap();

            server.send_to(&answer(&buf[..len]), peer).unwrap();
        });

        let client = DnsNetworkClient::new(Duration::from_secs(2));
        let res = client
            .send_query("example.com", QueryType::A, addr, false)
            .unwrap();

        assert_eq!(res.questions[0].name, "example.com");
        match res.answers[0] {
            DnsRecord::A { ref domain, addr, .. } => {
                assert_eq!("example.com", domain);
                assert_eq!("192.0.2.10".parse::<Ipv4Addr>().unwrap(), addr);
            }
            _ => panic!(),
        }
    }

    #[test]
    pub fn test_tcp_client() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_framed(&mut stream).unwrap();
            write_framed(&mut stream, &answer(&request)).unwrap();
        });

        let client = DnsNetworkClient::new(Duration::from_secs(2));
        let res = client
            .send_query("example.com", QueryType::A, addr, true)
            .unwrap();

        assert_eq!(1, res.answers.len());
    }

    #[test]
    pub fn test_udp_timeout() {
        // Bound but never answering
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        let client = DnsNetworkClient::new(Duration::from_millis(200));
        match client.send_query("example.com", QueryType::Soa, addr, false) {
            Err(err) => assert!(err.is_timeout(), "unexpected error {}", err),
            Ok(_) => panic!("expected a timeout"),
        }

        drop(server);
    }
}
