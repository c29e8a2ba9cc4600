use crate::dns::constants::{DNSRcode, MAX_UDP_PAYLOAD};
use crate::dns::DNSPacket;
use crate::dynamic_update::tsig::{TsigError, TsigSigner};
use crate::error::{Result, Rfc2136Error};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Transport used to reach the nameserver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// UDP, retried over TCP when the reply is truncated
    #[default]
    Udp,
    Tcp,
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            other => Err(other.to_string()),
        }
    }
}

/// A parsed reply together with the bytes it was parsed from
#[derive(Debug, Clone)]
pub struct Reply {
    pub packet: DNSPacket,
    pub wire: Vec<u8>,
}

/// One request, one reply
#[async_trait]
pub trait Exchanger: Send + Sync {
    async fn exchange(&self, request: &DNSPacket, server: &str) -> Result<Reply>;
}

/// Network exchanger over UDP/TCP.
///
/// Identical unsigned requests to the same server that are in flight at the
/// same time share one network exchange.
#[derive(Debug, Clone)]
pub struct DnsTransport {
    protocol: Protocol,
    timeout: Duration,
    /// In-flight requests (server + request without ID -> broadcast channel)
    in_flight: Arc<DashMap<Vec<u8>, broadcast::Sender<Result<Reply>>>>,
}

impl DnsTransport {
    pub fn new(protocol: Protocol, timeout: Duration) -> Self {
        Self {
            protocol,
            timeout,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Number of distinct requests currently on the wire
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Perform the exchange without coalescing
    async fn exchange_once(&self, request: &DNSPacket, server: &str) -> Result<Reply> {
        let query_bytes = request.serialize()?;
        let server_addr = resolve(server).await?;

        trace!(
            "Sending {} bytes to {} ({})",
            query_bytes.len(),
            server,
            server_addr
        );

        let exchange = async {
            match self.protocol {
                Protocol::Udp => {
                    let reply = self.send_udp_query(&query_bytes, server_addr).await?;
                    if reply.packet.header.tc {
                        debug!("UDP response truncated, retrying with TCP");
                        self.send_tcp_query(&query_bytes, server_addr).await
                    } else {
                        Ok(reply)
                    }
                }
                Protocol::Tcp => self.send_tcp_query(&query_bytes, server_addr).await,
            }
        };

        let reply = timeout(self.timeout, exchange).await.map_err(|_| {
            Rfc2136Error::NetworkFailure(format!(
                "exchange with {} timed out after {:?}",
                server, self.timeout
            ))
        })??;

        if reply.packet.header.id != request.header.id {
            return Err(Rfc2136Error::NetworkFailure(format!(
                "reply id {} does not match request id {}",
                reply.packet.header.id, request.header.id
            )));
        }
        Ok(reply)
    }

    /// Send query via UDP
    async fn send_udp_query(&self, query_bytes: &[u8], server_addr: SocketAddr) -> Result<Reply> {
        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server_addr).await?;
        socket.send(query_bytes).await?;

        let mut response_buf = vec![0u8; MAX_UDP_PAYLOAD];
        let response_len = socket.recv(&mut response_buf).await?;
        response_buf.truncate(response_len);

        parse_reply(response_buf, server_addr, "UDP")
    }

    /// Send query via TCP with the two-byte length prefix
    async fn send_tcp_query(&self, query_bytes: &[u8], server_addr: SocketAddr) -> Result<Reply> {
        let mut stream = TcpStream::connect(server_addr).await?;

        let query_length = u16::try_from(query_bytes.len())
            .map_err(|_| Rfc2136Error::Codec("message too large for TCP".to_string()))?;
        stream.write_all(&query_length.to_be_bytes()).await?;
        stream.write_all(query_bytes).await?;
        stream.flush().await?;

        let mut length_buf = [0u8; 2];
        stream.read_exact(&mut length_buf).await?;
        let response_length = u16::from_be_bytes(length_buf) as usize;

        let mut response_buf = vec![0; response_length];
        stream.read_exact(&mut response_buf).await?;

        parse_reply(response_buf, server_addr, "TCP")
    }
}

#[async_trait]
impl Exchanger for DnsTransport {
    async fn exchange(&self, request: &DNSPacket, server: &str) -> Result<Reply> {
        let Some(key) = coalesce_key(request, server) else {
            return self.exchange_once(request, server).await;
        };

        let (sender, _receiver) = broadcast::channel(16);
        let waiter = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => Some(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                entry.insert(sender.clone());
                None
            }
        };

        match waiter {
            None => {
                let guard = InFlightGuard {
                    in_flight: &self.in_flight,
                    key,
                };
                let result = self.exchange_once(request, server).await;
                drop(guard);
                if sender.receiver_count() > 1 {
                    debug!(
                        "Request coalescing: sharing reply with {} waiting requests",
                        sender.receiver_count() - 1
                    );
                }
                let _ = sender.send(result.clone());
                result
            }
            Some(mut receiver) => {
                debug!("Request coalescing: joining in-flight request to {}", server);
                let shared = timeout(self.timeout, receiver.recv()).await.map_err(|_| {
                    Rfc2136Error::NetworkFailure(format!(
                        "shared exchange with {} timed out after {:?}",
                        server, self.timeout
                    ))
                })?;
                match shared {
                    Ok(result) => result.map(|mut reply| {
                        reply.packet.header.id = request.header.id;
                        reply
                    }),
                    Err(_) => {
                        debug!("Request coalescing: channel closed, sending on our own");
                        self.exchange_once(request, server).await
                    }
                }
            }
        }
    }
}

/// Removes a leader's in-flight entry when its exchange ends or is dropped.
///
/// Dropping the entry's sender closes the channel, so waiters stop waiting on
/// a leader that was cancelled.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<Vec<u8>, broadcast::Sender<Result<Reply>>>,
    key: Vec<u8>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// Coalescing key: the server plus the request with its ID zeroed.
///
/// Signed requests are never coalesced; a shared reply could only be
/// authenticated against one of the request MACs.
fn coalesce_key(request: &DNSPacket, server: &str) -> Option<Vec<u8>> {
    if request.tsig().is_some() {
        return None;
    }
    let mut anonymous = request.clone();
    anonymous.header.id = 0;
    let mut key = server.as_bytes().to_vec();
    key.push(0);
    key.extend(anonymous.serialize().ok()?);
    Some(key)
}

async fn resolve(server: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(server)
        .await
        .map_err(|e| Rfc2136Error::NetworkFailure(format!("cannot resolve {}: {}", server, e)))?
        .next()
        .ok_or_else(|| Rfc2136Error::NetworkFailure(format!("no address for {}", server)))
}

fn parse_reply(wire: Vec<u8>, server_addr: SocketAddr, protocol: &str) -> Result<Reply> {
    trace!(
        "Raw {} response data ({} bytes): {:02x?}",
        protocol,
        wire.len(),
        &wire[..wire.len().min(64)]
    );
    let packet = DNSPacket::parse(&wire).map_err(|e| {
        debug!("Failed to parse {} response from {}: {}", protocol, server_addr, e);
        Rfc2136Error::Codec(format!("failed to parse reply: {}", e))
    })?;
    debug!(
        "Parsed {} response: rcode={}, answers={}, additional={}",
        protocol,
        DNSRcode::name(packet.rcode()),
        packet.answers.len(),
        packet.resources.len()
    );
    Ok(Reply { packet, wire })
}

/// Fail replies whose RCODE is not NOERROR
pub fn classify_reply(reply: &DNSPacket) -> Result<()> {
    match reply.rcode() {
        DNSRcode::NOERROR => Ok(()),
        rcode => Err(Rfc2136Error::ServerRejected {
            rcode: DNSRcode::name(rcode),
        }),
    }
}

/// Signs requests, performs the exchange and classifies the reply
#[derive(Debug)]
pub struct TransportClient<E: Exchanger = DnsTransport> {
    exchanger: E,
    signer: Option<TsigSigner>,
}

impl<E: Exchanger> TransportClient<E> {
    pub fn new(exchanger: E, signer: Option<TsigSigner>) -> Self {
        Self { exchanger, signer }
    }

    pub fn signer(&self) -> Option<&TsigSigner> {
        self.signer.as_ref()
    }

    pub fn exchanger(&self) -> &E {
        &self.exchanger
    }

    /// Send one message and wait for its reply.
    ///
    /// Returns [`Rfc2136Error::Cancelled`] as soon as `cancel` fires; the
    /// exchange future is dropped, closing its socket.
    pub async fn send(
        &self,
        mut request: DNSPacket,
        server: &str,
        cancel: &CancellationToken,
    ) -> Result<DNSPacket> {
        let request_mac = match &self.signer {
            Some(signer) => Some(signer.sign(&mut request)?),
            None => None,
        };

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Exchange with {} cancelled", server);
                return Err(Rfc2136Error::Cancelled);
            }
            reply = self.exchanger.exchange(&request, server) => reply?,
        };

        if let (Some(signer), Some(mac)) = (&self.signer, &request_mac) {
            signer
                .verify_response(&reply.wire, &reply.packet, mac)
                .map_err(|e| match e {
                    TsigError::ErrorCode(code) => Rfc2136Error::ServerRejected {
                        rcode: DNSRcode::name(code),
                    },
                    other => Rfc2136Error::Tsig(other),
                })?;
        }

        classify_reply(&reply.packet)?;
        Ok(reply.packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_reply() {
        let mut reply = DNSPacket::default();
        assert!(classify_reply(&reply).is_ok());

        reply.header.rcode = DNSRcode::NOTAUTH as u8;
        assert_eq!(
            classify_reply(&reply),
            Err(Rfc2136Error::ServerRejected {
                rcode: "NOTAUTH".to_string()
            })
        );
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("UDP".parse::<Protocol>(), Ok(Protocol::Udp));
        assert_eq!("tcp".parse::<Protocol>(), Ok(Protocol::Tcp));
        assert!("quic".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_coalesce_key_ignores_id() {
        let mut a = crate::query::build_query("example.org.");
        let mut b = a.clone();
        a.header.id = 1;
        b.header.id = 2;
        assert_eq!(coalesce_key(&a, "127.0.0.1:53"), coalesce_key(&b, "127.0.0.1:53"));
        assert_ne!(coalesce_key(&a, "127.0.0.1:53"), coalesce_key(&a, "127.0.0.1:5353"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_failure() {
        let transport = DnsTransport::new(Protocol::Tcp, Duration::from_secs(2));
        // Port 1 on localhost is closed on any sane test host
        let err = transport
            .exchange(&crate::query::build_query("example.org."), "127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, Rfc2136Error::NetworkFailure(_)));
    }
}
