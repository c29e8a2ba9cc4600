//! In-process RFC 2136 nameserver for integration tests
//!
//! Serves one zone from memory over UDP and TCP on the same loopback port.
//! Updates are applied with RFC 2136 section 3.4.2 semantics; queries are
//! answered from the store.

#![allow(dead_code)] // Not every test file uses every helper

use rfc2136::ProviderConfig;
use rfc2136::dns::common::{fqdn, labels_to_name};
use rfc2136::dns::enums::{DNSResourceClass, DNSResourceType};
use rfc2136::dns::resource::DNSResource;
use rfc2136::dns::{DNSPacket, DNSRcode, Opcode};
use rfc2136::dynamic_update::{TsigKey, TsigSigner};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

/// What the server saw, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Received(u16),
    Replied(u16),
}

#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    pub zone: String,
    /// Delay before each request is processed
    pub delay: Duration,
    /// Require and verify TSIG with this key
    pub key: Option<TsigKey>,
    /// Answer REFUSED to every update after this many were applied
    pub reject_updates_after: Option<usize>,
    /// Set TC on UDP query replies, forcing clients over to TCP
    pub truncate_udp: bool,
}

struct MockState {
    zone: String,
    delay: Duration,
    signer: Option<TsigSigner>,
    reject_updates_after: Option<usize>,
    truncate_udp: bool,
    store: Mutex<Vec<DNSResource>>,
    events: Mutex<Vec<Event>>,
    requests: AtomicUsize,
    updates_applied: AtomicUsize,
}

pub struct MockNameserver {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockNameserver {
    pub async fn start(zone: &str) -> Self {
        Self::start_with(MockOptions {
            zone: zone.to_string(),
            ..Default::default()
        })
        .await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        let state = Arc::new(MockState {
            zone: fqdn(&options.zone).to_lowercase(),
            delay: options.delay,
            signer: options.key.map(TsigSigner::new),
            reject_updates_after: options.reject_updates_after,
            truncate_udp: options.truncate_udp,
            store: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            requests: AtomicUsize::new(0),
            updates_applied: AtomicUsize::new(0),
        });

        let (udp, tcp) = bind_pair().await;
        let addr = udp.local_addr().unwrap();

        tokio::spawn(serve_udp(Arc::new(udp), state.clone()));
        tokio::spawn(serve_tcp(tcp, state.clone()));

        Self { addr, state }
    }

    /// Provider configuration pointing at this server
    pub fn config(&self) -> ProviderConfig {
        ProviderConfig {
            nameserver: self.addr.to_string(),
            ..Default::default()
        }
    }

    pub fn records(&self) -> Vec<DNSResource> {
        self.state.store.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().unwrap().clone()
    }

    /// Number of messages received so far
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

/// UDP and TCP listeners sharing one loopback port
async fn bind_pair() -> (UdpSocket, TcpListener) {
    for _ in 0..16 {
        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = udp.local_addr().unwrap();
        if let Ok(tcp) = TcpListener::bind(addr).await {
            return (udp, tcp);
        }
    }
    panic!("no loopback port free for both UDP and TCP");
}

async fn serve_udp(socket: Arc<UdpSocket>, state: Arc<MockState>) {
    let mut buf = vec![0u8; 65535];
    loop {
        let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
            return;
        };
        let wire = buf[..len].to_vec();
        let socket = socket.clone();
        let state = state.clone();
        tokio::spawn(async move {
            if let Some(reply) = state.handle(&wire, true).await {
                let _ = socket.send_to(&reply, peer).await;
            }
        });
    }
}

async fn serve_tcp(listener: TcpListener, state: Arc<MockState>) {
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let state = state.clone();
        tokio::spawn(async move {
            let mut length_buf = [0u8; 2];
            if stream.read_exact(&mut length_buf).await.is_err() {
                return;
            }
            let mut wire = vec![0u8; u16::from_be_bytes(length_buf) as usize];
            if stream.read_exact(&mut wire).await.is_err() {
                return;
            }
            if let Some(reply) = state.handle(&wire, false).await {
                let _ = stream.write_all(&(reply.len() as u16).to_be_bytes()).await;
                let _ = stream.write_all(&reply).await;
            }
        });
    }
}

impl MockState {
    async fn handle(&self, wire: &[u8], udp: bool) -> Option<Vec<u8>> {
        let request = DNSPacket::parse(wire).ok()?;
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(Event::Received(request.header.id));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut reply = DNSPacket {
            questions: request.questions.clone(),
            ..Default::default()
        };
        reply.header.id = request.header.id;
        reply.header.qr = true;
        reply.header.aa = true;
        reply.header.opcode = request.header.opcode;

        let request_mac = match &self.signer {
            Some(signer) => match signer.verify_request(wire, &request) {
                Ok(mac) => Some(mac),
                Err(_) => {
                    reply.header.rcode = DNSRcode::NOTAUTH as u8;
                    return self.finish(reply, None);
                }
            },
            None => None,
        };

        let rcode = match request.opcode() {
            Opcode::UPDATE => self.apply_update(&request),
            Opcode::QUERY => {
                if udp && self.truncate_udp {
                    reply.header.tc = true;
                } else {
                    reply.answers = self.answer(&request);
                }
                DNSRcode::NOERROR
            }
            _ => DNSRcode::NOTIMP,
        };
        reply.header.rcode = rcode as u8;

        self.finish(reply, request_mac)
    }

    fn finish(&self, mut reply: DNSPacket, request_mac: Option<Vec<u8>>) -> Option<Vec<u8>> {
        if let (Some(signer), Some(mac)) = (&self.signer, request_mac) {
            signer.sign_response(&mut reply, &mac).ok()?;
        }
        self.events
            .lock()
            .unwrap()
            .push(Event::Replied(reply.header.id));
        reply.serialize().ok()
    }

    fn apply_update(&self, request: &DNSPacket) -> u16 {
        let Some(zone) = request.questions.first() else {
            return DNSRcode::FORMERR;
        };
        if labels_to_name(&zone.labels).to_lowercase() != self.zone {
            return DNSRcode::NOTAUTH;
        }
        if let Some(limit) = self.reject_updates_after {
            if self.updates_applied.load(Ordering::SeqCst) >= limit {
                return DNSRcode::REFUSED;
            }
        }

        let mut store = self.store.lock().unwrap();
        for rr in &request.authorities {
            let owner = owner_of(rr);
            match rr.rclass {
                DNSResourceClass::IN => {
                    match store.iter().position(|s| {
                        owner_of(s) == owner && s.rtype == rr.rtype && s.rdata == rr.rdata
                    }) {
                        Some(index) => store[index].ttl = rr.ttl,
                        None => store.push(rr.clone()),
                    }
                }
                DNSResourceClass::ANY if rr.rtype == DNSResourceType::ANY => {
                    store.retain(|s| owner_of(s) != owner);
                }
                DNSResourceClass::ANY => {
                    store.retain(|s| !(owner_of(s) == owner && s.rtype == rr.rtype));
                }
                DNSResourceClass::NONE => {
                    store.retain(|s| {
                        !(owner_of(s) == owner && s.rtype == rr.rtype && s.rdata == rr.rdata)
                    });
                }
                _ => return DNSRcode::FORMERR,
            }
        }
        self.updates_applied.fetch_add(1, Ordering::SeqCst);
        DNSRcode::NOERROR
    }

    fn answer(&self, request: &DNSPacket) -> Vec<DNSResource> {
        let Some(question) = request.questions.first() else {
            return Vec::new();
        };
        let qname = labels_to_name(&question.labels).to_lowercase();
        self.store
            .lock()
            .unwrap()
            .iter()
            .filter(|rr| owner_of(rr) == qname)
            .filter(|rr| question.qtype == DNSResourceType::ANY || rr.rtype == question.qtype)
            .cloned()
            .collect()
    }
}

fn owner_of(rr: &DNSResource) -> String {
    labels_to_name(&rr.labels).to_lowercase()
}
