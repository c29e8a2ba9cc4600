mod common;

use common::{MockNameserver, MockOptions};
use rfc2136::dns::DNSRcode;
use rfc2136::dynamic_update::{TsigAlgorithm, TsigKey, TsigSigner};
use rfc2136::query::build_query;
use rfc2136::transport::{DnsTransport, Exchanger, Protocol, TransportClient};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ZONE: &str = "example.org.";
const SECRET: &str = "dHJhbnNwb3J0LXRlc3Qtc2VjcmV0";

fn key() -> TsigKey {
    TsigKey::new("transport-key.", TsigAlgorithm::HmacSha512, SECRET).unwrap()
}

#[tokio::test]
async fn test_identical_requests_are_coalesced() {
    let server = MockNameserver::start_with(MockOptions {
        zone: ZONE.to_string(),
        delay: Duration::from_millis(200),
        ..Default::default()
    })
    .await;
    let transport = DnsTransport::new(Protocol::Udp, Duration::from_secs(5));
    let addr = server.addr.to_string();

    let first = build_query(ZONE);
    let mut second = first.clone();
    second.header.id = first.header.id.wrapping_add(1);

    let (a, b) = futures::join!(
        transport.exchange(&first, &addr),
        transport.exchange(&second, &addr)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(server.requests(), 1);
    assert_eq!(a.packet.header.id, first.header.id);
    assert_eq!(b.packet.header.id, second.header.id);
    assert_eq!(transport.in_flight(), 0);
}

#[tokio::test]
async fn test_different_requests_are_not_coalesced() {
    let server = MockNameserver::start_with(MockOptions {
        zone: ZONE.to_string(),
        delay: Duration::from_millis(100),
        ..Default::default()
    })
    .await;
    let transport = DnsTransport::new(Protocol::Udp, Duration::from_secs(5));
    let addr = server.addr.to_string();

    let first = build_query(ZONE);
    let second = build_query("sub.example.org.");

    let (a, b) = futures::join!(
        transport.exchange(&first, &addr),
        transport.exchange(&second, &addr)
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(server.requests(), 2);
}

#[tokio::test]
async fn test_completed_requests_are_sent_again() {
    let server = MockNameserver::start(ZONE).await;
    let transport = DnsTransport::new(Protocol::Tcp, Duration::from_secs(5));
    let addr = server.addr.to_string();
    let query = build_query(ZONE);

    transport.exchange(&query, &addr).await.unwrap();
    transport.exchange(&query, &addr).await.unwrap();
    assert_eq!(server.requests(), 2);
}

#[tokio::test]
async fn test_signed_requests_are_never_coalesced() {
    let server = MockNameserver::start_with(MockOptions {
        zone: ZONE.to_string(),
        delay: Duration::from_millis(200),
        key: Some(key()),
        ..Default::default()
    })
    .await;
    let client = TransportClient::new(
        DnsTransport::new(Protocol::Udp, Duration::from_secs(5)),
        Some(TsigSigner::new(key())),
    );
    let addr = server.addr.to_string();
    let cancel = CancellationToken::new();

    let query = build_query(ZONE);
    let (a, b) = futures::join!(
        client.send(query.clone(), &addr, &cancel),
        client.send(query.clone(), &addr, &cancel)
    );

    // Both replies are signed against their own request MAC and verify
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.tsig().is_some());
    assert!(b.tsig().is_some());
    assert_eq!(server.requests(), 2);
}

#[tokio::test]
async fn test_client_classifies_rejections() {
    let server = MockNameserver::start("example.org.").await;
    let client = TransportClient::new(DnsTransport::new(Protocol::Udp, Duration::from_secs(5)), None);

    let mut update = build_query("other.test.");
    update.header.opcode = rfc2136::dns::Opcode::UPDATE as u8;
    update.header.rd = false;

    let err = client
        .send(update, &server.addr.to_string(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), format!("server replied {}", DNSRcode::name(DNSRcode::NOTAUTH)));
}

#[tokio::test]
async fn test_waiters_survive_a_dropped_leader() {
    let server = MockNameserver::start_with(MockOptions {
        zone: ZONE.to_string(),
        delay: Duration::from_millis(300),
        ..Default::default()
    })
    .await;
    let transport = DnsTransport::new(Protocol::Udp, Duration::from_secs(2));
    let addr = server.addr.to_string();

    let first = build_query(ZONE);
    let mut second = first.clone();
    second.header.id = first.header.id.wrapping_add(1);

    // The first exchange is abandoned while the second is waiting on it
    let (abandoned, waited) = futures::join!(
        tokio::time::timeout(Duration::from_millis(50), transport.exchange(&first, &addr)),
        transport.exchange(&second, &addr)
    );

    assert!(abandoned.is_err());
    assert_eq!(waited.unwrap().packet.header.id, second.header.id);
    assert_eq!(transport.in_flight(), 0);
}
