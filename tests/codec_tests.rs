use bitstream_io::{BigEndian, BitReader, BitWriter};
use rfc2136::dns::DNSPacket;
use rfc2136::dns::common::PacketComponent;
use rfc2136::dns::enums::{DNSResourceClass, DNSResourceType};
use rfc2136::dns::header::DNSHeader;
use rfc2136::dns::question::DNSQuestion;
use rfc2136::dynamic_update::{UpdateMode, build_transaction};
use rfc2136::{OwnerScope, Record};
use std::time::Duration;

#[test]
fn test_header_read_write_roundtrip() {
    let original = DNSHeader {
        id: 0xABCD,
        qr: true,
        opcode: 5,
        aa: true,
        tc: false,
        rd: false,
        ra: false,
        z: 0,
        rcode: 9,
        qdcount: 1,
        ancount: 0,
        nscount: 2,
        arcount: 1,
    };

    let mut buffer = Vec::new();
    {
        let mut writer = BitWriter::<_, BigEndian>::new(&mut buffer);
        original.write(&mut writer).expect("Failed to write header");
    }
    assert_eq!(buffer.len(), 12);

    let mut reader = BitReader::<_, BigEndian>::new(&buffer[..]);
    let mut parsed = DNSHeader::default();
    parsed.read(&mut reader).expect("Failed to read header");
    assert_eq!(parsed, original);
}

#[test]
fn test_update_header_flags_packing() {
    let header = DNSHeader {
        id: 0x1234,
        qr: true,   // bit 15
        opcode: 5,  // bits 14-11, UPDATE
        rcode: 9,   // bits 3-0, NOTAUTH
        ..Default::default()
    };

    let mut buffer = Vec::new();
    {
        let mut writer = BitWriter::<_, BigEndian>::new(&mut buffer);
        header.write(&mut writer).expect("Failed to write header");
    }

    assert_eq!(&buffer[0..2], &[0x12, 0x34]);
    assert_eq!(buffer[2], 0xA8);
    assert_eq!(buffer[3], 0x09);
}

#[test]
fn test_zone_section_encoding() {
    let zone = DNSQuestion::new("example.org", DNSResourceType::SOA, DNSResourceClass::IN);

    let mut buffer = Vec::new();
    {
        let mut writer = BitWriter::<_, BigEndian>::new(&mut buffer);
        zone.write(&mut writer).expect("Failed to write question");
    }

    let mut expected = vec![7];
    expected.extend_from_slice(b"example");
    expected.push(3);
    expected.extend_from_slice(b"org");
    expected.extend_from_slice(&[0, 0, 6, 0, 1]);
    assert_eq!(buffer, expected);
}

#[test]
fn test_append_message_bytes() {
    let record = Record::new("example.org.", "A", "192.0.2.1", Duration::from_secs(300));
    let mut packet = build_transaction("example.org.", &record, UpdateMode::Append, OwnerScope::ZoneApex)
        .unwrap()
        .to_packet();
    packet.header.id = 0x1234;

    let name = [7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'o', b'r', b'g', 0];
    let mut expected = vec![
        0x12, 0x34, // id
        0x28, 0x00, // opcode UPDATE
        0, 1, // zone count
        0, 0, // prerequisite count
        0, 1, // update count
        0, 0, // additional count
    ];
    expected.extend_from_slice(&name);
    expected.extend_from_slice(&[0, 6, 0, 1]); // SOA IN
    expected.extend_from_slice(&name);
    expected.extend_from_slice(&[0, 1, 0, 1]); // A IN
    expected.extend_from_slice(&[0, 0, 0x01, 0x2c]); // TTL 300
    expected.extend_from_slice(&[0, 4, 192, 0, 2, 1]);

    assert_eq!(packet.serialize().unwrap(), expected);
}

#[test]
fn test_delete_rrset_message_has_empty_rdata() {
    let record = Record::new("example.org.", "TXT", "v1", Duration::from_secs(300));
    let packet = build_transaction("example.org.", &record, UpdateMode::Set, OwnerScope::ZoneApex)
        .unwrap()
        .to_packet();
    let wire = packet.serialize().unwrap();
    let parsed = DNSPacket::parse(&wire).unwrap();

    let delete = &parsed.authorities[0];
    assert_eq!(delete.rclass, DNSResourceClass::ANY);
    assert_eq!(delete.ttl, 0);
    assert_eq!(delete.rdlength, 0);

    let add = &parsed.authorities[1];
    assert_eq!(add.rclass, DNSResourceClass::IN);
    assert_eq!(add.rdata, vec![2, b'v', b'1']);
}

#[test]
fn test_reply_with_compressed_answers() {
    // Reply to an ANY query for example.org with an MX and a CNAME answer,
    // both using pointers back to the question name
    let mut reply = vec![
        0x00, 0x2a, 0x84, 0x00, 0, 1, 0, 2, 0, 0, 0, 0, //
        7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'o', b'r', b'g', 0, 0, 255, 0, 1,
    ];
    // MX 10 mail.example.org.
    reply.extend_from_slice(&[0xc0, 12, 0, 15, 0, 1, 0, 0, 0x0e, 0x10, 0, 9, 0, 10]);
    reply.extend_from_slice(&[4, b'm', b'a', b'i', b'l', 0xc0, 12]);
    // www.example.org. CNAME example.org.
    reply.extend_from_slice(&[3, b'w', b'w', b'w', 0xc0, 12, 0, 5, 0, 1, 0, 0, 0, 60, 0, 2, 0xc0, 12]);

    let packet = DNSPacket::parse(&reply).unwrap();
    let records = rfc2136::query::records_from_response(&packet).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0],
        Record::new("example.org.", "MX", "10 mail.example.org.", Duration::from_secs(3600))
    );
    assert_eq!(
        records[1],
        Record::new("www.example.org.", "CNAME", "example.org.", Duration::from_secs(60))
    );
}
