//! Zone enumeration through a single ANY query

use crate::dns::common::fqdn;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::header::DNSHeader;
use crate::dns::question::DNSQuestion;
use crate::dns::{DNSPacket, Opcode};
use crate::error::Result;
use crate::record::{Record, from_wire};
use tracing::debug;

/// Build the query for every record at `zone`: class IN, type ANY, recursion desired
pub fn build_query(zone: &str) -> DNSPacket {
    DNSPacket {
        header: DNSHeader {
            id: rand::random::<u16>(),
            opcode: Opcode::QUERY as u8,
            rd: true,
            ..Default::default()
        },
        questions: vec![DNSQuestion::new(
            &fqdn(zone),
            DNSResourceType::ANY,
            DNSResourceClass::IN,
        )],
        ..Default::default()
    }
}

/// Translate the answer section, in server order, without filtering.
///
/// A trailing TSIG record lives in the additional section and is never part
/// of the answers.
pub fn records_from_response(response: &DNSPacket) -> Result<Vec<Record>> {
    let records = response
        .answers
        .iter()
        .map(from_wire)
        .collect::<Result<Vec<_>>>()?;
    debug!(
        "Query id={} returned {} records",
        response.header.id,
        records.len()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::resource::DNSResource;
    use std::time::Duration;

    #[test]
    fn test_query_shape() {
        let query = build_query("example.org");
        assert!(query.header.rd);
        assert_eq!(query.opcode(), Opcode::QUERY);
        assert_eq!(query.questions.len(), 1);
        assert_eq!(query.questions[0].qtype, DNSResourceType::ANY);
        assert_eq!(query.questions[0].qclass, DNSResourceClass::IN);
        assert_eq!(query.questions[0].labels, vec!["example", "org", ""]);
    }

    #[test]
    fn test_answers_keep_server_order() {
        let mut response = build_query("example.org.");
        response.header.qr = true;
        response.answers = vec![
            DNSResource::new("example.org.", DNSResourceType::TXT, DNSResourceClass::IN, 300, vec![2, b'v', b'2']),
            DNSResource::new("example.org.", DNSResourceType::A, DNSResourceClass::IN, 60, vec![192, 0, 2, 1]),
            DNSResource::new("example.org.", DNSResourceType::TXT, DNSResourceClass::IN, 300, vec![2, b'v', b'2']),
        ];

        let records = records_from_response(&response).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].value, "v2");
        assert_eq!(records[1], Record::new("example.org.", "A", "192.0.2.1", Duration::from_secs(60)));
        assert_eq!(records[2], records[0]);
    }
}
