//! Translation between provider records and wire resource records
//!
//! A [`Record`] is the protocol-agnostic shape callers work with: a name, a
//! type mnemonic, a value in the type's textual presentation form and a TTL.
//! [`to_wire`] turns one into a [`DNSResource`] for an update message and
//! [`from_wire`] renders answers from a query back into records.

use crate::dns::common::{decode_name, encode_name, fqdn, labels_to_name, name_to_labels};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::resource::DNSResource;
use crate::error::{Result, Rfc2136Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::trace;

/// Longest character-string a TXT chunk can carry
const MAX_TXT_CHUNK: usize = 255;

/// A DNS record as seen by callers of the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    #[serde(rename = "type")]
    pub rtype: String,
    pub value: String,
    #[serde(with = "ttl_seconds")]
    pub ttl: Duration,
}

impl Record {
    pub fn new(name: &str, rtype: &str, value: &str, ttl: Duration) -> Self {
        Self {
            name: name.to_string(),
            rtype: rtype.to_string(),
            value: value.to_string(),
            ttl,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} IN {} {}",
            self.name,
            self.ttl.as_secs(),
            self.rtype,
            self.value
        )
    }
}

mod ttl_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(ttl.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Which owner name an outgoing resource record carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerScope {
    /// Every record is written at the zone apex, whatever its own name
    #[default]
    ZoneApex,
    /// The record's own name, relative names being joined to the zone
    RecordName,
}

impl std::str::FromStr for OwnerScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "zone_apex" | "zone" | "apex" => Ok(OwnerScope::ZoneApex),
            "record_name" | "record" | "name" => Ok(OwnerScope::RecordName),
            other => Err(other.to_string()),
        }
    }
}

/// Typed RDATA for the record types the provider understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    CNAME(String),
    MX { preference: u16, exchange: String },
    TXT(Vec<String>),
    NS(String),
    PTR(String),
    SOA {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Unknown(Vec<u8>),
}

impl RData {
    /// Parse a presentation-form value for one of the writable types
    pub fn parse(rtype: DNSResourceType, value: &str) -> Result<Self> {
        let invalid = |reason: &str| Rfc2136Error::InvalidRecordValue {
            rtype: rtype.mnemonic(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match rtype {
            DNSResourceType::A => value
                .trim()
                .parse::<Ipv4Addr>()
                .map(RData::A)
                .map_err(|_| invalid("not an IPv4 address")),
            DNSResourceType::AAAA => value
                .trim()
                .parse::<Ipv6Addr>()
                .map(RData::AAAA)
                .map_err(|_| invalid("not an IPv6 address")),
            DNSResourceType::CNAME => {
                let target = value.trim();
                if target.is_empty() {
                    return Err(invalid("empty target name"));
                }
                Ok(RData::CNAME(fqdn(target)))
            }
            DNSResourceType::MX => {
                let parts: Vec<&str> = value.split_whitespace().collect();
                match parts.as_slice() {
                    [exchange] => Ok(RData::MX {
                        preference: 0,
                        exchange: fqdn(exchange),
                    }),
                    [preference, exchange] => {
                        let preference = preference
                            .parse::<u16>()
                            .map_err(|_| invalid("preference is not a 16-bit number"))?;
                        Ok(RData::MX {
                            preference,
                            exchange: fqdn(exchange),
                        })
                    }
                    _ => Err(invalid("expected \"[preference] exchange\"")),
                }
            }
            DNSResourceType::TXT => Ok(RData::TXT(split_txt(value))),
            other => Err(Rfc2136Error::UnsupportedRecordType(other.mnemonic())),
        }
    }

    /// Encode to uncompressed wire RDATA
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            RData::A(addr) => addr.octets().to_vec(),
            RData::AAAA(addr) => addr.octets().to_vec(),
            RData::CNAME(name) | RData::NS(name) | RData::PTR(name) => {
                encode_name(&name_to_labels(name))?
            }
            RData::MX {
                preference,
                exchange,
            } => {
                let mut out = preference.to_be_bytes().to_vec();
                out.extend(encode_name(&name_to_labels(exchange))?);
                out
            }
            RData::TXT(chunks) => {
                let mut out = Vec::new();
                for chunk in chunks {
                    out.push(chunk.len() as u8);
                    out.extend_from_slice(chunk.as_bytes());
                }
                out
            }
            RData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                let mut out = encode_name(&name_to_labels(mname))?;
                out.extend(encode_name(&name_to_labels(rname))?);
                for value in [serial, refresh, retry, expire, minimum] {
                    out.extend_from_slice(&value.to_be_bytes());
                }
                out
            }
            RData::Unknown(raw) => raw.clone(),
        };
        Ok(bytes)
    }

    /// Decode uncompressed wire RDATA of the given type
    pub fn from_bytes(rtype: DNSResourceType, rdata: &[u8]) -> Result<Self> {
        let malformed = || {
            Rfc2136Error::Codec(format!(
                "malformed {} RDATA ({} bytes)",
                rtype.mnemonic(),
                rdata.len()
            ))
        };

        let parsed = match rtype {
            DNSResourceType::A => {
                let octets: [u8; 4] = rdata.try_into().map_err(|_| malformed())?;
                RData::A(Ipv4Addr::from(octets))
            }
            DNSResourceType::AAAA => {
                let octets: [u8; 16] = rdata.try_into().map_err(|_| malformed())?;
                RData::AAAA(Ipv6Addr::from(octets))
            }
            DNSResourceType::CNAME | DNSResourceType::NS | DNSResourceType::PTR => {
                let (labels, _) = decode_name(rdata, 0, None)?;
                let name = labels_to_name(&labels);
                match rtype {
                    DNSResourceType::CNAME => RData::CNAME(name),
                    DNSResourceType::NS => RData::NS(name),
                    _ => RData::PTR(name),
                }
            }
            DNSResourceType::MX => {
                let preference = rdata
                    .get(..2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .ok_or_else(malformed)?;
                let (labels, _) = decode_name(rdata, 2, None)?;
                RData::MX {
                    preference,
                    exchange: labels_to_name(&labels),
                }
            }
            DNSResourceType::TXT => {
                let mut chunks = Vec::new();
                let mut pos = 0;
                while pos < rdata.len() {
                    let len = rdata[pos] as usize;
                    let chunk = rdata.get(pos + 1..pos + 1 + len).ok_or_else(malformed)?;
                    chunks.push(txt_chunk_text(chunk));
                    pos += len + 1;
                }
                RData::TXT(chunks)
            }
            DNSResourceType::SOA => {
                let (mname, used_m) = decode_name(rdata, 0, None)?;
                let (rname, used_r) = decode_name(rdata, used_m, None)?;
                let counters = rdata.get(used_m + used_r..).ok_or_else(malformed)?;
                if counters.len() != 20 {
                    return Err(malformed());
                }
                let word = |i: usize| {
                    u32::from_be_bytes([
                        counters[i * 4],
                        counters[i * 4 + 1],
                        counters[i * 4 + 2],
                        counters[i * 4 + 3],
                    ])
                };
                RData::SOA {
                    mname: labels_to_name(&mname),
                    rname: labels_to_name(&rname),
                    serial: word(0),
                    refresh: word(1),
                    retry: word(2),
                    expire: word(3),
                    minimum: word(4),
                }
            }
            _ => RData::Unknown(rdata.to_vec()),
        };
        Ok(parsed)
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(addr) => write!(f, "{}", addr),
            RData::AAAA(addr) => write!(f, "{}", addr),
            RData::CNAME(name) | RData::NS(name) | RData::PTR(name) => f.write_str(name),
            RData::MX {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            RData::TXT(chunks) => f.write_str(&chunks.concat()),
            RData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{} {} {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
            RData::Unknown(raw) => write!(f, "\\# {} {}", raw.len(), hex::encode(raw)),
        }
    }
}

/// Text of one TXT character-string. Octets that are not UTF-8 are written
/// as `\DDD` (RFC 1035 section 5.1); encoding does not turn them back into
/// octets.
fn txt_chunk_text(chunk: &[u8]) -> String {
    let mut text = String::with_capacity(chunk.len());
    for piece in chunk.utf8_chunks() {
        text.push_str(piece.valid());
        for octet in piece.invalid() {
            text.push_str(&format!("\\{:03}", octet));
        }
    }
    text
}

fn split_txt(value: &str) -> Vec<String> {
    if value.len() <= MAX_TXT_CHUNK {
        return vec![value.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in value.chars() {
        if current.len() + ch.len_utf8() > MAX_TXT_CHUNK {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Owner name for a record under the given scope
fn owner_name(zone: &str, record: &Record, scope: OwnerScope) -> String {
    match scope {
        OwnerScope::ZoneApex => fqdn(zone),
        OwnerScope::RecordName => {
            let name = record.name.trim();
            if name.is_empty() || name == "@" {
                fqdn(zone)
            } else if name.ends_with('.') {
                name.to_string()
            } else {
                format!("{}.{}", name, fqdn(zone).trim_start_matches('.'))
            }
        }
    }
}

/// Convert a record into a wire resource record of class IN.
///
/// Fails with [`Rfc2136Error::UnsupportedRecordType`] for any type other than
/// A, AAAA, CNAME, MX and TXT.
pub fn to_wire(zone: &str, record: &Record, scope: OwnerScope) -> Result<DNSResource> {
    let rtype = match DNSResourceType::from_mnemonic(&record.rtype) {
        Some(
            rtype @ (DNSResourceType::A
            | DNSResourceType::AAAA
            | DNSResourceType::CNAME
            | DNSResourceType::MX
            | DNSResourceType::TXT),
        ) => rtype,
        _ => return Err(Rfc2136Error::UnsupportedRecordType(record.rtype.clone())),
    };

    let rdata = RData::parse(rtype, &record.value)?;
    let ttl = u32::try_from(record.ttl.as_secs()).unwrap_or(u32::MAX);
    let owner = owner_name(zone, record, scope);
    trace!("Translated {} to {} {} {:?}", record, owner, ttl, rdata);

    Ok(DNSResource::new(
        &owner,
        rtype,
        DNSResourceClass::IN,
        ttl,
        rdata.to_bytes()?,
    ))
}

/// Render a wire resource record as a provider record
pub fn from_wire(resource: &DNSResource) -> Result<Record> {
    let rdata = RData::from_bytes(resource.rtype, &resource.rdata)?;
    Ok(Record {
        name: labels_to_name(&resource.labels),
        rtype: resource.rtype.mnemonic(),
        value: rdata.to_string(),
        ttl: Duration::from_secs(resource.ttl as u64),
    })
}
