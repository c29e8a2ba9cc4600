//! TSIG (Transaction Signature) authentication for DNS updates
//!
//! Implements RFC 8945 (formerly RFC 2845) signing of outgoing messages and
//! validation of signed replies with a single static shared secret.

use crate::dns::common::{decode_name, encode_name, fqdn, labels_to_name, name_to_labels};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::resource::DNSResource;
use crate::dns::DNSPacket;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use ring::hmac;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Clock-skew tolerance written into every signature, in seconds
pub const DEFAULT_FUDGE: u16 = 300;

/// TSIG algorithm types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TsigAlgorithm {
    HmacSha1,
    #[default]
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl TsigAlgorithm {
    /// Get the algorithm name as used in DNS, in absolute form
    pub fn name(&self) -> &'static str {
        match self {
            TsigAlgorithm::HmacSha1 => "hmac-sha1.",
            TsigAlgorithm::HmacSha256 => "hmac-sha256.",
            TsigAlgorithm::HmacSha384 => "hmac-sha384.",
            TsigAlgorithm::HmacSha512 => "hmac-sha512.",
        }
    }

    /// Get the HMAC algorithm for ring
    fn hmac_algorithm(&self) -> &'static hmac::Algorithm {
        match self {
            TsigAlgorithm::HmacSha1 => &hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            TsigAlgorithm::HmacSha256 => &hmac::HMAC_SHA256,
            TsigAlgorithm::HmacSha384 => &hmac::HMAC_SHA384,
            TsigAlgorithm::HmacSha512 => &hmac::HMAC_SHA512,
        }
    }

    /// Parse algorithm from name; the trailing dot and case are not significant
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_end_matches('.').to_lowercase().as_str() {
            "hmac-sha1" => Some(TsigAlgorithm::HmacSha1),
            "hmac-sha256" => Some(TsigAlgorithm::HmacSha256),
            "hmac-sha384" => Some(TsigAlgorithm::HmacSha384),
            "hmac-sha512" => Some(TsigAlgorithm::HmacSha512),
            _ => None,
        }
    }
}

impl fmt::Display for TsigAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// TSIG-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TsigError {
    #[error("Invalid TSIG format: {0}")]
    InvalidFormat(String),

    #[error("Unknown TSIG algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("TSIG signature verification failed")]
    VerificationFailed,

    #[error("TSIG time skew too large: {0} seconds")]
    TimeSkew(i64),

    #[error("TSIG key not found: {0}")]
    KeyNotFound(String),

    #[error("TSIG decode error: {0}")]
    DecodeError(String),

    /// The peer answered with a TSIG error code (BADSIG, BADKEY, BADTIME)
    #[error("TSIG error code {0}")]
    ErrorCode(u16),
}

/// TSIG verification result
pub type TsigResult<T> = Result<T, TsigError>;

/// TSIG key configuration
#[derive(Clone)]
pub struct TsigKey {
    /// Key name in canonical form (e.g., "update-key.example.com.")
    pub name: String,
    /// Algorithm to use
    pub algorithm: TsigAlgorithm,
    /// Decoded shared secret
    secret: Vec<u8>,
}

impl TsigKey {
    /// Create a new TSIG key from a base64 encoded secret
    pub fn new(name: &str, algorithm: TsigAlgorithm, secret: &str) -> TsigResult<Self> {
        let secret = BASE64
            .decode(secret.trim())
            .map_err(|e| TsigError::DecodeError(e.to_string()))?;
        Ok(Self {
            name: fqdn(&name.trim().to_lowercase()),
            algorithm,
            secret,
        })
    }

    /// Build a key from provider settings.
    ///
    /// Returns `None` unless both key name and secret are set. An empty
    /// algorithm selects hmac-sha256.
    pub fn from_settings(name: &str, algorithm: &str, secret: &str) -> TsigResult<Option<Self>> {
        if name.trim().is_empty() || secret.trim().is_empty() {
            return Ok(None);
        }
        let algorithm = if algorithm.trim().is_empty() {
            TsigAlgorithm::default()
        } else {
            TsigAlgorithm::from_name(algorithm)
                .ok_or_else(|| TsigError::UnknownAlgorithm(algorithm.to_string()))?
        };
        Self::new(name, algorithm, secret).map(Some)
    }
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

/// Parsed TSIG data
#[derive(Debug, Clone, PartialEq, Eq)]
struct TsigData {
    algorithm: String,
    time_signed: u64,
    fudge: u16,
    mac: Vec<u8>,
    original_id: u16,
    error: u16,
    other: Vec<u8>,
}

/// Signs outgoing messages and validates signed replies with one key
#[derive(Debug, Clone)]
pub struct TsigSigner {
    key: TsigKey,
    fudge: u16,
}

impl TsigSigner {
    pub fn new(key: TsigKey) -> Self {
        Self {
            key,
            fudge: DEFAULT_FUDGE,
        }
    }

    pub fn key(&self) -> &TsigKey {
        &self.key
    }

    pub fn fudge(&self) -> u16 {
        self.fudge
    }

    /// Sign a request, appending the TSIG record. Returns the request MAC,
    /// which the reply's signature covers.
    pub fn sign(&self, packet: &mut DNSPacket) -> TsigResult<Vec<u8>> {
        self.sign_at(packet, None, now())
    }

    /// Sign a reply to a request that carried `request_mac`
    pub fn sign_response(&self, packet: &mut DNSPacket, request_mac: &[u8]) -> TsigResult<Vec<u8>> {
        self.sign_at(packet, Some(request_mac), now())
    }

    fn sign_at(
        &self,
        packet: &mut DNSPacket,
        request_mac: Option<&[u8]>,
        time_signed: u64,
    ) -> TsigResult<Vec<u8>> {
        let message = packet
            .serialize()
            .map_err(|e| TsigError::InvalidFormat(format!("Failed to serialize packet: {}", e)))?;

        let tsig_data = TsigData {
            algorithm: self.key.algorithm.name().to_string(),
            time_signed,
            fudge: self.fudge,
            mac: Vec::new(), // Will be computed
            original_id: packet.header.id,
            error: 0,
            other: Vec::new(),
        };

        let mac = self.compute_mac(request_mac, &message, &tsig_data)?;
        let rdata = build_tsig_rdata(&tsig_data, &mac)?;
        packet.resources.push(DNSResource::new(
            &self.key.name,
            DNSResourceType::TSIG,
            DNSResourceClass::ANY,
            0,
            rdata,
        ));

        debug!(
            "Signed message id={} with key {} ({})",
            packet.header.id, self.key.name, self.key.algorithm
        );
        Ok(mac)
    }

    /// Verify a signed request as received on the wire. Returns its MAC.
    pub fn verify_request(&self, wire: &[u8], packet: &DNSPacket) -> TsigResult<Vec<u8>> {
        let tsig_rr = packet
            .tsig()
            .ok_or_else(|| TsigError::InvalidFormat("message is not signed".to_string()))?;
        let tsig_data = self.check_record(tsig_rr)?;
        self.check_mac(wire, tsig_rr, &tsig_data, None)?;
        Ok(tsig_data.mac)
    }

    /// Verify the reply to a request we signed with `request_mac`.
    ///
    /// Unsigned replies are accepted: servers commonly answer BADKEY or
    /// REFUSED without a signature, and the RCODE is classified separately.
    pub fn verify_response(
        &self,
        wire: &[u8],
        packet: &DNSPacket,
        request_mac: &[u8],
    ) -> TsigResult<()> {
        let Some(tsig_rr) = packet.tsig() else {
            debug!("Reply id={} carries no TSIG record", packet.header.id);
            return Ok(());
        };
        let tsig_data = self.check_record(tsig_rr)?;
        self.check_mac(wire, tsig_rr, &tsig_data, Some(request_mac))
    }

    /// Key, algorithm, error and time checks shared by both directions
    fn check_record(&self, tsig_rr: &DNSResource) -> TsigResult<TsigData> {
        let tsig_data = parse_tsig_rdata(&tsig_rr.rdata)?;

        let key_name = labels_to_name(&tsig_rr.labels).to_lowercase();
        if key_name != self.key.name {
            return Err(TsigError::KeyNotFound(key_name));
        }

        if TsigAlgorithm::from_name(&tsig_data.algorithm) != Some(self.key.algorithm) {
            return Err(TsigError::UnknownAlgorithm(tsig_data.algorithm.clone()));
        }

        if tsig_data.error != 0 {
            warn!("Peer returned TSIG error {}", tsig_data.error);
            return Err(TsigError::ErrorCode(tsig_data.error));
        }

        let time_diff = (now() as i64) - (tsig_data.time_signed as i64);
        if time_diff.abs() > tsig_data.fudge as i64 {
            warn!("TSIG time skew too large: {} seconds", time_diff);
            return Err(TsigError::TimeSkew(time_diff));
        }

        Ok(tsig_data)
    }

    fn check_mac(
        &self,
        wire: &[u8],
        tsig_rr: &DNSResource,
        tsig_data: &TsigData,
        request_mac: Option<&[u8]>,
    ) -> TsigResult<()> {
        let message = strip_tsig(wire, tsig_rr, tsig_data.original_id)?;
        let signed = self.signed_data(request_mac, &message, tsig_data)?;
        let hmac_key = hmac::Key::new(*self.key.algorithm.hmac_algorithm(), &self.key.secret);

        hmac::verify(&hmac_key, &signed, &tsig_data.mac).map_err(|_| {
            warn!("TSIG MAC verification failed");
            TsigError::VerificationFailed
        })
    }

    fn compute_mac(
        &self,
        request_mac: Option<&[u8]>,
        message: &[u8],
        tsig_data: &TsigData,
    ) -> TsigResult<Vec<u8>> {
        let hmac_key = hmac::Key::new(*self.key.algorithm.hmac_algorithm(), &self.key.secret);
        let signed = self.signed_data(request_mac, message, tsig_data)?;
        let signature = hmac::sign(&hmac_key, &signed);
        Ok(signature.as_ref().to_vec())
    }

    /// The byte string the MAC covers (RFC 8945 section 4.3)
    fn signed_data(
        &self,
        request_mac: Option<&[u8]>,
        message: &[u8],
        tsig_data: &TsigData,
    ) -> TsigResult<Vec<u8>> {
        let mut data = Vec::new();

        // 1. Request MAC, for replies only
        if let Some(mac) = request_mac {
            data.extend_from_slice(&(mac.len() as u16).to_be_bytes());
            data.extend_from_slice(mac);
        }

        // 2. DNS Message (without TSIG record)
        data.extend_from_slice(message);

        // 3. TSIG variables, names in canonical wire form
        data.extend(wire_name(&self.key.name)?);
        data.extend_from_slice(&u16::from(DNSResourceClass::ANY).to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend(wire_name(&tsig_data.algorithm.to_lowercase())?);
        data.extend_from_slice(&tsig_data.time_signed.to_be_bytes()[2..]); // 48-bit
        data.extend_from_slice(&tsig_data.fudge.to_be_bytes());
        data.extend_from_slice(&tsig_data.error.to_be_bytes());
        data.extend_from_slice(&(tsig_data.other.len() as u16).to_be_bytes());
        data.extend_from_slice(&tsig_data.other);

        Ok(data)
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn wire_name(name: &str) -> TsigResult<Vec<u8>> {
    encode_name(&name_to_labels(name)).map_err(|e| TsigError::InvalidFormat(e.to_string()))
}

/// Recover the message as it was before the TSIG record was appended.
///
/// The TSIG record is the last record and its owner and algorithm names are
/// never compressed, so its size is known from the parsed record.
fn strip_tsig(wire: &[u8], tsig_rr: &DNSResource, original_id: u16) -> TsigResult<Vec<u8>> {
    let owner = encode_name(&tsig_rr.labels).map_err(|e| TsigError::InvalidFormat(e.to_string()))?;
    let tsig_len = owner.len() + 10 + tsig_rr.rdata.len();
    let end = wire
        .len()
        .checked_sub(tsig_len)
        .filter(|end| *end >= 12)
        .ok_or_else(|| TsigError::InvalidFormat("message shorter than its TSIG".to_string()))?;

    let mut message = wire[..end].to_vec();
    let arcount = u16::from_be_bytes([message[10], message[11]])
        .checked_sub(1)
        .ok_or_else(|| TsigError::InvalidFormat("additional count is zero".to_string()))?;
    message[0..2].copy_from_slice(&original_id.to_be_bytes());
    message[10..12].copy_from_slice(&arcount.to_be_bytes());
    Ok(message)
}

/// Parse TSIG RDATA
fn parse_tsig_rdata(rdata: &[u8]) -> TsigResult<TsigData> {
    // TSIG RDATA format:
    // Algorithm Name (domain-name)
    // Time Signed (48-bit)
    // Fudge (16-bit)
    // MAC Size (16-bit)
    // MAC (variable)
    // Original ID (16-bit)
    // Error (16-bit)
    // Other Len (16-bit)
    // Other Data (variable)
    let (labels, mut offset) = decode_name(rdata, 0, None)
        .map_err(|_| TsigError::InvalidFormat("bad algorithm name".to_string()))?;
    let algorithm = labels_to_name(&labels);

    let time = take(rdata, &mut offset, 6)?;
    let time_signed = u64::from_be_bytes([0, 0, time[0], time[1], time[2], time[3], time[4], time[5]]);
    let fudge = take_u16(rdata, &mut offset)?;
    let mac_size = take_u16(rdata, &mut offset)? as usize;
    let mac = take(rdata, &mut offset, mac_size)?.to_vec();
    let original_id = take_u16(rdata, &mut offset)?;
    let error = take_u16(rdata, &mut offset)?;
    let other_len = take_u16(rdata, &mut offset)? as usize;
    let other = take(rdata, &mut offset, other_len)?.to_vec();

    Ok(TsigData {
        algorithm,
        time_signed,
        fudge,
        mac,
        original_id,
        error,
        other,
    })
}

fn take<'a>(rdata: &'a [u8], offset: &mut usize, len: usize) -> TsigResult<&'a [u8]> {
    let field = rdata
        .get(*offset..*offset + len)
        .ok_or_else(|| TsigError::InvalidFormat("RDATA too short".to_string()))?;
    *offset += len;
    Ok(field)
}

fn take_u16(rdata: &[u8], offset: &mut usize) -> TsigResult<u16> {
    take(rdata, offset, 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

/// Build TSIG RDATA
fn build_tsig_rdata(tsig_data: &TsigData, mac: &[u8]) -> TsigResult<Vec<u8>> {
    let mut rdata = wire_name(&tsig_data.algorithm)?;
    rdata.extend_from_slice(&tsig_data.time_signed.to_be_bytes()[2..]);
    rdata.extend_from_slice(&tsig_data.fudge.to_be_bytes());
    rdata.extend_from_slice(&(mac.len() as u16).to_be_bytes());
    rdata.extend_from_slice(mac);
    rdata.extend_from_slice(&tsig_data.original_id.to_be_bytes());
    rdata.extend_from_slice(&tsig_data.error.to_be_bytes());
    rdata.extend_from_slice(&(tsig_data.other.len() as u16).to_be_bytes());
    rdata.extend_from_slice(&tsig_data.other);
    Ok(rdata)
}
