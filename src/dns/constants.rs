/// DNS Response Code constants from RFC 1035, RFC 2136 and RFC 8945
pub struct DNSRcode;

impl DNSRcode {
    pub const NOERROR: u16 = 0; // No error
    pub const FORMERR: u16 = 1; // Format error
    pub const SERVFAIL: u16 = 2; // Server failure
    pub const NXDOMAIN: u16 = 3; // Name error
    pub const NOTIMP: u16 = 4; // Not implemented
    pub const REFUSED: u16 = 5; // Query refused
    pub const YXDOMAIN: u16 = 6; // Name exists when it should not
    pub const YXRRSET: u16 = 7; // RR Set exists when it should not
    pub const NXRRSET: u16 = 8; // RR Set that should exist does not
    pub const NOTAUTH: u16 = 9; // Not authorized
    pub const NOTZONE: u16 = 10; // Name not contained in zone
    pub const BADSIG: u16 = 16; // TSIG signature failure
    pub const BADKEY: u16 = 17; // Key not recognized
    pub const BADTIME: u16 = 18; // Signature out of time window

    /// Textual name of a response code, as nameservers and nsupdate print it
    pub fn name(rcode: u16) -> String {
        match rcode {
            Self::NOERROR => "NOERROR".to_string(),
            Self::FORMERR => "FORMERR".to_string(),
            Self::SERVFAIL => "SERVFAIL".to_string(),
            Self::NXDOMAIN => "NXDOMAIN".to_string(),
            Self::NOTIMP => "NOTIMP".to_string(),
            Self::REFUSED => "REFUSED".to_string(),
            Self::YXDOMAIN => "YXDOMAIN".to_string(),
            Self::YXRRSET => "YXRRSET".to_string(),
            Self::NXRRSET => "NXRRSET".to_string(),
            Self::NOTAUTH => "NOTAUTH".to_string(),
            Self::NOTZONE => "NOTZONE".to_string(),
            Self::BADSIG => "BADSIG".to_string(),
            Self::BADKEY => "BADKEY".to_string(),
            Self::BADTIME => "BADTIME".to_string(),
            other => format!("RCODE{}", other),
        }
    }
}

/// DNS Opcode constants from RFC 1035
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    QUERY = 0,
    IQUERY = 1,
    STATUS = 2,
    UNASSIGNED3 = 3,
    NOTIFY = 4,
    UPDATE = 5,
    DSO = 6,
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            0 => Opcode::QUERY,
            1 => Opcode::IQUERY,
            2 => Opcode::STATUS,
            3 => Opcode::UNASSIGNED3,
            4 => Opcode::NOTIFY,
            5 => Opcode::UPDATE,
            6 => Opcode::DSO,
            _ => Opcode::QUERY, // Default to QUERY for unknown values
        }
    }
}

/// Default port for DNS over UDP and TCP
pub const DNS_PORT: u16 = 53;

/// Largest UDP reply we are prepared to receive
pub const MAX_UDP_PAYLOAD: usize = 4096;
