use std::fmt;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceType {
    #[default]
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT,
    TSIG,
    AXFR,
    ANY,
    CAA,
    /// Any type code without a dedicated variant, kept verbatim
    Unknown(u16),
}

/// Record classes, including the two meta classes RFC 2136 uses in update sections
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CS,
    CH,
    HS,
    NONE,
    ANY,
    Unknown(u16),
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            2 => DNSResourceClass::CS,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            254 => DNSResourceClass::NONE,
            255 => DNSResourceClass::ANY,
            x => DNSResourceClass::Unknown(x),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(class: DNSResourceClass) -> Self {
        match class {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CS => 2,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::NONE => 254,
            DNSResourceClass::ANY => 255,
            DNSResourceClass::Unknown(x) => x,
        }
    }
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            2 => DNSResourceType::NS,
            5 => DNSResourceType::CNAME,
            6 => DNSResourceType::SOA,
            12 => DNSResourceType::PTR,
            15 => DNSResourceType::MX,
            16 => DNSResourceType::TXT,
            28 => DNSResourceType::AAAA,
            33 => DNSResourceType::SRV,
            41 => DNSResourceType::OPT,
            250 => DNSResourceType::TSIG,
            252 => DNSResourceType::AXFR,
            255 => DNSResourceType::ANY,
            257 => DNSResourceType::CAA,
            x => DNSResourceType::Unknown(x),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(rtype: DNSResourceType) -> Self {
        match rtype {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::PTR => 12,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::OPT => 41,
            DNSResourceType::TSIG => 250,
            DNSResourceType::AXFR => 252,
            DNSResourceType::ANY => 255,
            DNSResourceType::CAA => 257,
            DNSResourceType::Unknown(x) => x,
        }
    }
}

impl DNSResourceType {
    /// Parse a type mnemonic, accepting the RFC 3597 `TYPEnnn` form as well
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let upper = mnemonic.trim().to_ascii_uppercase();
        let rtype = match upper.as_str() {
            "A" => DNSResourceType::A,
            "NS" => DNSResourceType::NS,
            "CNAME" => DNSResourceType::CNAME,
            "SOA" => DNSResourceType::SOA,
            "PTR" => DNSResourceType::PTR,
            "MX" => DNSResourceType::MX,
            "TXT" => DNSResourceType::TXT,
            "AAAA" => DNSResourceType::AAAA,
            "SRV" => DNSResourceType::SRV,
            "OPT" => DNSResourceType::OPT,
            "TSIG" => DNSResourceType::TSIG,
            "AXFR" => DNSResourceType::AXFR,
            "ANY" => DNSResourceType::ANY,
            "CAA" => DNSResourceType::CAA,
            other => {
                let code = other.strip_prefix("TYPE")?.parse::<u16>().ok()?;
                DNSResourceType::from(code)
            }
        };
        Some(rtype)
    }

    pub fn mnemonic(&self) -> String {
        match self {
            DNSResourceType::A => "A".to_string(),
            DNSResourceType::NS => "NS".to_string(),
            DNSResourceType::CNAME => "CNAME".to_string(),
            DNSResourceType::SOA => "SOA".to_string(),
            DNSResourceType::PTR => "PTR".to_string(),
            DNSResourceType::MX => "MX".to_string(),
            DNSResourceType::TXT => "TXT".to_string(),
            DNSResourceType::AAAA => "AAAA".to_string(),
            DNSResourceType::SRV => "SRV".to_string(),
            DNSResourceType::OPT => "OPT".to_string(),
            DNSResourceType::TSIG => "TSIG".to_string(),
            DNSResourceType::AXFR => "AXFR".to_string(),
            DNSResourceType::ANY => "ANY".to_string(),
            DNSResourceType::CAA => "CAA".to_string(),
            DNSResourceType::Unknown(code) => format!("TYPE{}", code),
        }
    }
}

impl fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic())
    }
}
