pub mod common;
pub mod constants;
pub mod enums;
pub mod header;
pub mod question;
pub mod resource;

use bitstream_io::{BigEndian, BitReader, BitWriter};
use common::PacketComponent;
use header::DNSHeader;
use question::DNSQuestion;
use resource::DNSResource;
use tracing::{debug, trace};

pub use constants::{DNSRcode, Opcode};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    /// Question section; the zone section of an UPDATE
    pub questions: Vec<DNSQuestion>,
    /// Answer section; the prerequisite section of an UPDATE
    pub answers: Vec<DNSResource>,
    /// Authority section; the update section of an UPDATE
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
}

#[derive(Debug)]
pub enum ParseError {
    InvalidHeader,
    InvalidLabel,
    InvalidQuestionSection,
    InvalidAnswerSection,
    InvalidAuthoritySection,
    InvalidAdditionalSection,
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidHeader => write!(f, "Invalid DNS header"),
            ParseError::InvalidLabel => write!(f, "Invalid DNS label"),
            ParseError::InvalidQuestionSection => write!(f, "Invalid question section"),
            ParseError::InvalidAnswerSection => write!(f, "Invalid answer section"),
            ParseError::InvalidAuthoritySection => write!(f, "Invalid authority section"),
            ParseError::InvalidAdditionalSection => write!(f, "Invalid additional section"),
            ParseError::InvalidBitStream(e) => write!(f, "Invalid bit stream: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl DNSPacket {
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut packet = DNSPacket::default();
        packet
            .header
            .read(&mut reader)
            .map_err(|_| ParseError::InvalidHeader)?;
        debug!(
            "Parsed DNS header: id={}, qr={}, opcode={}, rcode={}",
            packet.header.id, packet.header.qr, packet.header.opcode, packet.header.rcode
        );

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question.read_with_buffer(&mut reader, buf)?;
            packet.questions.push(question);
        }

        for _ in 0..packet.header.ancount {
            let mut answer = DNSResource::default();
            answer.read_with_buffer(&mut reader, buf)?;
            packet.answers.push(answer);
        }

        for _ in 0..packet.header.nscount {
            let mut authority = DNSResource::default();
            authority.read_with_buffer(&mut reader, buf)?;
            packet.authorities.push(authority);
        }

        for _ in 0..packet.header.arcount {
            let mut resource = DNSResource::default();
            resource.read_with_buffer(&mut reader, buf)?;
            packet.resources.push(resource);
        }

        Ok(packet)
    }

    /// Serialize without name compression; section counts come from the sections
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        {
            let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

            let mut header = self.header.clone();
            header.qdcount = self.questions.len() as u16;
            header.ancount = self.answers.len() as u16;
            header.nscount = self.authorities.len() as u16;
            header.arcount = self.resources.len() as u16;
            header.write(&mut writer)?;

            for question in self.questions.iter() {
                question.write(&mut writer)?;
            }
            for answer in self.answers.iter() {
                answer.write(&mut writer)?;
            }
            for authority in self.authorities.iter() {
                authority.write(&mut writer)?;
            }
            for resource in self.resources.iter() {
                resource.write(&mut writer)?;
            }
        }

        Ok(buf)
    }

    pub fn rcode(&self) -> u16 {
        self.header.rcode as u16
    }

    pub fn opcode(&self) -> Opcode {
        Opcode::from(self.header.opcode)
    }

    /// The TSIG record, which must be the last additional record when present
    pub fn tsig(&self) -> Option<&DNSResource> {
        self.resources
            .last()
            .filter(|rr| rr.rtype == enums::DNSResourceType::TSIG)
    }
}
