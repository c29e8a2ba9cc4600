use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::{PacketComponent, decode_name, encode_name, name_to_labels},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdlength: u16,
    /// RDATA in uncompressed wire form
    pub rdata: Vec<u8>,
}

impl DNSResource {
    pub fn new(
        name: &str,
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
        ttl: u32,
        rdata: Vec<u8>,
    ) -> Self {
        Self {
            labels: name_to_labels(name),
            rtype,
            rclass,
            ttl,
            rdlength: rdata.len() as u16,
            rdata,
        }
    }

    /// Rewrite domain names embedded in RDATA without compression pointers.
    ///
    /// Only the types RFC 3597 allows to be compressed are touched; everything
    /// else is kept byte for byte.
    fn expand_rdata(&mut self, packet_buf: &[u8]) -> Result<(), ParseError> {
        let raw = &self.rdata;
        let expanded = match self.rtype {
            DNSResourceType::CNAME | DNSResourceType::NS | DNSResourceType::PTR => {
                let (labels, _) = decode_name(raw, 0, Some(packet_buf))?;
                encode_name(&labels)?
            }
            DNSResourceType::MX => {
                let preference = raw.get(..2).ok_or(ParseError::InvalidAnswerSection)?;
                let (labels, _) = decode_name(raw, 2, Some(packet_buf))?;
                let mut out = preference.to_vec();
                out.extend(encode_name(&labels)?);
                out
            }
            DNSResourceType::SOA => {
                let (mname, used_m) = decode_name(raw, 0, Some(packet_buf))?;
                let (rname, used_r) = decode_name(raw, used_m, Some(packet_buf))?;
                let counters = raw
                    .get(used_m + used_r..)
                    .filter(|rest| rest.len() == 20)
                    .ok_or(ParseError::InvalidAnswerSection)?;
                let mut out = encode_name(&mname)?;
                out.extend(encode_name(&rname)?);
                out.extend_from_slice(counters);
                out
            }
            _ => return Ok(()),
        };

        self.rdlength = expanded.len() as u16;
        self.rdata = expanded;
        Ok(())
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        if self.rdata.len() > u16::MAX as usize {
            return Err(ParseError::InvalidBitStream("RDATA too long".to_string()));
        }
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, self.rdata.len() as u16)?;
        writer.write_bytes(&self.rdata)?;
        Ok(())
    }

    fn read<E: Endianness>(&mut self, reader: &mut BitReader<&[u8], E>) -> Result<(), ParseError> {
        self.labels = self.read_labels(reader)?;
        self.read_fixed(reader)
    }

    fn read_with_buffer<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
    ) -> Result<(), ParseError> {
        self.labels = self.read_labels_with_buffer(reader, Some(packet_buf))?;
        self.read_fixed(reader)?;
        self.expand_rdata(packet_buf)
    }
}

impl DNSResource {
    fn read_fixed<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
    ) -> Result<(), ParseError> {
        self.rtype = reader.read_var::<u16>(16)?.into();
        self.rclass = reader.read_var::<u16>(16)?.into();
        self.ttl = reader.read_var::<u32>(32)?;
        self.rdlength = reader.read_var::<u16>(16)?;
        let mut buf = vec![0_u8; self.rdlength as usize];
        reader.read_bytes(&mut buf)?;
        self.rdata = buf;
        Ok(())
    }
}
