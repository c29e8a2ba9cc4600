use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::ParseError;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;
// Bounds pointer chasing so a looping compression pointer cannot spin forever
const MAX_POINTER_HOPS: usize = 64;

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;
    fn read<E: Endianness>(&mut self, reader: &mut BitReader<&[u8], E>) -> Result<(), ParseError>;

    /// Read a component whose names may use compression pointers into `packet_buf`
    fn read_with_buffer<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        _packet_buf: &[u8],
    ) -> Result<(), ParseError> {
        self.read(reader)
    }

    fn read_labels<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
    ) -> Result<Vec<String>, ParseError> {
        self.read_labels_with_buffer(reader, None)
    }

    fn read_labels_with_buffer<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: Option<&[u8]>,
    ) -> Result<Vec<String>, ParseError> {
        let mut labels = Vec::new();
        loop {
            let label_len = reader.read_var::<u8>(8)?;
            if label_len == 0 {
                labels.push(String::new());
                break;
            }
            if label_len & 0xC0 == 0xC0 {
                let low = reader.read_var::<u8>(8)?;
                let offset = (((label_len & 0x3F) as usize) << 8) | low as usize;
                let packet = packet_buf.ok_or(ParseError::InvalidLabel)?;
                let (rest, _) = decode_name(packet, offset, Some(packet))?;
                labels.extend(rest);
                break;
            }
            if label_len as usize > MAX_LABEL_LEN {
                return Err(ParseError::InvalidLabel);
            }
            let mut buf = vec![0; label_len as usize];
            reader.read_bytes(&mut buf)?;
            let label = String::from_utf8(buf).map_err(|_| ParseError::InvalidLabel)?;
            labels.push(label);
        }

        Ok(labels)
    }

    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[String],
    ) -> Result<(), ParseError> {
        writer.write_bytes(&encode_name(labels)?)?;
        Ok(())
    }
}

/// Split a textual domain name into labels, terminated by the empty root label
pub fn name_to_labels(name: &str) -> Vec<String> {
    let mut labels: Vec<String> = name
        .split('.')
        .filter(|label| !label.is_empty())
        .map(|label| label.to_string())
        .collect();
    labels.push(String::new());
    labels
}

/// Join labels back into an absolute name with a trailing dot
pub fn labels_to_name(labels: &[String]) -> String {
    let joined = labels
        .iter()
        .filter(|label| !label.is_empty())
        .map(|label| label.as_str())
        .collect::<Vec<_>>()
        .join(".");
    format!("{}.", joined)
}

/// Make a name absolute by appending the root dot if it is missing
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Encode labels to uncompressed wire format
pub fn encode_name(labels: &[String]) -> Result<Vec<u8>, ParseError> {
    let mut encoded = Vec::new();
    for label in labels.iter().filter(|label| !label.is_empty()) {
        if label.len() > MAX_LABEL_LEN {
            return Err(ParseError::InvalidLabel);
        }
        encoded.push(label.len() as u8);
        encoded.extend_from_slice(label.as_bytes());
    }
    encoded.push(0);

    if encoded.len() > MAX_NAME_LEN {
        return Err(ParseError::InvalidLabel);
    }
    Ok(encoded)
}

/// Decode a possibly compressed name starting at `start` in `local`.
///
/// Inline labels are read from `local`; compression pointers are resolved
/// against `packet`. Returns the labels (ending in the root label) and the
/// number of bytes the name occupies in `local`.
pub fn decode_name(
    local: &[u8],
    start: usize,
    packet: Option<&[u8]>,
) -> Result<(Vec<String>, usize), ParseError> {
    let mut labels = Vec::new();
    let mut buf = local;
    let mut pos = start;
    let mut consumed = None;
    let mut hops = 0;
    let mut name_len = 0;

    loop {
        let len = *buf.get(pos).ok_or(ParseError::InvalidLabel)? as usize;
        if len == 0 {
            labels.push(String::new());
            pos += 1;
            break;
        }
        if len & 0xC0 == 0xC0 {
            let low = *buf.get(pos + 1).ok_or(ParseError::InvalidLabel)? as usize;
            if consumed.is_none() {
                consumed = Some(pos + 2 - start);
            }
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(ParseError::InvalidLabel);
            }
            buf = packet.ok_or(ParseError::InvalidLabel)?;
            pos = ((len & 0x3F) << 8) | low;
            continue;
        }
        if len > MAX_LABEL_LEN {
            return Err(ParseError::InvalidLabel);
        }
        let bytes = buf
            .get(pos + 1..pos + 1 + len)
            .ok_or(ParseError::InvalidLabel)?;
        name_len += len + 1;
        if name_len > MAX_NAME_LEN {
            return Err(ParseError::InvalidLabel);
        }
        labels.push(String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::InvalidLabel)?);
        pos += len + 1;
    }

    Ok((labels, consumed.unwrap_or(pos - start)))
}
