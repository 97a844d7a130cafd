use crate::decode::{self, Decode, DecodeError};
use crate::encode::{Encode, EncodeError};
use crate::packet::header::Attribute;

/// The 4-byte sub-header in front of each logical packet payload, one
/// little-endian u32:
///
/// - bits 0-14: attribute id
/// - bit 15: more logical packets follow
/// - bits 16-25: payload size, counted in 16-bit words
/// - bits 26-31: chunk counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub raw_attribute: u16,
    pub next: bool,
    /// Declared payload size in 16-bit words; see [`payload_len`](Self::payload_len)
    /// for the byte length.
    pub size: u16,
    pub chunk: u8,
}

impl ExtendedHeader {
    pub const LEN: usize = 4;

    pub const fn attribute(&self) -> Attribute {
        Attribute::from_raw(self.raw_attribute)
    }

    /// Payload byte length declared by `size`, before padding.
    pub const fn payload_len(&self) -> usize {
        self.size as usize * 2
    }

    /// Payload byte length including pad bytes up to the next 4-byte
    /// boundary.
    pub const fn padded_len(&self) -> usize {
        (self.payload_len() + 3) & !3
    }
}

impl Decode for ExtendedHeader {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = decode::take(data, Self::LEN).ok_or(DecodeError::TruncatedPayload)?;
        let word = u32::from_le_bytes(bytes.try_into().unwrap());

        Ok(Self {
            raw_attribute: (word & 0x7FFF) as u16,
            next: word & (1 << 15) != 0,
            size: ((word >> 16) & 0x3FF) as u16,
            chunk: (word >> 26) as u8,
        })
    }
}

impl Encode for ExtendedHeader {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        if self.size > 0x3FF {
            return Err(EncodeError::PayloadTooLarge {
                len: self.size as usize * 2,
            });
        }

        let word = (self.raw_attribute as u32 & 0x7FFF)
            | ((self.next as u32) << 15)
            | ((self.size as u32) << 16)
            | ((self.chunk as u32 & 0x3F) << 26);
        Ok(word.to_le_bytes().to_vec())
    }
}

/// One link in the chain inside a `PutData` packet body: an extended header
/// followed by its payload, padded on the wire to a 4-byte boundary.
///
/// Pad bytes are skipped during decoding and never part of
/// [`payload`](Self::payload). Chain order and chunk indices are preserved
/// exactly as received; consumers that reassemble multi-chunk data do their
/// own ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalPacket {
    pub raw_attribute: u16,
    /// Whether another logical packet follows this one.
    pub next: bool,
    pub chunk: u8,
    pub payload: Vec<u8>,
}

impl LogicalPacket {
    pub fn attribute(&self) -> Attribute {
        Attribute::from_raw(self.raw_attribute)
    }

    /// Declared payload size in 16-bit words.
    pub fn size(&self) -> u16 {
        (self.payload.len() / 2) as u16
    }
}

impl Decode for LogicalPacket {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let header = ExtendedHeader::decode(data)?;

        let len = header.payload_len();
        if len > data.len() {
            return Err(DecodeError::InvalidChainLength {
                declared: len,
                remaining: data.len(),
            });
        }
        let payload = decode::take(data, len)
            .ok_or(DecodeError::TruncatedPayload)?
            .to_vec();

        // A final chunk may end flush with the buffer, pad and all missing.
        let pad = (header.padded_len() - len).min(data.len());
        let _ = decode::take(data, pad);

        Ok(Self {
            raw_attribute: header.raw_attribute,
            next: header.next,
            chunk: header.chunk,
            payload,
        })
    }
}

impl Encode for LogicalPacket {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let len = self.payload.len();
        if len % 2 != 0 {
            return Err(EncodeError::OddPayloadLength { len });
        }
        if len / 2 > 0x3FF {
            return Err(EncodeError::PayloadTooLarge { len });
        }

        let header = ExtendedHeader {
            raw_attribute: self.raw_attribute,
            next: self.next,
            size: (len / 2) as u16,
            chunk: self.chunk,
        };

        let mut encoded = header.encode()?;
        encoded.extend_from_slice(&self.payload);
        encoded.resize(ExtendedHeader::LEN + header.padded_len(), 0);
        Ok(encoded)
    }
}

/// Walks a `PutData` body, collecting logical packets until one clears its
/// `next` bit or the buffer runs out, whichever comes first. At least one
/// logical packet must be present.
pub(crate) fn decode_chain(data: &mut &[u8]) -> Result<Vec<LogicalPacket>, DecodeError> {
    let mut packets = Vec::new();
    loop {
        let packet = LogicalPacket::decode(data)?;
        let more = packet.next;
        packets.push(packet);
        if !more || data.is_empty() {
            break;
        }
    }
    Ok(packets)
}
