//! The device's application-layer packet protocol.
//!
//! Every message begins with a fixed 4-byte [`PacketHeader`]. The 7-bit type
//! code selects one of three shapes: control packets and unknown codes carry
//! an opaque payload, `Head` records carry a fixed-layout payload, and
//! `PutData` records carry a chain of self-describing [`LogicalPacket`]s.
//! [`Packet::decode`] resolves the chain; [`RawPacket::decode`] leaves the
//! body untouched for diagnosing malformed or experimental payloads.

pub mod header;
pub mod logical;

pub use header::{Attribute, PacketHeader, PacketType};
pub use logical::{ExtendedHeader, LogicalPacket};

use crate::decode::{Decode, DecodeError};
use crate::encode::{Encode, EncodeError};

/// A fully decoded application packet.
///
/// Exactly one variant is produced per decode, selected purely by the
/// header's packet type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Control request or reply, or any unknown type code. The payload is
    /// opaque.
    Ctrl {
        header: PacketHeader,
        payload: Vec<u8>,
    },
    /// Data record whose payload has a fixed layout rather than a logical
    /// packet chain.
    SimpleData {
        header: PacketHeader,
        payload: Vec<u8>,
    },
    /// Data record carrying one or more chained logical packets.
    Data {
        header: PacketHeader,
        logical_packets: Vec<LogicalPacket>,
    },
}

impl Packet {
    pub fn header(&self) -> &PacketHeader {
        match self {
            Self::Ctrl { header, .. } => header,
            Self::SimpleData { header, .. } => header,
            Self::Data { header, .. } => header,
        }
    }

    /// Builds a control request carrying an attribute id, e.g. a `GetData`
    /// poll for ADC or PD data.
    pub fn ctrl_request(packet_type: PacketType, id: u8, attribute: Attribute) -> Self {
        Self::Ctrl {
            header: PacketHeader {
                packet_type,
                reserved_flag: false,
                id,
                raw_attribute: attribute.raw(),
            },
            payload: Vec::new(),
        }
    }
}

impl Decode for Packet {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let header = PacketHeader::decode(data)?;

        if header.packet_type.is_chained() {
            let logical_packets = logical::decode_chain(data)?;
            return Ok(Self::Data {
                header,
                logical_packets,
            });
        }

        let payload = take_rest(data);
        if header.packet_type.is_simple_data() {
            Ok(Self::SimpleData { header, payload })
        } else {
            Ok(Self::Ctrl { header, payload })
        }
    }
}

impl Encode for Packet {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut encoded = self.header().encode()?;
        match self {
            Self::Ctrl { payload, .. } | Self::SimpleData { payload, .. } => {
                encoded.extend_from_slice(payload);
            }
            Self::Data {
                logical_packets, ..
            } => {
                for packet in logical_packets {
                    encoded.extend(packet.encode()?);
                }
            }
        }
        Ok(encoded)
    }
}

/// A packet with its body left uninterpreted: the header fields plus every
/// remaining byte, chain structure ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl Decode for RawPacket {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let header = PacketHeader::decode(data)?;
        let payload = take_rest(data);
        Ok(Self { header, payload })
    }
}

fn take_rest(data: &mut &[u8]) -> Vec<u8> {
    let rest = data.to_vec();
    *data = &[];
    rest
}

/// Decodes one application packet from a byte buffer.
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, DecodeError> {
    let mut data = bytes;
    Packet::decode(&mut data)
}

/// Decodes only the header of an application packet, keeping the body as
/// raw bytes. Useful when chain validation would get in the way, e.g. on
/// malformed captures.
pub fn decode_raw_packet(bytes: &[u8]) -> Result<RawPacket, DecodeError> {
    let mut data = bytes;
    RawPacket::decode(&mut data)
}

#[cfg(test)]
mod tests {
    use super::{decode_packet, decode_raw_packet, Attribute, Packet, PacketType};
    use crate::decode::DecodeError;
    use crate::encode::Encode;

    #[test]
    fn sync_packet_decodes_as_ctrl() {
        let packet = decode_packet(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]).unwrap();

        let Packet::Ctrl { header, payload } = packet else {
            panic!("expected a control packet, got {packet:?}");
        };
        assert_eq!(header.packet_type, PacketType::Sync);
        assert_eq!(header.id, 2);
        assert!(!header.reserved_flag);
        assert_eq!(payload, &[0x05, 0x06, 0x07, 0x08]);
    }

    #[test]
    fn short_buffers_fail_with_truncated_header() {
        for len in 0..4 {
            assert_eq!(
                decode_packet(&[0u8; 4][..len]),
                Err(DecodeError::TruncatedHeader),
                "buffer of {len} bytes"
            );
        }
    }

    #[test]
    fn put_data_resolves_a_single_logical_packet() {
        let mut raw = vec![0x81, 0x00, 0x00, 0x00]; // PutData, reserved bit set
        raw.extend_from_slice(&[0x01, 0x00, 0x08, 0x00]); // attribute 1, 8 words
        raw.extend_from_slice(&[0x11; 16]);

        let packet = decode_packet(&raw).unwrap();
        let Packet::Data {
            header,
            logical_packets,
        } = &packet
        else {
            panic!("expected a data packet, got {packet:?}");
        };

        assert_eq!(header.packet_type, PacketType::PutData);
        assert!(header.reserved_flag);
        assert_eq!(logical_packets.len(), 1);

        let lp = &logical_packets[0];
        assert_eq!(lp.attribute(), Attribute::Adc);
        assert!(!lp.next);
        assert_eq!(lp.chunk, 0);
        assert_eq!(lp.size(), 8);
        assert_eq!(lp.payload.len(), lp.size() as usize * 2);
    }

    #[test]
    fn data_packet_round_trips() {
        let first: u32 = 0x0001 | (1 << 15) | (8 << 16);
        let second: u32 = 0x0010 | (3 << 16) | (1 << 26);

        let mut raw = vec![0x41, 0x07, 0x00, 0x00];
        raw.extend_from_slice(&first.to_le_bytes());
        raw.extend((0..16).map(|b| b as u8));
        raw.extend_from_slice(&second.to_le_bytes());
        raw.extend_from_slice(&[1, 2, 3, 4, 5, 6, 0, 0]);

        let packet = decode_packet(&raw).unwrap();
        assert_eq!(packet.encode().unwrap(), raw);
    }

    #[test]
    fn data_packet_with_empty_body_is_rejected() {
        assert_eq!(
            decode_packet(&[0x41, 0x00, 0x00, 0x00]),
            Err(DecodeError::TruncatedPayload)
        );
    }

    #[test]
    fn truncated_chain_is_an_error_but_raw_mode_is_not() {
        let mut raw = vec![0x41, 0x00, 0x00, 0x00];
        raw.extend_from_slice(&[0x01, 0x00, 0x08, 0x00]); // declares 16 bytes
        raw.extend_from_slice(&[0xEE; 4]); // only 4 present

        assert_eq!(
            decode_packet(&raw),
            Err(DecodeError::InvalidChainLength {
                declared: 16,
                remaining: 4
            })
        );

        let packet = decode_raw_packet(&raw).unwrap();
        assert_eq!(packet.header.packet_type, PacketType::PutData);
        assert_eq!(packet.payload.len(), 8);
    }

    #[test]
    fn unknown_type_codes_decode_as_opaque_ctrl() {
        let packet = decode_packet(&[0x44, 0x01, 0x00, 0x00, 0xDE, 0xAD]).unwrap();
        let Packet::Ctrl { header, payload } = packet else {
            panic!("expected a control packet");
        };
        assert_eq!(header.packet_type, PacketType::Unknown(0x44));
        assert_eq!(payload, &[0xDE, 0xAD]);
    }

    #[test]
    fn head_packet_decodes_as_simple_data() {
        let packet = decode_packet(&[0x40, 0x09, 0x01, 0x00, 0xAA, 0xBB]).unwrap();
        assert!(matches!(packet, Packet::SimpleData { .. }));
        assert_eq!(packet.header().attribute(), Attribute::Adc);
    }

    #[test]
    fn ctrl_request_encodes_a_get_data_poll() {
        let request = Packet::ctrl_request(PacketType::GetData, 0x0B, Attribute::Adc);
        assert_eq!(request.encode().unwrap(), &[0x0C, 0x0B, 0x01, 0x00]);
    }
}
