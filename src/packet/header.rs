use crate::decode::{self, Decode, DecodeError};
use crate::encode::{Encode, EncodeError};

/// Known packet type codes.
///
/// Codes below [`DATA_CLASS`](codes::DATA_CLASS) are control requests and
/// replies; codes at or above it carry data records.
#[allow(unused)]
pub(crate) mod codes {
    pub const SYNC: u8 = 0x01;
    pub const CONNECT: u8 = 0x02;
    pub const DISCONNECT: u8 = 0x03;
    pub const RESET: u8 = 0x04;
    pub const ACCEPT: u8 = 0x05;
    pub const REJECTED: u8 = 0x06;
    pub const FINISHED: u8 = 0x07;
    pub const JUMP_APROM: u8 = 0x08;
    pub const JUMP_DFU: u8 = 0x09;
    pub const GET_STATUS: u8 = 0x0A;
    pub const ERROR: u8 = 0x0B;
    pub const GET_DATA: u8 = 0x0C;
    pub const GET_FILE: u8 = 0x0D;

    pub const HEAD: u8 = 0x40;
    pub const PUT_DATA: u8 = 0x41;

    pub const DATA_CLASS: u8 = 0x40;
}

/// The 7-bit packet type code from the first header byte.
///
/// The enumeration is closed: codes the device family is not known to send
/// decode as [`Unknown`](PacketType::Unknown) and are treated as opaque
/// control packets rather than rejected, so captures of undocumented
/// firmware behavior stay inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketType {
    Sync,
    Connect,
    Disconnect,
    Reset,
    Accept,
    Rejected,
    Finished,
    JumpAprom,
    JumpDfu,
    GetStatus,
    Error,
    GetData,
    GetFile,
    /// Fixed-layout data record; the payload is not subdivided.
    Head,
    /// Data record whose body is a chain of logical packets.
    PutData,
    Unknown(u8),
}

impl PacketType {
    pub const fn from_code(code: u8) -> Self {
        match code {
            codes::SYNC => Self::Sync,
            codes::CONNECT => Self::Connect,
            codes::DISCONNECT => Self::Disconnect,
            codes::RESET => Self::Reset,
            codes::ACCEPT => Self::Accept,
            codes::REJECTED => Self::Rejected,
            codes::FINISHED => Self::Finished,
            codes::JUMP_APROM => Self::JumpAprom,
            codes::JUMP_DFU => Self::JumpDfu,
            codes::GET_STATUS => Self::GetStatus,
            codes::ERROR => Self::Error,
            codes::GET_DATA => Self::GetData,
            codes::GET_FILE => Self::GetFile,
            codes::HEAD => Self::Head,
            codes::PUT_DATA => Self::PutData,
            code => Self::Unknown(code),
        }
    }

    pub const fn code(&self) -> u8 {
        match self {
            Self::Sync => codes::SYNC,
            Self::Connect => codes::CONNECT,
            Self::Disconnect => codes::DISCONNECT,
            Self::Reset => codes::RESET,
            Self::Accept => codes::ACCEPT,
            Self::Rejected => codes::REJECTED,
            Self::Finished => codes::FINISHED,
            Self::JumpAprom => codes::JUMP_APROM,
            Self::JumpDfu => codes::JUMP_DFU,
            Self::GetStatus => codes::GET_STATUS,
            Self::Error => codes::ERROR,
            Self::GetData => codes::GET_DATA,
            Self::GetFile => codes::GET_FILE,
            Self::Head => codes::HEAD,
            Self::PutData => codes::PUT_DATA,
            Self::Unknown(code) => *code,
        }
    }

    /// Whether the packet body is a chain of logical packets.
    pub const fn is_chained(&self) -> bool {
        matches!(self, Self::PutData)
    }

    /// Whether the packet is a data record without logical packet chaining.
    pub const fn is_simple_data(&self) -> bool {
        matches!(self, Self::Head)
    }
}

/// A 15-bit attribute id naming the kind of data a request asks for or a
/// logical packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Attribute {
    None,
    /// Instantaneous ADC sample set (VBUS/IBUS, averages, CC/DP/DM lines).
    Adc,
    /// Buffered ADC sample stream.
    AdcQueue,
    /// Buffered ADC sample stream at the 10 kHz rate.
    AdcQueue10k,
    Settings,
    /// Wrapped USB-PD event stream.
    PdPacket,
    PdStatus,
    QcPacket,
    Unknown(u16),
}

impl Attribute {
    /// Classifies the low 15 bits of an attribute word.
    pub const fn from_raw(raw: u16) -> Self {
        match raw & 0x7FFF {
            0x0000 => Self::None,
            0x0001 => Self::Adc,
            0x0002 => Self::AdcQueue,
            0x0004 => Self::AdcQueue10k,
            0x0008 => Self::Settings,
            0x0010 => Self::PdPacket,
            0x0020 => Self::PdStatus,
            0x0040 => Self::QcPacket,
            raw => Self::Unknown(raw),
        }
    }

    pub const fn raw(&self) -> u16 {
        match self {
            Self::None => 0x0000,
            Self::Adc => 0x0001,
            Self::AdcQueue => 0x0002,
            Self::AdcQueue10k => 0x0004,
            Self::Settings => 0x0008,
            Self::PdPacket => 0x0010,
            Self::PdStatus => 0x0020,
            Self::QcPacket => 0x0040,
            Self::Unknown(raw) => *raw,
        }
    }
}

/// The fixed 4-byte prefix of every application packet.
///
/// Layout, little-endian:
///
/// - byte 0: bits 0-6 packet type code, bit 7 [`reserved_flag`](Self::reserved_flag)
/// - byte 1: sender-chosen transaction tag
/// - bytes 2-3: attribute word; bit 15 unused on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketHeader {
    pub packet_type: PacketType,

    /// Top bit of the first header byte. Historically read as an "extended"
    /// marker; carried verbatim and never consulted when selecting how to
    /// parse the body.
    pub reserved_flag: bool,

    /// Transaction tag chosen by the sender to correlate replies.
    pub id: u8,

    /// The attribute word exactly as it appears on the wire, unused bit
    /// included, so re-encoding is byte-exact.
    pub raw_attribute: u16,
}

impl PacketHeader {
    pub const LEN: usize = 4;

    pub const fn attribute(&self) -> Attribute {
        Attribute::from_raw(self.raw_attribute)
    }
}

impl Decode for PacketHeader {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = decode::take(data, Self::LEN).ok_or(DecodeError::TruncatedHeader)?;

        Ok(Self {
            packet_type: PacketType::from_code(bytes[0] & 0x7F),
            reserved_flag: bytes[0] & 0x80 != 0,
            id: bytes[1],
            raw_attribute: u16::from_le_bytes([bytes[2], bytes[3]]),
        })
    }
}

impl Encode for PacketHeader {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut encoded = vec![self.packet_type.code() | ((self.reserved_flag as u8) << 7), self.id];
        encoded.extend(self.raw_attribute.to_le_bytes());
        Ok(encoded)
    }
}
