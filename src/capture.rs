//! The URB capture frame model consumed by transaction reconstruction.
//!
//! Frames come from an external trace-ingestion step (pcap/JSONL/Parquet
//! tooling) already flattened to one record per URB submit or completion.
//! This crate treats them as immutable inputs: reconstruction groups and
//! tags frames but never rewrites their fields.

/// Whether a frame records the submission or the completion of a URB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UrbType {
    /// An `S` frame: the host handed a URB to the kernel.
    Submit,
    /// A `C` frame: the URB completed (or was cancelled).
    Complete,
}

/// USB transfer type of a captured URB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferType {
    Isochronous,
    Interrupt,
    Control,
    Bulk,
    Unknown(u8),
}

impl TransferType {
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Isochronous,
            0x01 => Self::Interrupt,
            0x02 => Self::Control,
            0x03 => Self::Bulk,
            code => Self::Unknown(code),
        }
    }

    pub const fn code(&self) -> u8 {
        match self {
            Self::Isochronous => 0x00,
            Self::Interrupt => 0x01,
            Self::Control => 0x02,
            Self::Bulk => 0x03,
            Self::Unknown(code) => *code,
        }
    }
}

/// One submit or completion record from the USB trace.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaptureFrame {
    /// Position of the frame in the capture, ascending.
    pub frame_number: u64,
    /// Capture-relative timestamp in seconds.
    pub timestamp: f64,
    /// Kernel URB identity; correlates a submit with its completion.
    pub urb_id: u64,
    pub urb_type: UrbType,
    pub transfer_type: TransferType,
    /// Raw endpoint address; bit 7 set means device-to-host.
    pub endpoint_address: u8,
    /// URB completion status; `-2` is a cancelled transfer.
    pub urb_status: i32,
    /// Byte length of the frame's data stage.
    pub data_length: u32,
    /// Data stage bytes as captured, hex-encoded. Empty when the frame has
    /// no data stage.
    pub payload_hex: String,
}

impl CaptureFrame {
    /// Whether the endpoint direction is device-to-host.
    pub fn is_in(&self) -> bool {
        self.endpoint_address & 0x80 != 0
    }

    /// Whether the endpoint direction is host-to-device.
    pub fn is_out(&self) -> bool {
        !self.is_in()
    }

    /// Decodes the hex-encoded data stage.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.payload_hex)
    }
}
