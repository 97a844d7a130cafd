//! Extraction of USB-PD events from the device's wrapped telemetry blobs.
//!
//! A `PdPacket` logical-packet payload holds a 12-byte metadata preamble and
//! then a run of records, each introduced by a marker byte: 0x45 for a
//! connection/status record, 0x80-0x9F for a PD wire message. Capture tools
//! are known to clip these blobs, so extraction is best-effort by contract:
//! [`extract_events`] never fails, it returns everything parsed up to the
//! first unrecognized or truncated record together with the reason it
//! stopped.

use log::debug;

/// Marker byte of a 6-byte connection/status record.
pub const STATUS_MARKER: u8 = 0x45;

/// Byte length of the metadata preamble at the start of a `PdPacket`
/// payload, before the first event marker.
pub const PD_PREAMBLE_LEN: usize = 12;

/// Framing overhead included in a wire event's 6-bit size code.
const WIRE_SIZE_OVERHEAD: u8 = 5;

/// A 6-byte connection/status record. Carries no PD wire payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusEvent {
    pub timestamp: u32,
    pub sop: u8,
}

/// A captured USB-PD message: 6-byte event header plus the exact wire bytes
/// (PD header and data objects). The wire content is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WireEvent {
    pub timestamp: u32,
    /// Start-of-Packet type the message was seen on.
    pub sop: u8,
    /// The raw size/flag byte; bits 0-5 carry the size code the wire length
    /// was derived from.
    pub size_flag: u8,
    pub wire: Vec<u8>,
}

/// One decoded unit of a telemetry blob.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PdEvent {
    Status(StatusEvent),
    Wire(WireEvent),
}

/// Why [`extract_events`] stopped reading a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// The blob was consumed exactly.
    EndOfInput,
    /// A record at `offset` would read past the end of the blob.
    Truncated { offset: usize },
    /// The event header at `offset` declared a wire length of zero.
    EmptyWire { offset: usize },
    /// The byte at `offset` is not a known record marker. No
    /// resynchronization marker exists for this format, so the rest of the
    /// blob is dropped.
    UnknownMarker { offset: usize, marker: u8 },
}

/// The parsed prefix of one telemetry blob plus the reason extraction
/// stopped. Partial results are expected, not exceptional.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extraction {
    pub events: Vec<PdEvent>,
    pub stop: StopReason,
}

impl Extraction {
    /// Whether the whole blob was consumed without a soft stop.
    pub fn is_complete(&self) -> bool {
        self.stop == StopReason::EndOfInput
    }

    pub fn into_events(self) -> Vec<PdEvent> {
        self.events
    }
}

/// Returns the event region of a `PdPacket` logical-packet payload, with the
/// fixed metadata preamble stripped. Empty if the payload is shorter than
/// the preamble.
pub fn pd_event_region(payload: &[u8]) -> &[u8] {
    payload.get(PD_PREAMBLE_LEN..).unwrap_or(&[])
}

/// Parses one telemetry blob into its event sequence.
///
/// Each blob is finite and non-restartable; callers holding one blob per
/// capture row run this once per blob and concatenate in source order.
pub fn extract_events(blob: &[u8]) -> Extraction {
    let mut events = Vec::new();
    let mut i = 0;

    let stop = loop {
        if i >= blob.len() {
            break StopReason::EndOfInput;
        }

        match blob[i] {
            STATUS_MARKER => {
                if i + 6 > blob.len() {
                    break StopReason::Truncated { offset: i };
                }
                events.push(PdEvent::Status(StatusEvent {
                    timestamp: read_u32_le(&blob[i + 1..i + 5]),
                    sop: blob[i + 5],
                }));
                i += 6;
            }
            size_flag @ 0x80..=0x9F => {
                if i + 6 > blob.len() {
                    break StopReason::Truncated { offset: i };
                }
                let wire_len = (size_flag & 0x3F).saturating_sub(WIRE_SIZE_OVERHEAD) as usize;
                if wire_len == 0 {
                    break StopReason::EmptyWire { offset: i };
                }
                if i + 6 + wire_len > blob.len() {
                    break StopReason::Truncated { offset: i };
                }
                events.push(PdEvent::Wire(WireEvent {
                    timestamp: read_u32_le(&blob[i + 1..i + 5]),
                    sop: blob[i + 5],
                    size_flag,
                    wire: blob[i + 6..i + 6 + wire_len].to_vec(),
                }));
                i += 6 + wire_len;
            }
            marker => break StopReason::UnknownMarker { offset: i, marker },
        }
    };

    if stop != StopReason::EndOfInput {
        debug!(
            "pd event extraction stopped after {} events: {:?}",
            events.len(),
            stop
        );
    }

    Extraction { events, stop }
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes.try_into().unwrap())
}
