//! Crate for decoding USB captures of POWER-Z KM003C USB-PD power meters.
//!
//! Three independent decoders make up the crate, each a pure function over
//! already-captured data:
//!
//! - [`packet`] parses one application-layer message into a
//!   [`Packet`](packet::Packet): a control packet, a simple data record, or
//!   a data record carrying a chain of self-describing logical packets.
//! - [`events`] unwraps the USB-PD event stream the device embeds in its
//!   telemetry payloads, best-effort, tolerating blobs clipped by the
//!   capture tool.
//! - [`transaction`] groups a chronological URB frame stream into logical
//!   request/response [`Transaction`](transaction::Transaction)s.
//!
//! Packet decoding is built around the [`Decode`](decode::Decode) and
//! [`Encode`](encode::Encode) traits; decoding a well-formed packet and
//! encoding it again reproduces the captured bytes exactly.
//!
//! Capture ingestion, persistence, and the semantics of PD messages and ADC
//! samples live in separate tooling; this crate hands their bytes through
//! untouched.

pub mod capture;
pub mod decode;
pub mod encode;
pub mod events;
pub mod packet;
pub mod transaction;
