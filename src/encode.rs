use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The payload does not fit in the extended header's 10-bit size field.
    #[error("Logical packet payload of {len} bytes exceeds the 10-bit size field")]
    PayloadTooLarge { len: usize },

    /// The size field counts 16-bit words, so an odd byte length cannot be
    /// declared.
    #[error("Logical packet payload of {len} bytes is not a whole number of 16-bit words")]
    OddPayloadLength { len: usize },
}

/// A trait that allows for encoding a structure into a byte sequence.
///
/// Decoding followed by encoding reproduces the original buffer
/// byte-for-byte for well-formed, 4-byte-aligned packets; pad bytes are
/// re-emitted as zeros.
pub trait Encode {
    /// Encodes a structure into a byte sequence.
    fn encode(&self) -> Result<Vec<u8>, EncodeError>;
    fn into_encoded(self) -> Result<Vec<u8>, EncodeError>
    where
        Self: Sized,
    {
        self.encode()
    }
}
