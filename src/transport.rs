use std::io::{self, Read, Write};

use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint},
    decode_from_std_read, encode_into_std_write,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode payload: {0}")]
    Serialize(#[from] bincode::error::EncodeError),
    #[error("failed to decode payload: {0}")]
    Deserialize(#[from] bincode::error::DecodeError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

/// Payload codec layered directly on a bidirectional stream.
///
/// One `Transport` wraps exactly one stream; it is never shared and never
/// reused across client calls. Payloads are exchanged with no handshake, no
/// version byte and no framing beyond the encoding itself, so both peers must
/// agree out-of-band on the concrete types in play. A payload of an unexpected
/// shape surfaces as [`TransportError::Deserialize`], never as "no data".
pub struct Transport<T: Read + Write> {
    stream: T,
    config: Configuration<BigEndian, Fixint>,
}

impl<T: Read + Write> Transport<T> {
    pub fn new(stream: T) -> Self {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_fixed_int_encoding();
        Self { stream, config }
    }

    /// Borrow the underlying stream.
    ///
    /// Reads go straight through with no internal buffering, so probing the
    /// stream for pending bytes stays accurate.
    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    pub fn write_payload<P: Encode>(&mut self, payload: &P) -> Result<(), TransportError> {
        encode_into_std_write(payload, &mut self.stream, self.config)?;
        Ok(())
    }

    pub fn read_payload<P: Decode<()>>(&mut self) -> Result<P, TransportError> {
        let payload = decode_from_std_read(&mut self.stream, self.config)?;
        Ok(payload)
    }
}
