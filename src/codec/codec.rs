use std::cell::Cell;

use ntex_bytes::{Buf, BytesMut};
use ntex_codec::{Decoder, Encoder};

use crate::error::{DecodeError, EncodeError};
use crate::types::{FixedHeader, MAX_PACKET_SIZE};
use crate::utils::{decode_variable_length, variable_length_size};

use super::{decode, encode, Packet};

/// MQTT v3.1/v3.1.1 packet codec.
///
/// Decoder keeps the fixed header of a partially received frame between
/// calls, so input may arrive in arbitrary chunks.
#[derive(Debug, Clone)]
pub struct Codec {
    state: Cell<DecodeState>,
    max_size: Cell<u32>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DecodeState {
    FrameHeader,
    Frame(FixedHeader),
}

impl Codec {
    pub fn new() -> Self {
        Codec { state: Cell::new(DecodeState::FrameHeader), max_size: Cell::new(0) }
    }

    /// Limit remaining length of inbound frames, `0` means no limit
    pub fn set_max_size(&self, size: u32) {
        self.max_size.set(size);
    }

    /// Forget partially received frame
    pub fn reset(&self) {
        self.state.set(DecodeState::FrameHeader);
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Codec {
    type Item = Packet;
    type Error = DecodeError;

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Packet>, DecodeError> {
        let header = match self.state.get() {
            DecodeState::Frame(header) => header,
            DecodeState::FrameHeader => {
                let Some(&first_byte) = src.first() else {
                    return Ok(None);
                };
                let Some((remaining_length, consumed)) = decode_variable_length(&src[1..])? else {
                    return Ok(None);
                };
                let max_size = self.max_size.get();
                ensure!(max_size == 0 || remaining_length <= max_size, DecodeError::MaxSizeExceeded);

                src.advance(1 + consumed);
                let header = FixedHeader { first_byte, remaining_length };
                self.state.set(DecodeState::Frame(header));
                header
            }
        };

        let len = header.remaining_length as usize;
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }
        // frame is consumed even if its body is malformed
        self.state.set(DecodeState::FrameHeader);
        let body = src.split_to(len).freeze();
        decode::decode_packet(body, header.first_byte).map(Some)
    }
}

impl Encoder for Codec {
    type Item = Packet;
    type Error = EncodeError;

    fn encode(&self, item: Packet, dst: &mut BytesMut) -> Result<(), EncodeError> {
        let size = u32::try_from(encode::body_size(&item))
            .ok()
            .filter(|size| *size <= MAX_PACKET_SIZE)
            .ok_or(EncodeError::InvalidLength)?;
        dst.reserve(1 + variable_length_size(size) + size as usize);
        encode::encode_packet(&item, size, dst)
    }
}
