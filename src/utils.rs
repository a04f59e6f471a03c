use std::num::NonZeroU16;

use ntex_bytes::{Buf, BufMut, ByteString, Bytes, BytesMut};

use crate::error::{DecodeError, EncodeError};

macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            return Err($e);
        }
    };
}

macro_rules! prim_enum {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident {
            $(
                $( #[$enum_item_attr:meta] )*
                $var:ident=$val:expr
            ),+
        }) => {
        $( #[$enum_attr] )*
        #[repr(u8)]
        #[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
        pub enum $name {
            $(
                $( #[$enum_item_attr] )*
                $var = $val
            ),+
        }
        impl std::convert::TryFrom<u8> for $name {
            type Error = $crate::error::DecodeError;
            fn try_from(v: u8) -> Result<Self, Self::Error> {
                match v {
                    $($val => Ok($name::$var)),+
                    ,_ => Err($crate::error::DecodeError::MalformedPacket)
                }
            }
        }
        impl From<$name> for u8 {
            fn from(v: $name) -> Self {
                v as u8
            }
        }
    };
}

pub(crate) trait Decode: Sized {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError>;
}

impl Decode for u8 {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        ensure!(src.has_remaining(), DecodeError::InvalidLength);
        Ok(src.get_u8())
    }
}

impl Decode for u16 {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        ensure!(src.remaining() >= 2, DecodeError::InvalidLength);
        Ok(src.get_u16())
    }
}

impl Decode for NonZeroU16 {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        NonZeroU16::new(u16::decode(src)?).ok_or(DecodeError::MalformedPacket)
    }
}

impl Decode for Bytes {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u16::decode(src)? as usize;
        ensure!(src.remaining() >= len, DecodeError::InvalidLength);
        Ok(src.split_to(len))
    }
}

impl Decode for ByteString {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        let bytes = Bytes::decode(src)?;
        ByteString::try_from(bytes).map_err(|_| DecodeError::Utf8Error)
    }
}

pub(crate) trait Encode {
    fn encoded_size(&self) -> usize;

    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError>;
}

impl Encode for NonZeroU16 {
    fn encoded_size(&self) -> usize {
        2
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u16(self.get());
        Ok(())
    }
}

impl Encode for Bytes {
    fn encoded_size(&self) -> usize {
        2 + self.len()
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let len = u16::try_from(self.len()).map_err(|_| EncodeError::InvalidLength)?;
        buf.put_u16(len);
        buf.extend_from_slice(self.as_ref());
        Ok(())
    }
}

impl Encode for ByteString {
    fn encoded_size(&self) -> usize {
        self.as_bytes().encoded_size()
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        self.as_bytes().encode(buf)
    }
}

/// Read remaining length field, returns value and number of bytes it takes.
///
/// `Ok(None)` means more bytes are needed. The field is at most four bytes.
pub fn decode_variable_length(src: &[u8]) -> Result<Option<(u32, usize)>, DecodeError> {
    let mut value = 0u32;
    for (idx, byte) in src.iter().take(4).enumerate() {
        value += u32::from(byte & 0x7f) << (7 * idx);
        if byte & 0x80 == 0 {
            return Ok(Some((value, idx + 1)));
        }
    }
    ensure!(src.len() < 4, DecodeError::InvalidLength);
    Ok(None)
}

/// Write remaining length field, `value` is at most `MAX_PACKET_SIZE`
pub(crate) fn write_variable_length(mut value: u32, dst: &mut BytesMut) {
    while value >= 0x80 {
        dst.put_u8((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Size of the remaining length field for `value`
pub(crate) fn variable_length_size(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, b"\x00"; "zero")]
    #[test_case(127, b"\x7f"; "one byte max")]
    #[test_case(128, b"\x80\x01"; "two bytes")]
    #[test_case(16_383, b"\xff\x7f"; "two bytes max")]
    #[test_case(16_384, b"\x80\x80\x01"; "three bytes")]
    #[test_case(2_097_151, b"\xff\xff\x7f"; "three bytes max")]
    #[test_case(2_097_152, b"\x80\x80\x80\x01"; "four bytes")]
    #[test_case(268_435_455, b"\xff\xff\xff\x7f"; "max packet size")]
    fn test_variable_length(value: u32, field: &'static [u8]) {
        let mut buf = BytesMut::new();
        write_variable_length(value, &mut buf);
        assert_eq!(&buf[..], field);
        assert_eq!(variable_length_size(value), field.len());

        // trailing bytes belong to the packet body
        buf.extend_from_slice(b"\x7f\x7f");
        assert_eq!(decode_variable_length(&buf), Ok(Some((value, field.len()))));
    }

    #[test]
    fn test_incomplete_variable_length() {
        assert_eq!(decode_variable_length(b""), Ok(None));
        assert_eq!(decode_variable_length(b"\x80"), Ok(None));
        assert_eq!(decode_variable_length(b"\xff\xff\xff"), Ok(None));
        assert_eq!(decode_variable_length(b"\xff\xff\xff\xff"), Err(DecodeError::InvalidLength));
        assert_eq!(
            decode_variable_length(b"\xff\xff\xff\xff\x01"),
            Err(DecodeError::InvalidLength)
        );
    }

    #[test]
    fn test_decode_fields() {
        let mut src = Bytes::from_static(b"\x00\x05topic\x00\x02\xc3\x28");
        assert_eq!(ByteString::decode(&mut src).unwrap(), "topic");
        assert_eq!(ByteString::decode(&mut src), Err(DecodeError::Utf8Error));

        let mut src = Bytes::from_static(b"\x00\x09short");
        assert_eq!(Bytes::decode(&mut src), Err(DecodeError::InvalidLength));

        let mut src = Bytes::from_static(b"\x00\x00\x07");
        assert_eq!(NonZeroU16::decode(&mut src), Err(DecodeError::MalformedPacket));
        assert_eq!(u8::decode(&mut src), Ok(7));
        assert_eq!(u8::decode(&mut src), Err(DecodeError::InvalidLength));
    }

    #[test]
    fn test_encode_string_limit() {
        let mut buf = BytesMut::new();
        let long = Bytes::from(vec![b'a'; usize::from(u16::MAX) + 1]);
        assert_eq!(long.encode(&mut buf), Err(EncodeError::InvalidLength));

        ByteString::from_static("ab").encode(&mut buf).unwrap();
        assert_eq!(&buf[..], b"\x00\x02ab");
    }
}
