use std::num::NonZeroU16;

use ntex_bytes::{Buf, ByteString, Bytes};

use crate::error::DecodeError;
use crate::types::{packet_type, ConnectAckFlags, ConnectFlags, ProtocolVersion, QoS};
use crate::types::{MQISDP, MQTT, WILL_QOS_SHIFT};
use crate::utils::Decode;

use super::packet::{
    Connect, ConnectAck, ConnectAckReason, LastWill, Packet, Publish, SubscribeReturnCode,
};

/// Decode packet body.
///
/// `src` is exactly one frame without fixed header, bytes left after the
/// last field make the frame invalid.
pub(crate) fn decode_packet(mut src: Bytes, first_byte: u8) -> Result<Packet, DecodeError> {
    let src = &mut src;
    let pkt = match first_byte {
        packet_type::PUBLISH_START..=packet_type::PUBLISH_END => {
            Packet::Publish(read_publish(src, first_byte)?)
        }
        packet_type::CONNECT => Packet::Connect(Box::new(Connect::decode(src)?)),
        packet_type::CONNACK => Packet::ConnectAck(ConnectAck::decode(src)?),
        packet_type::PUBACK => Packet::PublishAck { packet_id: NonZeroU16::decode(src)? },
        packet_type::PUBREC => Packet::PublishReceived { packet_id: NonZeroU16::decode(src)? },
        packet_type::PUBREL => Packet::PublishRelease { packet_id: NonZeroU16::decode(src)? },
        packet_type::PUBCOMP => Packet::PublishComplete { packet_id: NonZeroU16::decode(src)? },
        packet_type::UNSUBACK => Packet::UnsubscribeAck { packet_id: NonZeroU16::decode(src)? },
        packet_type::SUBSCRIBE => Packet::Subscribe {
            packet_id: NonZeroU16::decode(src)?,
            topic_filters: read_non_empty(src)?,
        },
        packet_type::SUBACK => {
            Packet::SubscribeAck { packet_id: NonZeroU16::decode(src)?, status: read_all(src)? }
        }
        packet_type::UNSUBSCRIBE => Packet::Unsubscribe {
            packet_id: NonZeroU16::decode(src)?,
            topic_filters: read_non_empty(src)?,
        },
        packet_type::PINGREQ => Packet::PingRequest,
        packet_type::PINGRESP => Packet::PingResponse,
        packet_type::DISCONNECT => Packet::Disconnect,
        _ => return Err(DecodeError::UnsupportedPacketType),
    };
    ensure!(!src.has_remaining(), DecodeError::InvalidLength);
    Ok(pkt)
}

fn read_publish(src: &mut Bytes, first_byte: u8) -> Result<Publish, DecodeError> {
    let qos = QoS::try_from((first_byte & packet_type::QOS_MASK) >> 1)?;
    let topic = ByteString::decode(src)?;
    let packet_id = match qos {
        QoS::AtMostOnce => None,
        QoS::AtLeastOnce | QoS::ExactlyOnce => Some(NonZeroU16::decode(src)?),
    };

    Ok(Publish {
        dup: first_byte & packet_type::DUP_FLAG != 0,
        retain: first_byte & packet_type::RETAIN_FLAG != 0,
        qos,
        topic,
        packet_id,
        payload: src.split_to(src.len()),
    })
}

/// Items up to the end of the frame
fn read_all<T: Decode>(src: &mut Bytes) -> Result<Vec<T>, DecodeError> {
    let mut items = Vec::new();
    while src.has_remaining() {
        items.push(T::decode(src)?);
    }
    Ok(items)
}

fn read_non_empty<T: Decode>(src: &mut Bytes) -> Result<Vec<T>, DecodeError> {
    let items = read_all(src)?;
    ensure!(!items.is_empty(), DecodeError::MalformedPacket);
    Ok(items)
}

impl Decode for QoS {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        QoS::try_from(u8::decode(src)?)
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        Ok((A::decode(src)?, B::decode(src)?))
    }
}

impl Decode for SubscribeReturnCode {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode(src)? {
            0x80 => Ok(SubscribeReturnCode::Failure),
            code => Ok(SubscribeReturnCode::Success(QoS::try_from(code)?)),
        }
    }
}

impl Decode for ConnectAck {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        let flags = ConnectAckFlags::from_bits(u8::decode(src)?)
            .ok_or(DecodeError::ConnAckReservedFlagSet)?;
        Ok(ConnectAck {
            return_code: ConnectAckReason::try_from(u8::decode(src)?)?,
            session_present: flags.contains(ConnectAckFlags::SESSION_PRESENT),
        })
    }
}

impl Decode for Connect {
    fn decode(src: &mut Bytes) -> Result<Self, DecodeError> {
        let version = match Bytes::decode(src)?.as_ref() {
            MQTT => ProtocolVersion::V3_1_1,
            MQISDP => ProtocolVersion::V3_1,
            _ => return Err(DecodeError::InvalidProtocol),
        };
        // MQIsdp always comes with level 3 and MQTT with level 4
        ensure!(u8::decode(src)? == version.level(), DecodeError::UnsupportedProtocolLevel);

        let flags = ConnectFlags::from_bits(u8::decode(src)?)
            .ok_or(DecodeError::ConnectReservedFlagSet)?;
        let clean_session = flags.contains(ConnectFlags::CLEAN_SESSION);
        let keep_alive = u16::decode(src)?;
        let client_id = ByteString::decode(src)?;
        ensure!(!client_id.is_empty() || clean_session, DecodeError::InvalidClientId);

        let last_will = if flags.contains(ConnectFlags::WILL) {
            Some(LastWill {
                qos: QoS::try_from((flags & ConnectFlags::WILL_QOS).bits() >> WILL_QOS_SHIFT)?,
                retain: flags.contains(ConnectFlags::WILL_RETAIN),
                topic: ByteString::decode(src)?,
                message: Bytes::decode(src)?,
            })
        } else {
            ensure!(
                !flags.intersects(ConnectFlags::WILL_QOS | ConnectFlags::WILL_RETAIN),
                DecodeError::MalformedPacket
            );
            None
        };

        let has_username = flags.contains(ConnectFlags::USERNAME);
        ensure!(has_username || !flags.contains(ConnectFlags::PASSWORD), DecodeError::MalformedPacket);
        let username = has_username.then(|| ByteString::decode(src)).transpose()?;
        let password =
            flags.contains(ConnectFlags::PASSWORD).then(|| Bytes::decode(src)).transpose()?;

        Ok(Connect { version, clean_session, keep_alive, last_will, client_id, username, password })
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn id(v: u16) -> NonZeroU16 {
        NonZeroU16::new(v).unwrap()
    }

    fn decode(first_byte: u8, body: &'static [u8]) -> Result<Packet, DecodeError> {
        decode_packet(Bytes::from_static(body), first_byte)
    }

    #[test]
    fn test_connect() {
        let pkt = decode(0x10, b"\x00\x04MQTT\x04\xC0\x00\x3C\x00\x0512345\x00\x04user\x00\x04pass");
        assert_eq!(
            pkt,
            Ok(Packet::Connect(Box::new(Connect {
                version: ProtocolVersion::V3_1_1,
                keep_alive: 60,
                client_id: ByteString::from_static("12345"),
                username: Some(ByteString::from_static("user")),
                password: Some(Bytes::from_static(b"pass")),
                ..Connect::default()
            })))
        );

        let pkt = decode(0x10, b"\x00\x06MQIsdp\x03\x34\x00\x3C\x00\x01c\x00\x05topic\x00\x07message");
        assert_eq!(
            pkt,
            Ok(Packet::Connect(Box::new(Connect {
                version: ProtocolVersion::V3_1,
                keep_alive: 60,
                client_id: ByteString::from_static("c"),
                last_will: Some(LastWill {
                    qos: QoS::ExactlyOnce,
                    retain: true,
                    topic: ByteString::from_static("topic"),
                    message: Bytes::from_static(b"message"),
                }),
                ..Connect::default()
            })))
        );

        let pkt = decode(0x10, b"\x00\x04MQTT\x04\x02\x00\x00\x00\x00");
        assert!(matches!(pkt, Ok(Packet::Connect(c)) if c.clean_session && c.client_id.is_empty()));
    }

    #[test]
    fn test_broker_packets() {
        assert_eq!(
            decode(0x20, b"\x01\x04"),
            Ok(Packet::ConnectAck(ConnectAck {
                return_code: ConnectAckReason::BadUserNameOrPassword,
                session_present: true,
            }))
        );
        assert_eq!(
            decode(0x90, b"\x12\x34\x01\x80\x02"),
            Ok(Packet::SubscribeAck {
                packet_id: id(0x1234),
                status: vec![
                    SubscribeReturnCode::Success(QoS::AtLeastOnce),
                    SubscribeReturnCode::Failure,
                    SubscribeReturnCode::Success(QoS::ExactlyOnce),
                ],
            })
        );
        assert_eq!(decode(0xb0, b"\x43\x21"), Ok(Packet::UnsubscribeAck { packet_id: id(0x4321) }));
        assert_eq!(decode(0xd0, b""), Ok(Packet::PingResponse));
    }

    #[test_case(0x40, Packet::PublishAck { packet_id: id(0x4321) }; "puback")]
    #[test_case(0x50, Packet::PublishReceived { packet_id: id(0x4321) }; "pubrec")]
    #[test_case(0x62, Packet::PublishRelease { packet_id: id(0x4321) }; "pubrel")]
    #[test_case(0x70, Packet::PublishComplete { packet_id: id(0x4321) }; "pubcomp")]
    fn test_publish_acks(first_byte: u8, pkt: Packet) {
        assert_eq!(decode(first_byte, b"\x43\x21"), Ok(pkt));
    }

    #[test]
    fn test_publish() {
        assert_eq!(
            decode(0x3d, b"\x00\x05topic\x43\x21data"),
            Ok(Packet::Publish(Publish {
                dup: true,
                retain: true,
                qos: QoS::ExactlyOnce,
                topic: ByteString::from_static("topic"),
                packet_id: Some(id(0x4321)),
                payload: Bytes::from_static(b"data"),
            }))
        );
        // qos0 has no packet id, payload may be empty
        assert_eq!(
            decode(0x30, b"\x00\x03a/b"),
            Ok(Packet::Publish(Publish {
                dup: false,
                retain: false,
                qos: QoS::AtMostOnce,
                topic: ByteString::from_static("a/b"),
                packet_id: None,
                payload: Bytes::new(),
            }))
        );
    }

    #[test]
    fn test_client_packets() {
        assert_eq!(
            decode(0x82, b"\x12\x34\x00\x04test\x01\x00\x06filter\x02"),
            Ok(Packet::Subscribe {
                packet_id: id(0x1234),
                topic_filters: vec![
                    (ByteString::from_static("test"), QoS::AtLeastOnce),
                    (ByteString::from_static("filter"), QoS::ExactlyOnce),
                ],
            })
        );
        assert_eq!(
            decode(0xa2, b"\x12\x34\x00\x04test"),
            Ok(Packet::Unsubscribe {
                packet_id: id(0x1234),
                topic_filters: vec![ByteString::from_static("test")],
            })
        );
        assert_eq!(decode(0xc0, b""), Ok(Packet::PingRequest));
        assert_eq!(decode(0xe0, b""), Ok(Packet::Disconnect));
    }

    #[test_case(0x36, b"\x00\x01a\x00\x01", DecodeError::MalformedPacket; "publish qos 3")]
    #[test_case(0x32, b"\x00\x01a\x00\x00", DecodeError::MalformedPacket; "publish id zero")]
    #[test_case(0x30, b"\x00\x02\xc3\x28data", DecodeError::Utf8Error; "publish topic utf8")]
    #[test_case(0x30, b"\x00\x09topic", DecodeError::InvalidLength; "publish topic overflow")]
    #[test_case(0x40, b"\x43\x21\x00", DecodeError::InvalidLength; "ack trailing bytes")]
    #[test_case(0x40, b"\x43", DecodeError::InvalidLength; "ack truncated")]
    #[test_case(0x60, b"\x43\x21", DecodeError::UnsupportedPacketType; "pubrel without flags")]
    #[test_case(0xd0, b"\x00", DecodeError::InvalidLength; "pingresp with body")]
    #[test_case(0x20, b"\x00\x06", DecodeError::MalformedPacket; "connack unknown code")]
    #[test_case(0x20, b"\x03\x04", DecodeError::ConnAckReservedFlagSet; "connack reserved flags")]
    #[test_case(0x20, b"\x00\x00\x00", DecodeError::InvalidLength; "connack trailing bytes")]
    #[test_case(0x10, b"\x00\x02MQ\x04\x02\x00\x3c\x00\x01c", DecodeError::InvalidProtocol; "connect name")]
    #[test_case(0x10, b"\x00\x04MQTT\x03\x02\x00\x3c\x00\x01c", DecodeError::UnsupportedProtocolLevel; "connect level")]
    #[test_case(0x10, b"\x00\x06MQIsdp\x04\x02\x00\x3c\x00\x01c", DecodeError::UnsupportedProtocolLevel; "connect mqisdp level")]
    #[test_case(0x10, b"\x00\x04MQTT\x04\xff\x00\x3c\x00\x0512345", DecodeError::ConnectReservedFlagSet; "connect reserved flag")]
    #[test_case(0x10, b"\x00\x04MQTT\x04\x00\x00\x3c\x00\x00", DecodeError::InvalidClientId; "connect empty client id")]
    #[test_case(0x10, b"\x00\x04MQTT\x04\x42\x00\x3c\x00\x01c", DecodeError::MalformedPacket; "connect password only")]
    #[test_case(0x10, b"\x00\x04MQTT\x04\x12\x00\x3c\x00\x01c", DecodeError::MalformedPacket; "connect will qos only")]
    #[test_case(0x82, b"\x12\x34", DecodeError::MalformedPacket; "subscribe without topics")]
    #[test_case(0x82, b"\x12\x34\x00\x01a", DecodeError::InvalidLength; "subscribe without qos")]
    #[test_case(0x90, b"\x12\x34\x03", DecodeError::MalformedPacket; "suback invalid code")]
    #[test_case(0xa2, b"\x12\x34", DecodeError::MalformedPacket; "unsubscribe without topics")]
    #[test_case(0xf0, b"", DecodeError::UnsupportedPacketType; "reserved type")]
    fn test_malformed(first_byte: u8, body: &'static [u8], err: DecodeError) {
        assert_eq!(decode(first_byte, body), Err(err));
    }
}
