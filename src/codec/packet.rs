use std::num::NonZeroU16;

use ntex_bytes::{ByteString, Bytes};
use serde::de::DeserializeOwned;

use crate::types::{packet_type, ProtocolVersion, QoS};

prim_enum! {
    /// CONNACK return code
    pub enum ConnectAckReason {
        ConnectionAccepted = 0,
        UnacceptableProtocolVersion = 1,
        IdentifierRejected = 2,
        ServiceUnavailable = 3,
        BadUserNameOrPassword = 4,
        NotAuthorized = 5
    }
}

impl ConnectAckReason {
    /// Short description for logs
    pub fn reason(self) -> &'static str {
        match self {
            ConnectAckReason::ConnectionAccepted => "accepted",
            ConnectAckReason::UnacceptableProtocolVersion => "protocol level is not supported",
            ConnectAckReason::IdentifierRejected => "client id is rejected",
            ConnectAckReason::ServiceUnavailable => "broker is unavailable",
            ConnectAckReason::BadUserNameOrPassword => "malformed username or password",
            ConnectAckReason::NotAuthorized => "client is not authorized",
        }
    }
}

/// Will message carried by CONNECT
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LastWill {
    pub qos: QoS,
    pub retain: bool,
    pub topic: ByteString,
    pub message: Bytes,
}

/// CONNECT packet.
///
/// `version` selects protocol name and level, `MQIsdp`/3 or `MQTT`/4.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Connect {
    pub version: ProtocolVersion,
    pub clean_session: bool,
    /// Seconds, `0` disables keep-alive on the broker side
    pub keep_alive: u16,
    pub last_will: Option<LastWill>,
    /// May be empty only together with `clean_session`
    pub client_id: ByteString,
    pub username: Option<ByteString>,
    /// Only valid together with `username`
    pub password: Option<Bytes>,
}

/// Application message, inbound or outbound.
///
/// `packet_id` is set for QoS1 and QoS2 and absent for QoS0.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Publish {
    /// Redelivery of an earlier attempt
    pub dup: bool,
    pub retain: bool,
    pub qos: QoS,
    pub topic: ByteString,
    pub packet_id: Option<NonZeroU16>,
    pub payload: Bytes,
}

impl Publish {
    /// Deserialize json payload
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Broker answer to CONNECT
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct ConnectAck {
    pub return_code: ConnectAckReason,
    /// Broker kept state of a previous session
    pub session_present: bool,
}

impl ConnectAck {
    pub fn is_accepted(&self) -> bool {
        self.return_code == ConnectAckReason::ConnectionAccepted
    }
}

/// Per-topic SUBACK status, `0x80` on the wire is a failure
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SubscribeReturnCode {
    Success(QoS),
    Failure,
}

/// MQTT v3 control packet.
///
/// Codec handles both directions. A client sends `Connect`, `Subscribe`,
/// `Unsubscribe`, `PingRequest` and `Disconnect` and never expects them
/// back; `ConnectAck`, `SubscribeAck`, `UnsubscribeAck` and `PingResponse`
/// only travel from the broker. Publish and its acknowledgements flow both
/// ways.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Packet {
    Connect(Box<Connect>),
    ConnectAck(ConnectAck),
    Publish(Publish),
    /// QoS1 acknowledgement
    PublishAck { packet_id: NonZeroU16 },
    /// QoS2, first acknowledgement
    PublishReceived { packet_id: NonZeroU16 },
    /// QoS2, release of a received message
    PublishRelease { packet_id: NonZeroU16 },
    /// QoS2, final acknowledgement
    PublishComplete { packet_id: NonZeroU16 },
    Subscribe { packet_id: NonZeroU16, topic_filters: Vec<(ByteString, QoS)> },
    /// One status per requested topic filter, in request order
    SubscribeAck { packet_id: NonZeroU16, status: Vec<SubscribeReturnCode> },
    Unsubscribe { packet_id: NonZeroU16, topic_filters: Vec<ByteString> },
    UnsubscribeAck { packet_id: NonZeroU16 },
    PingRequest,
    PingResponse,
    Disconnect,
}

impl From<Connect> for Packet {
    fn from(val: Connect) -> Packet {
        Packet::Connect(Box::new(val))
    }
}

impl From<Publish> for Packet {
    fn from(val: Publish) -> Packet {
        Packet::Publish(val)
    }
}

impl Packet {
    /// Control packet name
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Connect(_) => "CONNECT",
            Packet::ConnectAck(_) => "CONNACK",
            Packet::Publish(_) => "PUBLISH",
            Packet::PublishAck { .. } => "PUBACK",
            Packet::PublishReceived { .. } => "PUBREC",
            Packet::PublishRelease { .. } => "PUBREL",
            Packet::PublishComplete { .. } => "PUBCOMP",
            Packet::Subscribe { .. } => "SUBSCRIBE",
            Packet::SubscribeAck { .. } => "SUBACK",
            Packet::Unsubscribe { .. } => "UNSUBSCRIBE",
            Packet::UnsubscribeAck { .. } => "UNSUBACK",
            Packet::PingRequest => "PINGREQ",
            Packet::PingResponse => "PINGRESP",
            Packet::Disconnect => "DISCONNECT",
        }
    }

    /// Packet only a broker may receive
    pub fn is_broker_bound(&self) -> bool {
        matches!(
            self,
            Packet::Connect(_)
                | Packet::Subscribe { .. }
                | Packet::Unsubscribe { .. }
                | Packet::PingRequest
                | Packet::Disconnect
        )
    }

    /// First byte of the fixed header, including DUP/QoS/RETAIN bits of PUBLISH
    pub fn first_byte(&self) -> u8 {
        match self {
            Packet::Publish(publish) => {
                let mut byte = packet_type::PUBLISH_START | (u8::from(publish.qos) << 1);
                if publish.dup {
                    byte |= packet_type::DUP_FLAG;
                }
                if publish.retain {
                    byte |= packet_type::RETAIN_FLAG;
                }
                byte
            }
            Packet::Connect(_) => packet_type::CONNECT,
            Packet::ConnectAck(_) => packet_type::CONNACK,
            Packet::PublishAck { .. } => packet_type::PUBACK,
            Packet::PublishReceived { .. } => packet_type::PUBREC,
            Packet::PublishRelease { .. } => packet_type::PUBREL,
            Packet::PublishComplete { .. } => packet_type::PUBCOMP,
            Packet::Subscribe { .. } => packet_type::SUBSCRIBE,
            Packet::SubscribeAck { .. } => packet_type::SUBACK,
            Packet::Unsubscribe { .. } => packet_type::UNSUBSCRIBE,
            Packet::UnsubscribeAck { .. } => packet_type::UNSUBACK,
            Packet::PingRequest => packet_type::PINGREQ,
            Packet::PingResponse => packet_type::PINGRESP,
            Packet::Disconnect => packet_type::DISCONNECT,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn id(v: u16) -> NonZeroU16 {
        NonZeroU16::new(v).unwrap()
    }

    fn publish(qos: QoS, dup: bool, retain: bool) -> Packet {
        Packet::Publish(Publish {
            dup,
            retain,
            qos,
            topic: ByteString::from_static("t"),
            packet_id: if qos == QoS::AtMostOnce { None } else { Some(id(1)) },
            payload: Bytes::new(),
        })
    }

    #[test_case(publish(QoS::AtMostOnce, false, false), 0x30)]
    #[test_case(publish(QoS::AtLeastOnce, true, false), 0x3a)]
    #[test_case(publish(QoS::ExactlyOnce, false, true), 0x35)]
    #[test_case(Packet::PublishRelease { packet_id: id(1) }, 0x62)]
    #[test_case(Packet::Subscribe { packet_id: id(1), topic_filters: vec![] }, 0x82)]
    #[test_case(Packet::PingResponse, 0xd0)]
    fn test_first_byte(pkt: Packet, byte: u8) {
        assert_eq!(pkt.first_byte(), byte);
    }

    #[test]
    fn test_direction() {
        assert!(Packet::PingRequest.is_broker_bound());
        assert!(Packet::Connect(Box::default()).is_broker_bound());
        assert!(!Packet::PingResponse.is_broker_bound());
        assert!(!Packet::PublishRelease { packet_id: id(3) }.is_broker_bound());
        assert!(!publish(QoS::AtLeastOnce, false, false).is_broker_bound());
        assert_eq!(Packet::UnsubscribeAck { packet_id: id(3) }.name(), "UNSUBACK");
    }

    #[test]
    fn test_ack_reason() {
        assert_eq!(ConnectAckReason::try_from(5).unwrap(), ConnectAckReason::NotAuthorized);
        assert_eq!(ConnectAckReason::NotAuthorized.reason(), "client is not authorized");
        assert!(ConnectAckReason::try_from(6).is_err());

        let ack = ConnectAck { return_code: ConnectAckReason::IdentifierRejected, session_present: false };
        assert!(!ack.is_accepted());
    }

    #[test]
    fn test_publish_json() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Reading {
            temp: f32,
        }

        let publish = Publish {
            dup: false,
            retain: false,
            qos: QoS::AtMostOnce,
            topic: ByteString::from_static("sensors/t"),
            packet_id: None,
            payload: Bytes::from_static(br#"{"temp": 21.5}"#),
        };
        assert_eq!(publish.json::<Reading>().unwrap(), Reading { temp: 21.5 });
        assert!(publish.json::<Vec<u8>>().is_err());
    }
}
