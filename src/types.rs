use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Protocol name of MQTT v3.1
pub const MQISDP: &[u8] = b"MQIsdp";
/// Protocol name of MQTT v3.1.1
pub const MQTT: &[u8] = b"MQTT";
pub const MQTT_LEVEL_31: u8 = 3;
pub const MQTT_LEVEL_311: u8 = 4;
pub const WILL_QOS_SHIFT: u8 = 3;

/// Max possible packet size
pub const MAX_PACKET_SIZE: u32 = 0xF_FF_FF_FF;

prim_enum! {
    /// Delivery guarantee of a publish
    pub enum QoS {
        /// Fire and forget, no acknowledgement
        AtMostOnce = 0,
        /// Acknowledged with PUBACK, may be delivered more than once
        AtLeastOnce = 1,
        /// PUBREC/PUBREL/PUBCOMP handshake, delivered once
        ExactlyOnce = 2
    }
}

impl QoS {
    /// Validate numeric qos level supplied by a caller
    pub fn from_level(level: u8) -> Result<QoS, ClientError> {
        QoS::try_from(level).map_err(|_| ClientError::InvalidQoS(level))
    }
}

/// MQTT protocol version spoken by the client
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    /// MQTT v3.1, protocol name `MQIsdp`, level 3
    V3_1,
    /// MQTT v3.1.1, protocol name `MQTT`, level 4
    #[default]
    V3_1_1,
}

impl ProtocolVersion {
    /// Protocol name written into CONNECT
    pub fn name(self) -> &'static [u8] {
        match self {
            ProtocolVersion::V3_1 => MQISDP,
            ProtocolVersion::V3_1_1 => MQTT,
        }
    }

    /// Protocol level written into CONNECT
    pub fn level(self) -> u8 {
        match self {
            ProtocolVersion::V3_1 => MQTT_LEVEL_31,
            ProtocolVersion::V3_1_1 => MQTT_LEVEL_311,
        }
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = ClientError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            MQTT_LEVEL_31 => Ok(ProtocolVersion::V3_1),
            MQTT_LEVEL_311 => Ok(ProtocolVersion::V3_1_1),
            _ => Err(ClientError::UnsupportedVersion(level)),
        }
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(v: ProtocolVersion) -> u8 {
        v.level()
    }
}

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ConnectFlags: u8 {
        const USERNAME      = 0b1000_0000;
        const PASSWORD      = 0b0100_0000;
        const WILL_RETAIN   = 0b0010_0000;
        const WILL_QOS      = 0b0001_1000;
        const WILL          = 0b0000_0100;
        const CLEAN_SESSION = 0b0000_0010;
    }
}

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ConnectAckFlags: u8 {
        const SESSION_PRESENT = 0b0000_0001;
    }
}

pub(crate) mod packet_type {
    pub(crate) const CONNECT: u8 = 0b0001_0000;
    pub(crate) const CONNACK: u8 = 0b0010_0000;
    pub(crate) const PUBLISH_START: u8 = 0b0011_0000;
    pub(crate) const PUBLISH_END: u8 = 0b0011_1111;
    pub(crate) const PUBACK: u8 = 0b0100_0000;
    pub(crate) const PUBREC: u8 = 0b0101_0000;
    pub(crate) const PUBREL: u8 = 0b0110_0010;
    pub(crate) const PUBCOMP: u8 = 0b0111_0000;
    pub(crate) const SUBSCRIBE: u8 = 0b1000_0010;
    pub(crate) const SUBACK: u8 = 0b1001_0000;
    pub(crate) const UNSUBSCRIBE: u8 = 0b1010_0010;
    pub(crate) const UNSUBACK: u8 = 0b1011_0000;
    pub(crate) const PINGREQ: u8 = 0b1100_0000;
    pub(crate) const PINGRESP: u8 = 0b1101_0000;
    pub(crate) const DISCONNECT: u8 = 0b1110_0000;

    /// DUP flag of PUBLISH fixed header
    pub(crate) const DUP_FLAG: u8 = 0b0000_1000;
    pub(crate) const QOS_MASK: u8 = 0b0000_0110;
    pub(crate) const RETAIN_FLAG: u8 = 0b0000_0001;
}

/// Fixed header of a frame whose body is not fully received yet
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct FixedHeader {
    /// Packet type and flags
    pub(crate) first_byte: u8,
    /// Body length, variable header plus payload
    pub(crate) remaining_length: u32,
}
