use std::io;

/// Protocol level errors
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// MQTT decoding error
    #[error("Decoding error: {0:?}")]
    Decode(#[from] DecodeError),
    /// Packet is not allowed in the current connection state
    #[error("{message}, received {packet}")]
    UnexpectedPacket { packet: &'static str, message: &'static str },
}

impl ProtocolError {
    pub(crate) fn unexpected_packet(packet: &'static str, message: &'static str) -> ProtocolError {
        ProtocolError::UnexpectedPacket { packet, message }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid protocol")]
    InvalidProtocol,
    #[error("Invalid length")]
    InvalidLength,
    #[error("Malformed packet")]
    MalformedPacket,
    #[error("Unsupported protocol level")]
    UnsupportedProtocolLevel,
    #[error("Connect frame's reserved flag is set")]
    ConnectReservedFlagSet,
    #[error("ConnectAck frame's reserved flag is set")]
    ConnAckReservedFlagSet,
    #[error("Invalid client id")]
    InvalidClientId,
    #[error("Unsupported packet type")]
    UnsupportedPacketType,
    #[error("Max size exceeded")]
    MaxSizeExceeded,
    #[error("utf8 error")]
    Utf8Error,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum EncodeError {
    #[error("Invalid length")]
    InvalidLength,
    #[error("Malformed packet")]
    MalformedPacket,
    #[error("Packet id is required")]
    PacketIdRequired,
}

pub const SUCCESS: i32 = 0;

/// Errors returned by client api calls
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Required argument is missing or empty
    #[error("mqtt missing argument: {0}")]
    MissingArgument(&'static str),
    /// Every packet identifier is in use by a pending exchange
    #[error("mqtt packet identifier allocation error, max in-flight reached")]
    MaxInFlight,
    /// QoS level outside of `0..=2`
    #[error("mqtt qos error: {0}")]
    InvalidQoS(u8),
    /// Protocol level other than v3.1 or v3.1.1
    #[error("mqtt protocol version error: {0}")]
    UnsupportedVersion(u8),
    /// Transport rejected or truncated a write
    #[error("mqtt io write error: {0}")]
    Write(#[source] io::Error),
    /// Inbound packet could not be parsed or violates the protocol
    #[error("mqtt packet parse error: {0}")]
    Protocol(#[from] ProtocolError),
    /// Keep-alive or connect acknowledgement timed out
    #[error("mqtt timeout error")]
    Timeout,
    /// Too many topics in one subscribe or unsubscribe call
    #[error("mqtt max topic/qos per subscribe or unsubscribe: {0}")]
    MaxSubscriptions(usize),
    /// Operation requires an established connection
    #[error("mqtt client is not connected")]
    NotConnected,
    /// Outbound packet could not be encoded
    #[error("mqtt packet encode error: {0}")]
    Encode(#[from] EncodeError),
    /// Configuration change after connect
    #[error("mqtt client configuration is immutable after connect")]
    InvalidState,
    /// Argument value is out of range
    #[error("mqtt invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl From<DecodeError> for ClientError {
    fn from(err: DecodeError) -> Self {
        ClientError::Protocol(ProtocolError::Decode(err))
    }
}

impl ClientError {
    /// Stable numeric code of the error
    pub fn code(&self) -> i32 {
        match self {
            ClientError::MissingArgument(_) => -1,
            ClientError::MaxInFlight => -2,
            ClientError::InvalidQoS(_) => -3,
            ClientError::UnsupportedVersion(_) => -4,
            ClientError::Write(_) => -5,
            ClientError::Protocol(_) => -6,
            ClientError::Timeout => -7,
            ClientError::MaxSubscriptions(_) => -8,
            ClientError::NotConnected => -9,
            ClientError::Encode(_) => -10,
            ClientError::InvalidState => -11,
            ClientError::InvalidArgument(_) => -12,
        }
    }
}

/// Human readable message for a client error code.
pub fn strerror(code: i32) -> &'static str {
    match code {
        SUCCESS => "success",
        -1 => "mqtt null or empty argument",
        -2 => "mqtt packet identifier allocation error",
        -3 => "mqtt qos error",
        -4 => "mqtt protocol version error",
        -5 => "mqtt io write error",
        -6 => "mqtt packet parse error",
        -7 => "mqtt timeout error",
        -8 => "mqtt max topic/qos per subscribe or unsubscribe",
        -9 => "mqtt client is not connected",
        -10 => "mqtt packet encode error",
        -11 => "mqtt configuration is immutable after connect",
        -12 => "mqtt invalid argument",
        _ => "unknown error",
    }
}
