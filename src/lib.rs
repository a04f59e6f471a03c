//! MQTT v3.1/v3.1.1 client protocol engine
//!
//! Engine encodes and decodes control packets, tracks session state and
//! drives QoS1/QoS2 acknowledgement, retry and keep-alive logic. It does not
//! own any socket or event loop, the host feeds inbound bytes, ticks timers
//! and supplies a [`Transport`] for outbound bytes.

#[macro_use]
mod utils;

pub mod codec;
pub mod error;
pub mod types;

mod client;
mod transport;

pub use self::client::{Callbacks, Client, ClientConfig, State};
pub use self::error::{strerror, ClientError, DecodeError, EncodeError, ProtocolError};
pub use self::transport::Transport;
pub use self::types::{ProtocolVersion, QoS};
pub use self::utils::decode_variable_length;
