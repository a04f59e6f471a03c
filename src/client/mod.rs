//! Sans-io MQTT v3.1/v3.1.1 client
use std::{fmt, io, num::NonZeroU16, time::Duration};

use ntex_bytes::{ByteString, Bytes, BytesMut};
use ntex_codec::Encoder;

use crate::codec::{self, Codec, LastWill, Packet, Publish};
use crate::error::{ClientError, EncodeError};
use crate::transport::Transport;
use crate::types::{ProtocolVersion, QoS};

mod config;
mod control;
mod dispatcher;
mod inflight;
mod session;
mod timer;

pub use self::config::ClientConfig;
pub use self::control::Callbacks;
pub use self::session::State;

use self::inflight::{Inflight, Kind, Pending};
use self::session::Session;

/// Mqtt client protocol engine.
///
/// Client does not perform any io. Outbound packets are written to the
/// [`Transport`] passed to [`Client::connect`], inbound bytes are fed with
/// [`Client::read`] and timers are driven with [`Client::update`].
pub struct Client<T, U> {
    client_id: ByteString,
    config: ClientConfig,
    last_will: Option<LastWill>,
    user_data: U,
    callbacks: Callbacks<T, U>,
    transport: Option<T>,
    codec: Codec,
    read_buf: BytesMut,
    session: Session,
    inflight: Inflight,
}

impl<T, U> fmt::Debug for Client<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("state", &self.session.state())
            .field("inflight", &self.inflight.len())
            .finish()
    }
}

impl<T: Transport, U> Client<T, U> {
    /// Create new client
    pub fn new<S>(client_id: S, user_data: U, callbacks: Callbacks<T, U>) -> Self
    where
        ByteString: From<S>,
    {
        Client {
            user_data,
            callbacks,
            client_id: client_id.into(),
            config: ClientConfig::default(),
            last_will: None,
            transport: None,
            codec: Codec::new(),
            read_buf: BytesMut::new(),
            session: Session::new(),
            inflight: Inflight::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.session.state()
    }

    pub fn is_connected(&self) -> bool {
        self.session.state() == State::Connected
    }

    /// Number of unacknowledged publish, subscribe and unsubscribe exchanges
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    pub fn user_data(&self) -> &U {
        &self.user_data
    }

    pub fn user_data_mut(&mut self) -> &mut U {
        &mut self.user_data
    }

    fn check_configurable(&self) -> Result<(), ClientError> {
        if self.session.state() == State::Disconnected {
            Ok(())
        } else {
            Err(ClientError::InvalidState)
        }
    }

    /// Replace client configuration
    pub fn set_config(&mut self, config: ClientConfig) -> Result<(), ClientError> {
        self.check_configurable()?;
        ensure!(!config.retry_interval.is_zero(), ClientError::InvalidArgument("retry_interval"));
        ensure!(
            !config.connect_timeout.is_zero(),
            ClientError::InvalidArgument("connect_timeout")
        );
        self.config = config;
        Ok(())
    }

    /// Retry interval must be non-zero
    pub fn set_retry_interval(&mut self, val: Duration) -> Result<(), ClientError> {
        self.check_configurable()?;
        ensure!(!val.is_zero(), ClientError::InvalidArgument("retry_interval"));
        self.config.retry_interval = val;
        Ok(())
    }

    /// Keep-alive interval in seconds, `0` disables pings
    pub fn set_keep_alive(&mut self, val: u16) -> Result<(), ClientError> {
        self.check_configurable()?;
        self.config.keep_alive = val;
        Ok(())
    }

    pub fn set_clean_session(&mut self, val: bool) -> Result<(), ClientError> {
        self.check_configurable()?;
        self.config.clean_session = val;
        Ok(())
    }

    pub fn set_version(&mut self, val: ProtocolVersion) -> Result<(), ClientError> {
        self.check_configurable()?;
        self.config.version = val;
        Ok(())
    }

    pub fn set_auth(&mut self, username: &str, password: Option<&str>) -> Result<(), ClientError> {
        self.check_configurable()?;
        ensure!(!username.is_empty(), ClientError::MissingArgument("username"));
        self.config.username = Some(username.to_string());
        self.config.password = password.map(|s| s.to_string());
        Ok(())
    }

    /// Will message published by broker if connection is lost
    pub fn set_will<P>(
        &mut self,
        retain: bool,
        qos: QoS,
        topic: &str,
        message: P,
    ) -> Result<(), ClientError>
    where
        Bytes: From<P>,
    {
        self.check_configurable()?;
        ensure!(!topic.is_empty(), ClientError::MissingArgument("topic"));
        self.last_will =
            Some(LastWill { qos, retain, topic: ByteString::from(topic), message: message.into() });
        Ok(())
    }

    /// Send CONNECT packet over the transport.
    ///
    /// Outcome is reported through connack callback.
    pub fn connect(&mut self, transport: T) -> Result<(), ClientError> {
        self.check_configurable()?;
        ensure!(
            !self.client_id.is_empty() || self.config.clean_session,
            ClientError::MissingArgument("client_id")
        );

        if self.config.clean_session {
            self.inflight.clear();
            self.session.clear_receipts();
        }
        self.codec.reset();
        self.codec.set_max_size(self.config.max_packet_size);
        self.read_buf.clear();
        self.transport = Some(transport);
        self.session.connecting(self.config.keep_alive_interval());

        let pkt = codec::Connect {
            version: self.config.version,
            clean_session: self.config.clean_session,
            keep_alive: self.config.keep_alive,
            last_will: self.last_will.clone(),
            client_id: self.client_id.clone(),
            username: self.config.username.as_deref().map(ByteString::from),
            password: self.config.password.as_deref().map(|s| Bytes::copy_from_slice(s.as_bytes())),
        };
        log::debug!("Connecting client {:?}, clean session: {}", self.client_id, pkt.clean_session);
        self.send(pkt.into()).map(|_| ())
    }

    /// Send DISCONNECT and release the transport.
    ///
    /// All pending exchanges and inbound receipts are dropped, no callback
    /// is invoked after this call.
    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        if self.session.state() == State::Disconnected {
            return Err(ClientError::NotConnected);
        }
        self.session.set_state(State::Disconnecting);

        let mut buf = BytesMut::new();
        self.codec.encode(Packet::Disconnect, &mut buf)?;
        if let Some(ref mut transport) = self.transport {
            if let Err(err) = write_all(transport, &buf) {
                log::warn!("Cannot send disconnect packet: {}", err);
            }
        }
        self.release_transport();
        self.inflight.clear();
        self.session.clear_receipts();
        Ok(())
    }

    /// Transport was closed by the host or peer
    pub fn closed(&mut self) {
        if self.session.state() != State::Disconnected {
            log::debug!("Transport closed for client {:?}", self.client_id);
            self.transport = None;
            self.session.set_state(State::Disconnected);
            self.read_buf.clear();
        }
    }

    /// Subscribe to topic filters, returns packet identifier of the request
    pub fn subscribe(&mut self, topic_filters: &[(&str, QoS)]) -> Result<NonZeroU16, ClientError> {
        self.check_connected()?;
        self.check_topics(topic_filters.iter().map(|(topic, _)| *topic), topic_filters.len())?;
        let packet_id = self.inflight.next_id().ok_or(ClientError::MaxInFlight)?;

        let pkt = Packet::Subscribe {
            packet_id,
            topic_filters: topic_filters
                .iter()
                .map(|(topic, qos)| (ByteString::from(*topic), *qos))
                .collect(),
        };
        let buf = self.send(pkt)?;
        log::trace!("Subscribe request with id {} is sent", packet_id);
        self.inflight.insert(Pending::new(packet_id, Kind::Subscribe, buf, QoS::AtLeastOnce));
        Ok(packet_id)
    }

    /// Unsubscribe from topic filters, returns packet identifier of the request
    pub fn unsubscribe(&mut self, topic_filters: &[&str]) -> Result<NonZeroU16, ClientError> {
        self.check_connected()?;
        self.check_topics(topic_filters.iter().copied(), topic_filters.len())?;
        let packet_id = self.inflight.next_id().ok_or(ClientError::MaxInFlight)?;

        let pkt = Packet::Unsubscribe {
            packet_id,
            topic_filters: topic_filters.iter().map(|topic| ByteString::from(*topic)).collect(),
        };
        let buf = self.send(pkt)?;
        log::trace!("Unsubscribe request with id {} is sent", packet_id);
        self.inflight.insert(Pending::new(packet_id, Kind::Unsubscribe, buf, QoS::AtLeastOnce));
        Ok(packet_id)
    }

    /// Publish application message.
    ///
    /// Returns packet identifier for QoS1 and QoS2 messages.
    pub fn publish<P>(
        &mut self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: P,
    ) -> Result<Option<NonZeroU16>, ClientError>
    where
        Bytes: From<P>,
    {
        self.check_connected()?;
        ensure!(!topic.is_empty(), ClientError::MissingArgument("topic"));

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            Some(self.inflight.next_id().ok_or(ClientError::MaxInFlight)?)
        };
        let pkt = Publish {
            qos,
            retain,
            packet_id,
            dup: false,
            topic: ByteString::from(topic),
            payload: payload.into(),
        };
        log::trace!("Publish to {:?} qos: {:?} id: {:?}", pkt.topic, qos, packet_id);

        let buf = self.send(pkt.into())?;
        if let Some(packet_id) = packet_id {
            self.inflight.insert(Pending::new(packet_id, Kind::Publish, buf, qos));
        }
        Ok(packet_id)
    }

    fn check_connected(&self) -> Result<(), ClientError> {
        if self.session.state() == State::Connected {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    fn check_topics<'a, I>(&self, mut topics: I, len: usize) -> Result<(), ClientError>
    where
        I: Iterator<Item = &'a str>,
    {
        ensure!(len != 0, ClientError::MissingArgument("topic_filters"));
        let max = self.config.max_subscriptions;
        ensure!(max == 0 || len <= max, ClientError::MaxSubscriptions(len));
        ensure!(topics.all(|topic| !topic.is_empty()), ClientError::MissingArgument("topic"));
        Ok(())
    }

    /// Encode and write packet, returns encoded bytes
    pub(crate) fn send(&mut self, pkt: Packet) -> Result<BytesMut, ClientError> {
        let mut buf = BytesMut::new();
        self.codec.encode(pkt, &mut buf).map_err(|err: EncodeError| {
            log::error!("Cannot encode packet: {}", err);
            ClientError::Encode(err)
        })?;
        self.write(&buf)?;
        Ok(buf)
    }

    /// Write raw bytes, connection is aborted on failure
    pub(crate) fn write(&mut self, buf: &[u8]) -> Result<(), ClientError> {
        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;
        match write_all(transport, buf) {
            Ok(()) => {
                self.session.keep_alive.touch();
                Ok(())
            }
            Err(err) => {
                log::error!("Transport write failed: {}", err);
                self.abort();
                Err(ClientError::Write(err))
            }
        }
    }

    /// Abnormal connection teardown.
    ///
    /// Pending exchanges are kept for session resumption.
    pub(crate) fn abort(&mut self) {
        self.release_transport();
        self.read_buf.clear();
        self.codec.reset();
    }

    fn release_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.session.set_state(State::Disconnected);
    }
}

fn write_all<T: Transport>(transport: &mut T, buf: &[u8]) -> io::Result<()> {
    let size = transport.write(buf)?;
    if size == buf.len() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short write, {} of {} bytes", size, buf.len()),
        ))
    }
}
