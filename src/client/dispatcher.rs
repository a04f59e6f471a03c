use std::num::NonZeroU16;

use ntex_codec::Decoder;

use crate::codec::{ConnectAck, Packet, Publish, SubscribeReturnCode};
use crate::error::{ClientError, ProtocolError};
use crate::transport::Transport;
use crate::types::QoS;

use super::control::fire;
use super::inflight::Stage;
use super::{Client, State};

impl<T: Transport, U> Client<T, U> {
    /// Feed bytes received from the transport.
    ///
    /// Every complete packet is processed before the next one is decoded,
    /// incomplete packet stays buffered until more bytes arrive. Protocol
    /// violations close the connection.
    pub fn read(&mut self, data: &[u8]) -> Result<(), ClientError> {
        if self.session.state() == State::Disconnected {
            return Err(ClientError::NotConnected);
        }
        self.read_buf.extend_from_slice(data);

        while self.session.state() != State::Disconnected {
            match self.codec.decode(&mut self.read_buf) {
                Ok(Some(pkt)) => self.dispatch(pkt)?,
                Ok(None) => break,
                Err(err) => {
                    log::error!("Cannot decode inbound packet: {}", err);
                    self.abort();
                    return Err(ProtocolError::Decode(err).into());
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, pkt: Packet) -> Result<(), ClientError> {
        log::trace!("Dispatch packet: {:?}", pkt);

        match (self.session.state(), pkt) {
            (_, pkt) if pkt.is_broker_bound() => {
                self.protocol_error(pkt.name(), "Packet is not sent to clients")
            }
            (State::Connecting, Packet::ConnectAck(ack)) => self.on_connect_ack(ack),
            (State::Connecting, pkt) => self.protocol_error(pkt.name(), "Expected CONNACK packet"),
            (_, Packet::Publish(publish)) => self.on_publish(publish),
            (_, Packet::PublishAck { packet_id }) => {
                self.on_publish_complete(packet_id, Stage::AwaitingPuback);
                Ok(())
            }
            (_, Packet::PublishReceived { packet_id }) => self.on_publish_received(packet_id),
            (_, Packet::PublishRelease { packet_id }) => self.on_publish_release(packet_id),
            (_, Packet::PublishComplete { packet_id }) => {
                self.on_publish_complete(packet_id, Stage::AwaitingPubcomp);
                Ok(())
            }
            (_, Packet::SubscribeAck { packet_id, status }) => {
                self.on_subscribe_ack(packet_id, &status);
                Ok(())
            }
            (_, Packet::UnsubscribeAck { packet_id }) => {
                self.on_unsubscribe_ack(packet_id);
                Ok(())
            }
            (_, Packet::PingResponse) => {
                if !self.session.keep_alive.pong() {
                    log::debug!("Unsolicited ping response");
                }
                Ok(())
            }
            // second CONNACK
            (_, pkt) => self.protocol_error(pkt.name(), "Unexpected CONNACK packet"),
        }
    }

    fn protocol_error(&mut self, packet: &'static str, message: &'static str) -> Result<(), ClientError> {
        log::error!("{}, received {}", message, packet);
        self.abort();
        Err(ProtocolError::unexpected_packet(packet, message).into())
    }

    fn on_connect_ack(&mut self, ack: ConnectAck) -> Result<(), ClientError> {
        if ack.is_accepted() {
            log::debug!(
                "Client {:?} connected, session present: {}",
                self.client_id,
                ack.session_present
            );
            self.session.set_state(State::Connected);
            self.session.keep_alive.touch();

            // exchanges started from the callback are not part of the resumed session
            let resumed = if self.config.clean_session { Vec::new() } else { self.inflight.ids() };
            fire!(self, connack, Ok(ack));
            if self.is_connected() {
                self.resume(resumed)?;
            }
        } else {
            log::debug!("Client {:?} is refused: {}", self.client_id, ack.return_code.reason());
            self.abort();
            fire!(self, connack, Ok(ack));
        }
        Ok(())
    }

    /// Re-send pending exchanges of the resumed session
    fn resume(&mut self, ids: Vec<NonZeroU16>) -> Result<(), ClientError> {
        for packet_id in ids {
            if let Some(pending) = self.inflight.get_mut(packet_id) {
                log::trace!("Resume {:?} exchange with id {}", pending.stage, packet_id);
                let buf = pending.retransmit().to_vec();
                self.write(&buf)?;
            }
        }
        Ok(())
    }

    fn on_publish(&mut self, publish: Publish) -> Result<(), ClientError> {
        match (publish.qos, publish.packet_id) {
            (QoS::AtMostOnce, _) => {}
            (QoS::AtLeastOnce, Some(packet_id)) => {
                self.send(Packet::PublishAck { packet_id })?;
            }
            (QoS::ExactlyOnce, Some(packet_id)) => {
                // receipt is recorded after PUBREC is written
                self.send(Packet::PublishReceived { packet_id })?;
                if !self.session.receive(packet_id) {
                    log::debug!("Duplicate publish with id {}, skip delivery", packet_id);
                    return Ok(());
                }
            }
            (_, None) => {
                return self.protocol_error("PUBLISH", "Publish without packet id");
            }
        }
        fire!(self, publish, &publish);
        Ok(())
    }

    fn on_publish_release(&mut self, packet_id: NonZeroU16) -> Result<(), ClientError> {
        if !self.session.release(packet_id) {
            log::debug!("Release for unknown publish id {}", packet_id);
        }
        self.send(Packet::PublishComplete { packet_id })?;
        Ok(())
    }

    fn on_publish_received(&mut self, packet_id: NonZeroU16) -> Result<(), ClientError> {
        match self.inflight.get_mut(packet_id).map(|p| p.stage) {
            Some(Stage::AwaitingPubrec) | Some(Stage::AwaitingPubcomp) => {
                let buf = self.send(Packet::PublishRelease { packet_id })?;
                if let Some(pending) = self.inflight.get_mut(packet_id) {
                    log::trace!("Publish {} received by peer", packet_id);
                    pending.released(buf);
                }
            }
            _ => log::warn!("Unexpected publish received with id {}", packet_id),
        }
        Ok(())
    }

    fn on_publish_complete(&mut self, packet_id: NonZeroU16, stage: Stage) {
        if self.inflight.complete(packet_id, stage).is_some() {
            log::trace!("Publish {} acknowledged", packet_id);
            fire!(self, puback, packet_id);
        } else {
            log::warn!("Unexpected publish ack with id {}", packet_id);
        }
    }

    fn on_subscribe_ack(&mut self, packet_id: NonZeroU16, status: &[SubscribeReturnCode]) {
        if self.inflight.complete(packet_id, Stage::AwaitingSuback).is_some() {
            log::trace!("Subscribe {} acknowledged", packet_id);
            fire!(self, suback, packet_id, status);
        } else {
            log::warn!("Unexpected subscribe ack with id {}", packet_id);
        }
    }

    fn on_unsubscribe_ack(&mut self, packet_id: NonZeroU16) {
        if self.inflight.complete(packet_id, Stage::AwaitingUnsuback).is_some() {
            log::trace!("Unsubscribe {} acknowledged", packet_id);
            fire!(self, unsuback, packet_id);
        } else {
            log::warn!("Unexpected unsubscribe ack with id {}", packet_id);
        }
    }
}
