use ntex_bytes::{BufMut, BytesMut};

use crate::error::EncodeError;
use crate::types::{ConnectFlags, QoS, MAX_PACKET_SIZE, WILL_QOS_SHIFT};
use crate::utils::{write_variable_length, Encode};

use super::packet::{Connect, Packet, Publish, SubscribeReturnCode};

/// Size of the packet without fixed header
pub(crate) fn body_size(packet: &Packet) -> usize {
    match packet {
        Packet::Connect(connect) => connect_size(connect),
        Packet::Publish(Publish { topic, packet_id, payload, .. }) => {
            topic.encoded_size() + packet_id.map_or(0, |id| id.encoded_size()) + payload.len()
        }
        Packet::Subscribe { topic_filters, .. } => {
            2 + topic_filters.iter().map(|(filter, _)| filter.encoded_size() + 1).sum::<usize>()
        }
        Packet::Unsubscribe { topic_filters, .. } => {
            2 + topic_filters.iter().map(Encode::encoded_size).sum::<usize>()
        }
        Packet::SubscribeAck { status, .. } => 2 + status.len(),
        Packet::ConnectAck(_)
        | Packet::PublishAck { .. }
        | Packet::PublishReceived { .. }
        | Packet::PublishRelease { .. }
        | Packet::PublishComplete { .. }
        | Packet::UnsubscribeAck { .. } => 2,
        Packet::PingRequest | Packet::PingResponse | Packet::Disconnect => 0,
    }
}

fn connect_size(connect: &Connect) -> usize {
    // protocol name, level, flags, keep-alive
    let mut size = 2 + connect.version.name().len() + 1 + 1 + 2;
    size += connect.client_id.encoded_size();
    if let Some(will) = &connect.last_will {
        size += will.topic.encoded_size() + will.message.encoded_size();
    }
    size += connect.username.as_ref().map_or(0, Encode::encoded_size);
    size += connect.password.as_ref().map_or(0, Encode::encoded_size);
    size
}

/// Write fixed header and body, `size` is `body_size` of the packet.
///
/// Publish packet id is checked before anything is written.
pub(crate) fn encode_packet(
    packet: &Packet,
    size: u32,
    dst: &mut BytesMut,
) -> Result<(), EncodeError> {
    ensure!(size <= MAX_PACKET_SIZE, EncodeError::InvalidLength);
    if let Packet::Publish(publish) = packet {
        match (publish.qos, publish.packet_id) {
            (QoS::AtMostOnce, Some(_)) => return Err(EncodeError::MalformedPacket),
            (QoS::AtLeastOnce | QoS::ExactlyOnce, None) => {
                return Err(EncodeError::PacketIdRequired)
            }
            _ => (),
        }
    }

    dst.put_u8(packet.first_byte());
    write_variable_length(size, dst);

    match packet {
        Packet::Connect(connect) => write_connect(connect, dst)?,
        Packet::ConnectAck(ack) => {
            dst.put_u8(u8::from(ack.session_present));
            dst.put_u8(ack.return_code.into());
        }
        Packet::Publish(publish) => {
            publish.topic.encode(dst)?;
            if let Some(packet_id) = publish.packet_id {
                packet_id.encode(dst)?;
            }
            dst.put_slice(&publish.payload);
        }
        Packet::PublishAck { packet_id }
        | Packet::PublishReceived { packet_id }
        | Packet::PublishRelease { packet_id }
        | Packet::PublishComplete { packet_id }
        | Packet::UnsubscribeAck { packet_id } => packet_id.encode(dst)?,
        Packet::Subscribe { packet_id, topic_filters } => {
            packet_id.encode(dst)?;
            for (filter, qos) in topic_filters {
                filter.encode(dst)?;
                dst.put_u8((*qos).into());
            }
        }
        Packet::SubscribeAck { packet_id, status } => {
            packet_id.encode(dst)?;
            for code in status {
                dst.put_u8(match code {
                    SubscribeReturnCode::Success(qos) => (*qos).into(),
                    SubscribeReturnCode::Failure => 0x80,
                });
            }
        }
        Packet::Unsubscribe { packet_id, topic_filters } => {
            packet_id.encode(dst)?;
            for filter in topic_filters {
                filter.encode(dst)?;
            }
        }
        Packet::PingRequest | Packet::PingResponse | Packet::Disconnect => (),
    }
    Ok(())
}

fn connect_flags(connect: &Connect) -> ConnectFlags {
    let mut flags = ConnectFlags::empty();
    flags.set(ConnectFlags::CLEAN_SESSION, connect.clean_session);
    flags.set(ConnectFlags::USERNAME, connect.username.is_some());
    flags.set(ConnectFlags::PASSWORD, connect.password.is_some());
    if let Some(will) = &connect.last_will {
        flags |= ConnectFlags::WILL;
        flags.set(ConnectFlags::WILL_RETAIN, will.retain);
        flags |= ConnectFlags::from_bits_truncate(u8::from(will.qos) << WILL_QOS_SHIFT);
    }
    flags
}

fn write_connect(connect: &Connect, dst: &mut BytesMut) -> Result<(), EncodeError> {
    let name = connect.version.name();
    dst.put_u16(name.len() as u16);
    dst.put_slice(name);
    dst.put_u8(connect.version.level());
    dst.put_u8(connect_flags(connect).bits());
    dst.put_u16(connect.keep_alive);

    connect.client_id.encode(dst)?;
    if let Some(will) = &connect.last_will {
        will.topic.encode(dst)?;
        will.message.encode(dst)?;
    }
    if let Some(username) = &connect.username {
        username.encode(dst)?;
    }
    if let Some(password) = &connect.password {
        password.encode(dst)?;
    }
    Ok(())
}
