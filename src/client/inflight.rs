use std::collections::VecDeque;
use std::num::NonZeroU16;
use std::time::Duration;

use fxhash::FxHashSet;
use ntex_bytes::BytesMut;

use crate::types::{packet_type, QoS};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Kind of request the exchange was started by
pub(crate) enum Kind {
    Publish,
    Subscribe,
    Unsubscribe,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Acknowledgement the exchange is waiting for
pub(crate) enum Stage {
    AwaitingPuback,
    AwaitingPubrec,
    AwaitingPubcomp,
    AwaitingSuback,
    AwaitingUnsuback,
}

#[derive(Debug)]
/// In-flight exchange, QoS1/QoS2 publish, subscribe or unsubscribe
pub(crate) struct Pending {
    pub(crate) packet_id: NonZeroU16,
    pub(crate) kind: Kind,
    /// last packet sent for the current stage
    pub(crate) packet: BytesMut,
    pub(crate) qos: QoS,
    pub(crate) retain: bool,
    pub(crate) stage: Stage,
    /// time since last (re)send
    pub(crate) elapsed: Duration,
    pub(crate) retries: u32,
}

impl Pending {
    pub(crate) fn new(packet_id: NonZeroU16, kind: Kind, packet: BytesMut, qos: QoS) -> Self {
        let stage = match kind {
            Kind::Publish if qos == QoS::ExactlyOnce => Stage::AwaitingPubrec,
            Kind::Publish => Stage::AwaitingPuback,
            Kind::Subscribe => Stage::AwaitingSuback,
            Kind::Unsubscribe => Stage::AwaitingUnsuback,
        };
        let retain = kind == Kind::Publish && packet[0] & 0b0000_0001 != 0;
        Pending {
            packet_id,
            kind,
            packet,
            qos,
            retain,
            stage,
            elapsed: Duration::ZERO,
            retries: 0,
        }
    }

    /// Packet for retransmission.
    ///
    /// Re-sent publish packets carry DUP flag.
    pub(crate) fn retransmit(&mut self) -> &[u8] {
        if self.stage == Stage::AwaitingPuback || self.stage == Stage::AwaitingPubrec {
            self.packet[0] |= packet_type::DUP_FLAG;
        }
        self.elapsed = Duration::ZERO;
        self.retries += 1;
        &self.packet
    }

    /// Peer received publish, waiting for completion of PUBREL
    pub(crate) fn released(&mut self, pubrel: BytesMut) {
        self.stage = Stage::AwaitingPubcomp;
        self.packet = pubrel;
        self.elapsed = Duration::ZERO;
    }

    pub(crate) fn remaining(&self, retry: Duration) -> Duration {
        retry.saturating_sub(self.elapsed)
    }
}

#[derive(Debug, Default)]
/// Pending table and packet identifier allocator
pub(crate) struct Inflight {
    next_id: u16,
    pending: VecDeque<Pending>,
    ids: FxHashSet<NonZeroU16>,
}

impl Inflight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate packet identifier that is not used by any pending exchange.
    ///
    /// Ids grow monotonically and wrap, zero is skipped. Returns `None`
    /// if every identifier is in use, allocator state is not changed.
    pub(crate) fn next_id(&mut self) -> Option<NonZeroU16> {
        if self.ids.len() >= usize::from(u16::MAX) {
            return None;
        }
        let mut idx = self.next_id;
        for _ in 0..u16::MAX {
            idx = if idx == u16::MAX { 1 } else { idx + 1 };
            if let Some(id) = NonZeroU16::new(idx) {
                if !self.ids.contains(&id) {
                    self.next_id = idx;
                    return Some(id);
                }
            }
        }
        None
    }

    pub(crate) fn insert(&mut self, pending: Pending) {
        log::trace!(
            "Track {:?} exchange with id {}, qos: {:?}, retain: {}",
            pending.kind,
            pending.packet_id,
            pending.qos,
            pending.retain
        );
        self.ids.insert(pending.packet_id);
        self.pending.push_back(pending);
    }

    pub(crate) fn get_mut(&mut self, packet_id: NonZeroU16) -> Option<&mut Pending> {
        if self.ids.contains(&packet_id) {
            self.pending.iter_mut().find(|p| p.packet_id == packet_id)
        } else {
            None
        }
    }

    /// Remove exchange if it waits for the given acknowledgement
    pub(crate) fn complete(&mut self, packet_id: NonZeroU16, stage: Stage) -> Option<Pending> {
        if !self.ids.contains(&packet_id) {
            return None;
        }
        let idx = self.pending.iter().position(|p| p.packet_id == packet_id)?;
        if self.pending[idx].stage != stage {
            return None;
        }
        self.ids.remove(&packet_id);
        self.pending.remove(idx)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Pending> {
        self.pending.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pending> {
        self.pending.iter_mut()
    }

    /// Ids of pending exchanges in send order
    pub(crate) fn ids(&self) -> Vec<NonZeroU16> {
        self.pending.iter().map(|p| p.packet_id).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.ids.clear();
        self.next_id = 0;
    }
}
