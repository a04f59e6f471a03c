use std::num::NonZeroU16;
use std::time::Duration;

use fxhash::FxHashSet;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// Connection state of the client
pub enum State {
    /// No transport is bound
    Disconnected,
    /// CONNECT is sent, waiting for CONNACK
    Connecting,
    /// Broker accepted connection
    Connected,
    /// DISCONNECT is being sent
    Disconnecting,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum KeepAliveStatus {
    Idle,
    /// Ping is due
    Ping,
    /// Ping was not answered within retry interval
    Expired,
}

#[derive(Debug)]
/// Keep-alive tracker
pub(crate) struct KeepAlive {
    interval: Duration,
    /// time since last outbound packet
    idle: Duration,
    /// time since ping was sent
    ping: Option<Duration>,
}

impl KeepAlive {
    pub(crate) fn new(interval: Duration) -> Self {
        KeepAlive { interval, idle: Duration::ZERO, ping: None }
    }

    /// Outbound packet was written
    pub(crate) fn touch(&mut self) {
        self.idle = Duration::ZERO;
    }

    pub(crate) fn ping_sent(&mut self) {
        self.ping = Some(Duration::ZERO);
    }

    pub(crate) fn pong(&mut self) -> bool {
        self.ping.take().is_some()
    }

    pub(crate) fn tick(&mut self, elapsed: Duration, retry: Duration) -> KeepAliveStatus {
        self.idle += elapsed;
        if let Some(ref mut ping) = self.ping {
            *ping += elapsed;
            if *ping >= retry {
                return KeepAliveStatus::Expired;
            }
            KeepAliveStatus::Idle
        } else if !self.interval.is_zero() && self.idle >= self.interval {
            KeepAliveStatus::Ping
        } else {
            KeepAliveStatus::Idle
        }
    }

    /// Time until the next keep-alive event
    pub(crate) fn remaining(&self, retry: Duration) -> Option<Duration> {
        if let Some(ping) = self.ping {
            Some(retry.saturating_sub(ping))
        } else if self.interval.is_zero() {
            None
        } else {
            Some(self.interval.saturating_sub(self.idle))
        }
    }
}

#[derive(Debug)]
/// Connection lifecycle and inbound QoS2 receipts
pub(crate) struct Session {
    state: State,
    /// time since CONNECT was sent
    pub(crate) connect_elapsed: Duration,
    pub(crate) keep_alive: KeepAlive,
    /// QoS2 publishes delivered to the application, waiting for PUBREL
    receipts: FxHashSet<NonZeroU16>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Session {
            state: State::Disconnected,
            connect_elapsed: Duration::ZERO,
            keep_alive: KeepAlive::new(Duration::ZERO),
            receipts: FxHashSet::default(),
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: State) {
        if self.state != state {
            log::debug!("Session state changed {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    pub(crate) fn connecting(&mut self, keep_alive: Duration) {
        self.set_state(State::Connecting);
        self.connect_elapsed = Duration::ZERO;
        self.keep_alive = KeepAlive::new(keep_alive);
    }

    /// Record inbound QoS2 publish, returns `false` for a duplicate
    pub(crate) fn receive(&mut self, packet_id: NonZeroU16) -> bool {
        self.receipts.insert(packet_id)
    }

    pub(crate) fn release(&mut self, packet_id: NonZeroU16) -> bool {
        self.receipts.remove(&packet_id)
    }

    pub(crate) fn clear_receipts(&mut self) {
        self.receipts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn test_keep_alive_ping() {
        let mut ka = KeepAlive::new(SEC * 2);
        assert_eq!(ka.remaining(SEC), Some(SEC * 2));
        assert_eq!(ka.tick(SEC, SEC), KeepAliveStatus::Idle);
        assert_eq!(ka.remaining(SEC), Some(SEC));
        assert_eq!(ka.tick(SEC, SEC), KeepAliveStatus::Ping);

        ka.ping_sent();
        ka.touch();
        assert_eq!(ka.remaining(SEC), Some(SEC));
        assert!(ka.pong());
        assert!(!ka.pong());
        assert_eq!(ka.tick(SEC, SEC), KeepAliveStatus::Idle);
    }

    #[test]
    fn test_keep_alive_expired() {
        let mut ka = KeepAlive::new(SEC);
        assert_eq!(ka.tick(SEC, SEC), KeepAliveStatus::Ping);
        ka.ping_sent();
        ka.touch();
        assert_eq!(ka.tick(SEC / 2, SEC), KeepAliveStatus::Idle);
        assert_eq!(ka.tick(SEC / 2, SEC), KeepAliveStatus::Expired);
    }

    #[test]
    fn test_keep_alive_disabled() {
        let mut ka = KeepAlive::new(Duration::ZERO);
        assert_eq!(ka.remaining(SEC), None);
        assert_eq!(ka.tick(SEC * 100, SEC), KeepAliveStatus::Idle);
    }

    #[test]
    fn test_receipts() {
        let mut session = Session::new();
        let id = NonZeroU16::new(7).unwrap();
        assert!(session.receive(id));
        assert!(!session.receive(id));
        assert!(session.release(id));
        assert!(!session.release(id));
        assert!(session.receive(id));
        session.clear_receipts();
        assert!(!session.release(id));
    }

    #[test]
    fn test_state() {
        let mut session = Session::new();
        assert_eq!(session.state(), State::Disconnected);
        session.connecting(SEC);
        assert_eq!(session.state(), State::Connecting);
        session.set_state(State::Connected);
        assert_eq!(session.state(), State::Connected);
    }
}
