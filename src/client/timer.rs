use std::time::Duration;

use crate::codec::Packet;
use crate::error::ClientError;
use crate::transport::Transport;

use super::control::fire;
use super::session::KeepAliveStatus;
use super::{Client, State};

impl<T: Transport, U> Client<T, U> {
    /// Drive retry and keep-alive timers.
    ///
    /// `elapsed` is the time passed since the previous call. Returns
    /// suggested delay until the next call, or an error if the host should
    /// stop ticking: [`ClientError::Timeout`] when the broker did not answer
    /// CONNECT or ping in time, [`ClientError::NotConnected`] once the
    /// client is disconnected.
    pub fn update(&mut self, elapsed: Duration) -> Result<Duration, ClientError> {
        match self.session.state() {
            State::Disconnected | State::Disconnecting => Err(ClientError::NotConnected),
            State::Connecting => self.check_connect_timeout(elapsed),
            State::Connected => {
                self.retransmit_expired(elapsed)?;
                self.check_keep_alive(elapsed)?;
                Ok(self.next_delay())
            }
        }
    }

    fn check_connect_timeout(&mut self, elapsed: Duration) -> Result<Duration, ClientError> {
        self.session.connect_elapsed += elapsed;
        let timeout = self.config.connect_timeout;
        if self.session.connect_elapsed >= timeout {
            log::debug!("Connect ack timeout for client {:?}", self.client_id);
            self.abort();
            fire!(self, connack, Err(ClientError::Timeout));
            Err(ClientError::Timeout)
        } else {
            Ok(timeout - self.session.connect_elapsed)
        }
    }

    fn retransmit_expired(&mut self, elapsed: Duration) -> Result<(), ClientError> {
        let retry = self.config.retry_interval;
        let mut expired = Vec::new();
        for pending in self.inflight.iter_mut() {
            pending.elapsed += elapsed;
            if pending.elapsed >= retry {
                expired.push(pending.packet_id);
            }
        }

        for packet_id in expired {
            if let Some(pending) = self.inflight.get_mut(packet_id) {
                let buf = pending.retransmit().to_vec();
                log::debug!(
                    "Retransmit {:?} exchange with id {}, retry {}",
                    pending.stage,
                    packet_id,
                    pending.retries
                );
                self.write(&buf)?;
            }
        }
        Ok(())
    }

    fn check_keep_alive(&mut self, elapsed: Duration) -> Result<(), ClientError> {
        match self.session.keep_alive.tick(elapsed, self.config.retry_interval) {
            KeepAliveStatus::Idle => Ok(()),
            KeepAliveStatus::Ping => {
                log::trace!("Send keep-alive ping");
                self.send(Packet::PingRequest)?;
                self.session.keep_alive.ping_sent();
                Ok(())
            }
            KeepAliveStatus::Expired => {
                log::warn!("Keep-alive timeout, closing connection");
                self.abort();
                Err(ClientError::Timeout)
            }
        }
    }

    fn next_delay(&self) -> Duration {
        let retry = self.config.retry_interval;
        let pending = self.inflight.iter().map(|p| p.remaining(retry)).min();
        match (pending, self.session.keep_alive.remaining(retry)) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io, rc::Rc};

    use super::*;
    use crate::client::Callbacks;
    use crate::types::QoS;

    const SEC: Duration = Duration::from_secs(1);

    #[derive(Clone, Default)]
    struct Mock(Rc<RefCell<Vec<Vec<u8>>>>);

    impl Transport for Mock {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().push(buf.to_vec());
            Ok(buf.len())
        }
    }

    fn client(mock: &Mock) -> Client<Mock, Vec<bool>> {
        let callbacks = Callbacks::new().on_connack(|c: &mut Client<Mock, Vec<bool>>, res| {
            c.user_data_mut().push(res.is_ok());
        });
        let mut client = Client::new("timer", Vec::new(), callbacks);
        client.set_keep_alive(2).unwrap();
        client.set_retry_interval(SEC).unwrap();
        client.connect(mock.clone()).unwrap();
        client
    }

    #[test]
    fn test_connect_timeout() {
        let mock = Mock::default();
        let mut client = client(&mock);
        let timeout = client.config().connect_timeout();
        assert_eq!(client.update(SEC).unwrap(), timeout - SEC);
        assert!(matches!(client.update(timeout), Err(ClientError::Timeout)));
        assert_eq!(client.state(), State::Disconnected);
        assert_eq!(client.user_data(), &vec![false]);
        assert!(matches!(client.update(SEC), Err(ClientError::NotConnected)));
    }

    #[test]
    fn test_next_delay() {
        let mock = Mock::default();
        let mut client = client(&mock);
        client.read(b"\x20\x02\x00\x00").unwrap();
        assert_eq!(client.user_data(), &vec![true]);

        // keep-alive only
        assert_eq!(client.update(Duration::ZERO).unwrap(), SEC * 2);
        client.publish("t", QoS::AtLeastOnce, false, &b"x"[..]).unwrap();
        assert_eq!(client.update(SEC / 4).unwrap(), SEC * 3 / 4);
        assert_eq!(mock.0.borrow().len(), 2);
    }
}
