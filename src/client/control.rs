use std::num::NonZeroU16;

use crate::codec::{ConnectAck, Publish, SubscribeReturnCode};
use crate::error::ClientError;

use super::Client;

pub(crate) type ConnackFn<T, U> =
    Box<dyn FnMut(&mut Client<T, U>, Result<ConnectAck, ClientError>)>;
pub(crate) type SubackFn<T, U> =
    Box<dyn FnMut(&mut Client<T, U>, NonZeroU16, &[SubscribeReturnCode])>;
pub(crate) type AckFn<T, U> = Box<dyn FnMut(&mut Client<T, U>, NonZeroU16)>;
pub(crate) type PublishFn<T, U> = Box<dyn FnMut(&mut Client<T, U>, &Publish)>;

/// Application callbacks.
///
/// Every callback receives the client itself, so it is possible to
/// publish, subscribe or disconnect from within a callback.
pub struct Callbacks<T, U> {
    pub(crate) connack: Option<ConnackFn<T, U>>,
    pub(crate) suback: Option<SubackFn<T, U>>,
    pub(crate) unsuback: Option<AckFn<T, U>>,
    pub(crate) puback: Option<AckFn<T, U>>,
    pub(crate) publish: Option<PublishFn<T, U>>,
}

impl<T, U> Default for Callbacks<T, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, U> Callbacks<T, U> {
    pub fn new() -> Self {
        Callbacks { connack: None, suback: None, unsuback: None, puback: None, publish: None }
    }

    /// Connect acknowledgement or connect failure.
    ///
    /// Rejected connection is reported with `Ok(ack)` and non-accepted
    /// return code, missing acknowledgement with `Err(ClientError::Timeout)`.
    pub fn on_connack<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Client<T, U>, Result<ConnectAck, ClientError>) + 'static,
    {
        self.connack = Some(Box::new(f));
        self
    }

    /// Subscribe acknowledgement with per-topic status
    pub fn on_suback<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Client<T, U>, NonZeroU16, &[SubscribeReturnCode]) + 'static,
    {
        self.suback = Some(Box::new(f));
        self
    }

    /// Unsubscribe acknowledgement
    pub fn on_unsuback<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Client<T, U>, NonZeroU16) + 'static,
    {
        self.unsuback = Some(Box::new(f));
        self
    }

    /// Outbound publish is acknowledged, PUBACK for QoS1 and PUBCOMP for QoS2
    pub fn on_puback<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Client<T, U>, NonZeroU16) + 'static,
    {
        self.puback = Some(Box::new(f));
        self
    }

    /// Inbound application message
    pub fn on_publish<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Client<T, U>, &Publish) + 'static,
    {
        self.publish = Some(Box::new(f));
        self
    }
}

/// Invoke callback slot, the slot stays empty while callback runs
macro_rules! fire {
    ($client:expr, $slot:ident, $($arg:expr),*) => {{
        if let Some(mut f) = $client.callbacks.$slot.take() {
            f(&mut *$client, $($arg),*);
            $client.callbacks.$slot = Some(f);
        }
    }};
}

pub(crate) use fire;
