use std::io;

/// Write side of a connection the client is bound to.
///
/// The client never reads from the transport. The host feeds inbound bytes
/// through [`Client::read`](crate::Client::read) as they arrive.
pub trait Transport {
    /// Write bytes to the peer, returns number of bytes written.
    ///
    /// Anything short of a complete write is treated as a failed connection.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Connection is being torn down by the client.
    fn close(&mut self) {}
}

impl<F> Transport for F
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self)(buf)
    }
}
