use std::{marker::PhantomData, net::TcpStream, sync::Mutex};

use bincode::{Decode, Encode, error::DecodeError};

use crate::transport::{Transport, TransportError};

/// A client for [`Server`](crate::Server).
///
/// Each send opens a fresh connection, performs one exchange and tears the
/// connection down; there is no reuse and no pooling. Sends on one `Client`
/// are mutually exclusive: a concurrent caller blocks until the prior call's
/// connection is fully closed.
pub struct Client<Req, Rep> {
    host: String,
    port: u16,
    sending: Mutex<()>,
    _exchange: PhantomData<fn(Req) -> Rep>,
}

impl<Req, Rep> Client<Req, Rep>
where
    Req: Encode,
    Rep: Decode<()>,
{
    /// Create a client for the given host and port. No network activity
    /// happens until a send.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            sending: Mutex::new(()),
            _exchange: PhantomData,
        }
    }

    /// Send a request and wait for a single reply.
    ///
    /// Returns `Ok(None)` both when the handler produced no reply and when
    /// the peer closed the connection before replying; the two are
    /// indistinguishable to the caller. Connection failures and replies of an
    /// unexpected shape are errors.
    pub fn send_replied(&self, request: Req) -> Result<Option<Rep>, TransportError> {
        let _guard = self.sending.lock().unwrap();
        let mut transport = self.connect()?;

        transport.write_payload(&request)?;

        match transport.read_payload() {
            Ok(reply) => Ok(Some(reply)),
            Err(TransportError::Deserialize(e)) if connection_lost(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Send a request without waiting for a reply.
    ///
    /// Fire-and-forget: the connection is closed as soon as the request is
    /// written, with no acknowledgment of delivery, even if the handler would
    /// produce a reply.
    pub fn send_unreplied(&self, request: Req) -> Result<(), TransportError> {
        let _guard = self.sending.lock().unwrap();
        let mut transport = self.connect()?;

        transport.write_payload(&request)
    }

    fn connect(&self) -> Result<Transport<TcpStream>, TransportError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))?;
        Ok(Transport::new(stream))
    }
}

/// A decode failure that means the peer went away, rather than that it sent
/// an unintelligible payload.
fn connection_lost(err: &DecodeError) -> bool {
    matches!(
        err,
        DecodeError::Io { .. } | DecodeError::UnexpectedEnd { .. }
    )
}
