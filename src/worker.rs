use std::{
    io::{self, ErrorKind},
    net::TcpStream,
    time::Duration,
};

use bincode::{Decode, Encode};
use log::warn;

use crate::{
    server::Handler,
    transport::{Transport, TransportError},
};

/// Read timeout on accepted connections. Bounds how long an idle worker stays
/// parked on a silent peer. Not currently configurable.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Serve one accepted connection, logging any failure.
///
/// Failures are scoped to this connection: the stream is torn down, the peer
/// is not notified, and neither the accept loop nor other workers are
/// affected.
pub(crate) fn run<Req, Rep>(stream: TcpStream, handler: Handler<Req, Rep>)
where
    Req: Decode<()>,
    Rep: Encode,
{
    if let Err(e) = serve(stream, handler) {
        warn!("closing connection after error: {e}");
    }
}

fn serve<Req, Rep>(stream: TcpStream, handler: Handler<Req, Rep>) -> Result<(), TransportError>
where
    Req: Decode<()>,
    Rep: Encode,
{
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let mut transport = Transport::new(stream);

    loop {
        let request: Req = transport.read_payload()?;

        if let Some(reply) = handler(request) {
            transport.write_payload(&reply)?;
        }

        // Serve another request on this connection only if its bytes are
        // already sitting in the socket buffer. A peer that has not sent yet
        // gets exactly one exchange; this is opportunistic pipelining, not a
        // keep-alive protocol.
        if !has_buffered_input(transport.get_ref())? {
            break;
        }
    }

    Ok(())
}

fn has_buffered_input(stream: &TcpStream) -> io::Result<bool> {
    stream.set_nonblocking(true)?;

    let mut probe = [0u8; 1];
    let available = match stream.peek(&mut probe) {
        Ok(n) => Ok(n > 0),
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    };

    stream.set_nonblocking(false)?;
    available
}
