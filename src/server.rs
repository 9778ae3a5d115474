use std::{
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use bincode::{Decode, Encode};
use log::{debug, info, warn};
use thiserror::Error;

use crate::{thread::ThreadPool, worker};

const DEFAULT_WORKER_COUNT: usize = 20;

/// User-supplied request handler, shared across all workers.
///
/// Returning `None` means the request gets no reply.
pub type Handler<Req, Rep> = Arc<dyn Fn(Req) -> Option<Rep> + Send + Sync>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },
}

/// A generic, multithreaded, message-based TCP server.
///
/// Each accepted connection is dispatched to a fixed-size worker pool, where
/// the request payload is decoded, handed to the handler, and the reply (if
/// any) written back. The server is idle until [`start`](Server::start) is
/// called; [`shutdown`](Server::shutdown) stops admitting new connections but
/// does not cancel in-flight workers.
pub struct Server<Req, Rep> {
    handler: Handler<Req, Rep>,
    port: u16,
    worker_count: usize,
    shared: Arc<Shared>,
    supervisor: Option<JoinHandle<()>>,
}

/// State the supervising thread and the lifecycle methods both touch.
#[derive(Debug, Default)]
struct Shared {
    bound: Mutex<Option<SocketAddr>>,
    stopping: AtomicBool,
}

impl<Req, Rep> Server<Req, Rep>
where
    Req: Decode<()> + 'static,
    Rep: Encode + 'static,
{
    /// Create a server for the given port, without binding it yet.
    ///
    /// A port of 0 asks the OS for a free one when the server starts; the
    /// assigned port can be read back with [`port`](Server::port). Out-of-range
    /// ports are unrepresentable in a `u16`, so an invalid port can never
    /// survive past construction.
    pub fn new<F>(handler: F, port: u16) -> Self
    where
        F: Fn(Req) -> Option<Rep> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            port,
            worker_count: DEFAULT_WORKER_COUNT,
            shared: Arc::new(Shared::default()),
            supervisor: None,
        }
    }

    /// Bind the listener and spawn the accept loop.
    ///
    /// Non-blocking; a no-op if the server is already running. A bind failure
    /// is the only error a running server cannot scope to a single
    /// connection, and it is reported here rather than taking the process
    /// down.
    pub fn start(&mut self) -> Result<(), ServerError> {
        if self.is_running() {
            return Ok(());
        }

        let listener = TcpListener::bind(("0.0.0.0", self.port)).map_err(|source| {
            ServerError::Bind {
                port: self.port,
                source,
            }
        })?;
        let addr = listener.local_addr().map_err(|source| ServerError::Bind {
            port: self.port,
            source,
        })?;
        info!("listening at {addr}");

        self.shared.stopping.store(false, Ordering::SeqCst);
        *self.shared.bound.lock().unwrap() = Some(addr);

        let shared = Arc::clone(&self.shared);
        let handler = Arc::clone(&self.handler);
        let pool_size = self.worker_count;

        self.supervisor = Some(thread::spawn(move || {
            let pool = ThreadPool::new(pool_size);

            loop {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        if shared.stopping.load(Ordering::SeqCst) {
                            break;
                        }
                        debug!("accepted connection from {peer}");
                        let handler = Arc::clone(&handler);
                        pool.execute(move || worker::run(stream, handler));
                    }
                    Err(e) => {
                        warn!("accept failed, stopping: {e}");
                        break;
                    }
                }
            }

            *shared.bound.lock().unwrap() = None;
            // dropping the listener closes the socket; dropping the pool
            // stops it admitting new work without cancelling in-flight
            // workers
        }));

        Ok(())
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    ///
    /// Blocking; a no-op if the server was never started or has already
    /// stopped. In-flight workers keep running to completion. The server may
    /// be started again afterwards.
    pub fn shutdown(&mut self) {
        let Some(supervisor) = self.supervisor.take() else {
            return;
        };

        if !supervisor.is_finished() {
            self.shared.stopping.store(true, Ordering::SeqCst);

            // The accept loop sits in a blocking accept; poke it awake with a
            // throwaway loopback connection so it observes the flag.
            let port = self.shared.bound.lock().unwrap().map(|addr| addr.port());
            if let Some(port) = port {
                let _ = TcpStream::connect(("127.0.0.1", port));
            }
        }

        let _ = supervisor.join();
    }

    /// The live bound port while the socket is open, else the configured one.
    ///
    /// A server constructed with port 0 reports 0 until it is started.
    pub fn port(&self) -> u16 {
        match *self.shared.bound.lock().unwrap() {
            Some(addr) => addr.port(),
            None => self.port,
        }
    }

    /// Whether the supervising thread is alive.
    pub fn is_running(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_some_and(|supervisor| !supervisor.is_finished())
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Set the worker pool size. The size is snapshotted by `start`, so
    /// calling this on a running server has no effect and is ignored.
    pub fn set_worker_count(&mut self, count: usize) {
        assert!(count > 0, "worker count must be positive");

        if self.is_running() {
            warn!("worker count can only change before start, ignoring");
            return;
        }
        self.worker_count = count;
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, time::Duration};

    use crate::Client;

    use super::*;

    fn word_number_server() -> Server<String, i32> {
        Server::new(
            |word: String| {
                Some(match word.as_str() {
                    "one" => 1,
                    "two" => 2,
                    _ => 0,
                })
            },
            0,
        )
    }

    #[test]
    fn replied_requests_round_trip() {
        let mut server = word_number_server();
        server.start().unwrap();

        let client: Client<String, i32> = Client::new("127.0.0.1", server.port());
        assert_eq!(client.send_replied("one".to_string()).unwrap(), Some(1));
        assert_eq!(client.send_replied("two".to_string()).unwrap(), Some(2));
        assert_eq!(client.send_replied("three".to_string()).unwrap(), Some(0));

        server.shutdown();
    }

    #[test]
    fn structured_requests_round_trip() {
        let mut server: Server<Vec<String>, i32> =
            Server::new(|words: Vec<String>| Some(i32::from(words == ["one", "two"])), 0);
        server.start().unwrap();

        let client: Client<Vec<String>, i32> = Client::new("127.0.0.1", server.port());
        assert_eq!(
            client
                .send_replied(vec!["one".into(), "two".into()])
                .unwrap(),
            Some(1)
        );
        assert_eq!(client.send_replied(Vec::new()).unwrap(), Some(0));

        server.shutdown();
    }

    #[test]
    fn absent_reply_reads_as_none() {
        let mut server: Server<String, i32> = Server::new(|_| None, 0);
        server.start().unwrap();

        let client: Client<String, i32> = Client::new("127.0.0.1", server.port());
        assert_eq!(client.send_replied("quiet".to_string()).unwrap(), None);

        server.shutdown();
    }

    #[test]
    fn unreplied_requests_reach_the_handler() {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let mut server: Server<String, String> = Server::new(
            move |word: String| {
                tx.lock().unwrap().send(word.clone()).unwrap();
                Some(word)
            },
            0,
        );
        server.start().unwrap();

        let client: Client<String, String> = Client::new("127.0.0.1", server.port());
        client.send_unreplied("dropped a line".to_string()).unwrap();

        let seen = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(seen, "dropped a line");

        server.shutdown();
    }

    #[test]
    fn ephemeral_port_resolves_after_start() {
        let mut server = word_number_server();
        assert_eq!(server.port(), 0);

        server.start().unwrap();
        assert_ne!(server.port(), 0);
        assert!(server.is_running());

        server.shutdown();
        assert!(!server.is_running());
        assert_eq!(server.port(), 0);
    }

    #[test]
    fn explicit_port_is_kept() {
        let port = {
            let probe = TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };

        let mut server: Server<String, i32> = Server::new(|_| Some(0), port);
        assert_eq!(server.port(), port);

        server.start().unwrap();
        assert_eq!(server.port(), port);

        server.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut server = word_number_server();
        server.shutdown();
        assert!(!server.is_running());

        server.start().unwrap();
        server.shutdown();
        server.shutdown();
        assert!(!server.is_running());
    }

    #[test]
    fn start_is_idempotent() {
        let mut server = word_number_server();
        server.start().unwrap();
        let port = server.port();

        server.start().unwrap();
        assert_eq!(server.port(), port);
        assert!(server.is_running());

        server.shutdown();
    }

    #[test]
    fn server_restarts_after_shutdown() {
        let mut server = word_number_server();
        server.start().unwrap();
        server.shutdown();

        server.start().unwrap();
        let client: Client<String, i32> = Client::new("127.0.0.1", server.port());
        assert_eq!(client.send_replied("one".to_string()).unwrap(), Some(1));

        server.shutdown();
    }

    #[test]
    fn bind_failure_is_reported() {
        let taken = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut server: Server<String, i32> = Server::new(|_| Some(0), port);
        let err = server.start().unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(!server.is_running());
    }

    #[test]
    fn worker_count_is_fixed_once_running() {
        let mut server = word_number_server();
        assert_eq!(server.worker_count(), 20);

        server.set_worker_count(4);
        assert_eq!(server.worker_count(), 4);

        server.start().unwrap();
        server.set_worker_count(8);
        assert_eq!(server.worker_count(), 4);

        server.shutdown();
    }

    #[test]
    fn concurrent_clients_get_their_own_replies() {
        let mut server: Server<i32, i32> = Server::new(|n| Some(n * 2), 0);
        server.start().unwrap();
        let port = server.port();

        let exchanges: Vec<_> = (0..8)
            .map(|n| {
                thread::spawn(move || {
                    let client: Client<i32, i32> = Client::new("127.0.0.1", port);
                    client.send_replied(n).unwrap()
                })
            })
            .collect();

        for (n, exchange) in exchanges.into_iter().enumerate() {
            assert_eq!(exchange.join().unwrap(), Some(n as i32 * 2));
        }

        server.shutdown();
    }
}
