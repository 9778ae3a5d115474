//! Generic request/reply messaging over TCP.
//!
//! Courier pairs a multithreaded, message-based TCP server with a matching
//! client. A client opens a connection, sends an opaque request payload, and
//! optionally waits for a single reply; the server accepts connections,
//! decodes payloads, passes them to a user-supplied handler function, and
//! writes back the handler's result when there is one.
//!
//! # Overview
//!
//! Request and reply types are generic: anything the codec can encode and
//! decode may cross the wire, and both ends must agree on the concrete types
//! out-of-band. The handler is a plain function value of shape
//! `Fn(Request) -> Option<Reply>` injected into the server at construction;
//! returning `None` means the request gets no reply.
//!
//! The server runs blocking I/O on a thread per connection, bounded by a
//! fixed-size worker pool. Within one connection, request and reply are
//! strictly ordered (one read, then at most one write); across connections
//! there is no ordering at all, and a failure on one connection never touches
//! another.
//!
//! # Key Components
//!
//! - [`Server`]: owns the listening socket and the worker pool; started and
//!   stopped explicitly, and idle until started.
//! - [`Client`]: opens one connection per call, with synchronous
//!   ([`send_replied`](Client::send_replied)) and fire-and-forget
//!   ([`send_unreplied`](Client::send_unreplied)) sends.
//! - [`Transport`]: the shared payload codec, layered directly on the stream.
//!
//! # Wire Format
//!
//! Payloads are bincode-encoded (big endian, fixed-width integers) straight
//! onto the TCP stream: no handshake, no version byte, no authentication, and
//! no framing beyond the encoding itself. One connection carries one exchange,
//! or opportunistically a few pipelined ones when further request bytes are
//! already buffered by the time a reply has been written. This is not a
//! negotiated keep-alive protocol: a sender that pauses between requests gets
//! one exchange per connection.
//!
//! # Caveats
//!
//! A [`send_replied`](Client::send_replied) that returns `Ok(None)` means
//! either that the handler produced no reply or that the server hung up before
//! replying; the two cases are deliberately collapsed and cannot be told
//! apart. Replies of an unexpected shape and failures to connect are real
//! errors and are never collapsed this way.
//!
//! # Example
//!
//! ```rust
//! use courier::{Client, Server};
//!
//! let mut server = Server::new(|name: String| Some(format!("hello {name}")), 0);
//! server.start().unwrap();
//!
//! let client: Client<String, String> = Client::new("127.0.0.1", server.port());
//! let reply = client.send_replied("world".to_string()).unwrap();
//! assert_eq!(reply.as_deref(), Some("hello world"));
//!
//! server.shutdown();
//! ```
pub mod client;
pub mod server;
mod thread;
pub mod transport;
mod worker;

pub use client::Client;
pub use server::{Handler, Server, ServerError};
pub use transport::{Transport, TransportError};
