//! Box Office Network Library
//!
//! Exposes a booking engine over TCP.
//!
//! # Architecture
//!
//! - **Server**: Accepts connections and answers requests against an engine
//! - **Client**: Sends one request and awaits its response
//! - **Protocol**: Length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! let engine = Arc::new(BookingEngine::open(Database::open(path)?, EngineConfig::default())?);
//! let server = Server::start(DEFAULT_PORT, engine, Duration::from_secs(5)).await?;
//!
//! let client = Client::connect(server.addr()).await?;
//! match client.request(Request::ListFreeSeats { session_id }).await? {
//!     Response::FreeSeats { seats } => { /* render */ }
//!     Response::Error(e) => { /* e.status, e.kind */ }
//!     _ => {}
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use client::Client;
pub use error::{Error, Result};
pub use protocol::{ErrorBody, ErrorKind, Request, Response};
pub use server::Server;

/// Default port for Box Office servers
pub const DEFAULT_PORT: u16 = 7341;
