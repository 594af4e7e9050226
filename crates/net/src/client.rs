//! TCP client for a booking server

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Request, Response};

/// One connection to a booking server
///
/// Requests are answered in order, so a client carries at most one
/// outstanding request.
pub struct Client {
    addr: SocketAddr,
    reader: ReadHalf<TcpStream>,
    writer: WriteHalf<TcpStream>,
}

impl Client {
    /// Connect to a booking server
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = tokio::io::split(stream);
        Ok(Self {
            addr,
            reader,
            writer,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send a request and wait for its response
    pub async fn request(&mut self, request: Request) -> Result<Response> {
        debug!(request = request.name(), "Sending request");
        write_frame(&mut self.writer, &request).await?;
        read_frame(&mut self.reader).await
    }

    /// Send a request, giving up after `deadline`
    ///
    /// A timeout leaves the request's outcome unknown and the connection
    /// unusable; reconnect and query state before retrying.
    pub async fn request_with_timeout(
        &mut self,
        request: Request,
        deadline: Duration,
    ) -> Result<Response> {
        let name = request.name();
        match tokio::time::timeout(deadline, self.request(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(request = name, "No response before deadline");
                Err(Error::Timeout(deadline.as_millis() as u64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(matches!(Client::connect(addr).await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(stream);
        });

        let mut client = Client::connect(addr).await.unwrap();
        let result = client
            .request_with_timeout(Request::Ping, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(Error::Timeout(50))));
        accept.abort();
    }

    #[tokio::test]
    async fn test_closed_connection_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut client = Client::connect(addr).await.unwrap();
        let result = client.request(Request::Ping).await;
        assert!(matches!(
            result,
            Err(Error::ConnectionClosed) | Err(Error::Io(_))
        ));
    }
}
