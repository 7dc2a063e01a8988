//! Transports
//!
//! A [`Connector`] opens [`TransportConnection`]s; the client pools them.
//!
//! - [`TcpConnector`]: framed protocol over `std::net::TcpStream`
//! - [`LocalConnector`]: in-process dispatch into a [`Service`], through the
//!   same codec so frame limits apply identically

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PathKvError, Result};
use crate::pool::Poolable;
use crate::protocol::{
    decode_request, decode_response, encode_request, encode_response, read_response,
    write_request, WireRequest, WireResponse,
};
use crate::service::Service;

/// One request/response channel
pub trait TransportConnection: Send {
    /// Send `request` and wait up to `timeout` for its response
    fn call(&mut self, request: &WireRequest, timeout: Duration) -> Result<WireResponse>;

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Opens transport connections
pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn TransportConnection>>;

    /// Where connections go, for logs
    fn describe(&self) -> String;
}

impl Poolable for Box<dyn TransportConnection> {
    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}

// =============================================================================
// TCP
// =============================================================================

/// Connects to a PathKV server over TCP
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn resolve(&self) -> Result<SocketAddr> {
        self.addr
            .to_socket_addrs()
            .map_err(|e| PathKvError::ConnectionFailed(format!("cannot resolve {}: {}", self.addr, e)))?
            .next()
            .ok_or_else(|| PathKvError::ConnectionFailed(format!("no address for {}", self.addr)))
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> Result<Box<dyn TransportConnection>> {
        let addr = self.resolve()?;
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|e| match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => PathKvError::Timeout(self.connect_timeout),
            _ => PathKvError::ConnectionFailed(format!("{}: {}", addr, e)),
        })?;
        stream.set_nodelay(true)?;

        let reader = BufReader::new(stream.try_clone()?);
        Ok(Box::new(TcpConnection {
            reader,
            writer: BufWriter::new(stream),
            healthy: true,
        }))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

struct TcpConnection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    healthy: bool,
}

impl TcpConnection {
    fn round_trip(&mut self, request: &WireRequest, timeout: Duration) -> Result<WireResponse> {
        let timeout = Some(timeout).filter(|t| !t.is_zero());
        self.writer.get_ref().set_write_timeout(timeout)?;
        self.reader.get_ref().set_read_timeout(timeout)?;

        write_request(&mut self.writer, request)?;
        read_response(&mut self.reader)
    }
}

impl TransportConnection for TcpConnection {
    fn call(&mut self, request: &WireRequest, timeout: Duration) -> Result<WireResponse> {
        self.round_trip(request, timeout).map_err(|e| {
            // Half-read frames leave the stream unusable
            self.healthy = false;
            match e {
                PathKvError::Io(io) => match io.kind() {
                    ErrorKind::TimedOut | ErrorKind::WouldBlock => PathKvError::Timeout(timeout),
                    ErrorKind::ConnectionRefused => PathKvError::ConnectionFailed(io.to_string()),
                    _ => PathKvError::Network(io.to_string()),
                },
                other => other,
            }
        })
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}

// =============================================================================
// In-process
// =============================================================================

/// Dispatches straight into a [`Service`] in the same process
#[derive(Clone)]
pub struct LocalConnector {
    service: Arc<Service>,
}

impl LocalConnector {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

impl Connector for LocalConnector {
    fn connect(&self) -> Result<Box<dyn TransportConnection>> {
        Ok(Box::new(LocalConnection {
            service: Arc::clone(&self.service),
        }))
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}

struct LocalConnection {
    service: Arc<Service>,
}

impl TransportConnection for LocalConnection {
    fn call(&mut self, request: &WireRequest, _timeout: Duration) -> Result<WireResponse> {
        let request = decode_request(&encode_request(request)?)?;
        let response = self.service.handle(&request);
        decode_response(&encode_response(&response)?)
    }
}
