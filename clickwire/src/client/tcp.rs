use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;

use crate::constants::*;
use crate::prelude::*;
use crate::{Error, Result};

/// Where to connect. Accepts raw socket addrs, host and port pairs, or
/// endpoint strings, converted through `From` so callers rarely name it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Destination {
    inner: DestinationInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum DestinationInner {
    SocketAddrs(Vec<SocketAddr>), // Pre-resolved, used as-is
    SocketAddr(SocketAddr),       // Direct SocketAddr (e.g., 127.0.0.1:9000)
    HostPort(String, u16),        // Hostname and port (e.g., "localhost", 9000)
    Endpoint(String),             // String to parse (e.g., "localhost:9000")
}

impl Destination {
    /// Resolve to Vec<SocketAddr> using [`tokio::net::lookup_host`]
    pub(crate) async fn resolve(&self, ipv4_only: bool) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = match &self.inner {
            DestinationInner::SocketAddrs(addrs) => return Ok(addrs.clone()),
            DestinationInner::SocketAddr(addr) => return Ok(vec![*addr]),
            DestinationInner::HostPort(host, port) => {
                tokio::net::lookup_host((host.as_str(), *port)).await.map(Iterator::collect)
            }
            DestinationInner::Endpoint(endpoint) => {
                tokio::net::lookup_host(endpoint).await.map(Iterator::collect)
            }
        }
        .map_err(|_| Error::Connect("could not resolve destination".into()))?;

        Ok(addrs
            .into_iter()
            .filter(|addr| !ipv4_only || matches!(addr, SocketAddr::V4(_)))
            .collect())
    }
}

/// Connects to the native server port and configures common socket options.
#[instrument(level = "trace", name = "clickwire.connect_socket", skip_all)]
pub(crate) async fn connect_socket(
    destination: &[SocketAddr],
    connect_timeout: Duration,
) -> Result<TcpStream> {
    let addr = destination
        .first()
        .ok_or_else(|| Error::Connect("no connection information".into()))?;
    let domain = if addr.is_ipv4() { socket2::Domain::IPV4 } else { socket2::Domain::IPV6 };
    let socket = socket2::Socket::new(domain, socket2::Type::STREAM, Some(socket2::Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    // Increase buffer sizes for high-throughput data transfer
    socket.set_recv_buffer_size(TCP_READ_BUFFER_SIZE as usize)?;
    socket.set_send_buffer_size(TCP_WRITE_BUFFER_SIZE as usize)?;
    // Configure TCP keepalive
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(Duration::from_secs(TCP_KEEP_ALIVE_SECS))
        .with_interval(Duration::from_secs(TCP_KEEP_ALIVE_INTERVAL))
        .with_retries(TCP_KEEP_ALIVE_RETRIES);
    socket.set_tcp_keepalive(&keepalive)?;

    // Connect with a timeout
    let sock_addr = socket2::SockAddr::from(*addr);
    socket.connect_timeout(&sock_addr, connect_timeout)?;
    trace!("Connected socket for {addr}");

    // Convert to TcpStream
    let stream = std::net::TcpStream::from(socket);
    stream.set_nodelay(true)?;
    stream.set_nonblocking(true)?;

    Ok(TcpStream::from_std(stream)?)
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            DestinationInner::SocketAddrs(addrs) => {
                write!(f, "{}", addrs.first().map(ToString::to_string).unwrap_or_default())
            }
            DestinationInner::SocketAddr(addr) => write!(f, "{addr}"),
            DestinationInner::HostPort(host, port) => write!(f, "{host}:{port}"),
            DestinationInner::Endpoint(endpoint) => write!(f, "{endpoint}"),
        }
    }
}

// From implementations for common destination types
impl From<Vec<SocketAddr>> for Destination {
    fn from(addrs: Vec<SocketAddr>) -> Self {
        Destination { inner: DestinationInner::SocketAddrs(addrs) }
    }
}

impl From<SocketAddr> for Destination {
    fn from(addr: SocketAddr) -> Self { Destination { inner: DestinationInner::SocketAddr(addr) } }
}

impl From<(String, u16)> for Destination {
    fn from((host, port): (String, u16)) -> Self {
        Destination { inner: DestinationInner::HostPort(host, port) }
    }
}

impl From<&(String, u16)> for Destination {
    fn from((host, port): &(String, u16)) -> Self {
        Destination { inner: DestinationInner::HostPort(host.to_string(), *port) }
    }
}

impl From<(&String, u16)> for Destination {
    fn from((host, port): (&String, u16)) -> Self {
        Destination { inner: DestinationInner::HostPort(host.to_string(), port) }
    }
}

impl From<(&str, u16)> for Destination {
    fn from((host, port): (&str, u16)) -> Self {
        Destination { inner: DestinationInner::HostPort(host.to_string(), port) }
    }
}

impl From<String> for Destination {
    fn from(endpoint: String) -> Self {
        Destination { inner: DestinationInner::Endpoint(endpoint) }
    }
}

impl From<&String> for Destination {
    fn from(endpoint: &String) -> Self {
        Destination { inner: DestinationInner::Endpoint(endpoint.to_string()) }
    }
}

impl From<&str> for Destination {
    fn from(endpoint: &str) -> Self {
        Destination { inner: DestinationInner::Endpoint(endpoint.to_string()) }
    }
}

impl From<std::borrow::Cow<'_, str>> for Destination {
    fn from(endpoint: std::borrow::Cow<'_, str>) -> Self {
        Destination { inner: DestinationInner::Endpoint(endpoint.into_owned()) }
    }
}

impl From<(Ipv4Addr, u16)> for Destination {
    fn from((host, port): (Ipv4Addr, u16)) -> Self {
        Destination { inner: DestinationInner::SocketAddr((host, port).into()) }
    }
}

impl From<(Ipv6Addr, u16)> for Destination {
    fn from((host, port): (Ipv6Addr, u16)) -> Self {
        Destination { inner: DestinationInner::SocketAddr((host, port).into()) }
    }
}
