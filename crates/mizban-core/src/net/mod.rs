//! Listener acquisition and LAN address discovery.
//!
//! Startup never fails just because a port is taken: [`bind_with_retry`]
//! walks upward from the configured port, and jumps past the privileged
//! range when the OS denies a low port. Every socket gets best-effort
//! throughput tuning (large buffers, Nagle off) before binding.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use crate::error::{Error, Result};

/// Socket send/receive buffer size (4 MiB).
const SOCKET_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Acquire a TCP listener starting at `start_port`, retrying upward.
///
/// Address-in-use bumps to the next port; permission-denied (privileged
/// ports) jumps to 1024; any other error is fatal. Gives up past 65535.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error when `host` does not parse as an IP address, on the
/// first non-retryable bind failure, or when the port space is exhausted.
pub fn bind_with_retry(host: &str, start_port: u16) -> Result<(TcpListener, u16)> {
    let ip: IpAddr = host
        .parse()
        .map_err(|_| Error::Config(format!("invalid bind host: {host}")))?;

    let mut port = u32::from(start_port.max(1));
    loop {
        let addr = SocketAddr::new(ip, port as u16);
        match listen_with_socket_tuning(addr) {
            Ok(listener) => {
                tracing::debug!(%addr, "listener bound");
                return Ok((listener, port as u16));
            }
            Err(err) => {
                let permission = err.kind() == io::ErrorKind::PermissionDenied;
                let retryable = permission || err.kind() == io::ErrorKind::AddrInUse;
                if !retryable || port >= 65535 {
                    return Err(err.into());
                }
                port = if permission {
                    (port + 1).max(1024)
                } else {
                    port + 1
                };
            }
        }
    }
}

fn listen_with_socket_tuning(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    // Best-effort tuning: startup must not fail if an option is unsupported.
    let _ = socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE);
    let _ = socket.set_send_buffer_size(SOCKET_BUFFER_SIZE);
    let _ = socket.set_nodelay(true);
    #[cfg(unix)]
    let _ = socket.set_reuse_address(true);

    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

/// Best-effort discovery of this machine's LAN IPv4 address.
///
/// Connecting a UDP socket to a broadcast-ish address makes the OS pick the
/// outbound interface without sending a packet. Falls back to loopback when
/// no usable interface exists.
pub fn detect_lan_ipv4() -> IpAddr {
    if let Ok(socket) = UdpSocket::bind("0.0.0.0:0") {
        if socket.connect("10.255.255.255:1").is_ok() {
            if let Ok(local) = socket.local_addr() {
                if !local.ip().is_loopback() {
                    return local.ip();
                }
            }
        }
    }
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// The URL LAN clients should open.
pub fn server_url(port: u16) -> String {
    format!("http://{}:{}/", detect_lan_ipv4(), port)
}

/// The loopback-only admin page URL.
pub fn admin_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/settings")
}
