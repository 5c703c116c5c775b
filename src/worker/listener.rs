//! Shared listening socket.
//!
//! Every worker binds the same address with `SO_REUSEPORT`, so the kernel
//! spreads incoming connections across the fleet.

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};

/// Pending-connection queue length.
const BACKLOG: u32 = 1024;

/// Binds `addr` so that several processes can listen on it at once.
pub fn bind_shared(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuseport(true)?;
    socket.bind(addr)?;
    socket.listen(BACKLOG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = bind_shared("127.0.0.1:0".parse().expect("addr")).expect("bind");
        assert_ne!(listener.local_addr().expect("local addr").port(), 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn two_listeners_share_a_port() {
        let first = bind_shared("127.0.0.1:0".parse().expect("addr")).expect("first bind");
        let addr = first.local_addr().expect("local addr");
        let second = bind_shared(addr).expect("second bind on the same port");
        assert_eq!(second.local_addr().expect("local addr"), addr);
    }

    #[tokio::test]
    async fn port_held_without_reuse_is_a_bind_error() {
        let exclusive = std::net::TcpListener::bind("127.0.0.1:0").expect("exclusive bind");
        let addr = exclusive.local_addr().expect("local addr");
        assert!(bind_shared(addr).is_err());
    }
}
