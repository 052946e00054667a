//! One-way transport of submissions from the front-end to the collector.
//!
//! The front-end only sees the [`SubmissionSink`] trait. [`UdpRelay`] is the
//! production sink: one datagram per submission, no acknowledgement, no
//! retry.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::{Error, Result};

/// Destination for raw form submissions.
#[async_trait::async_trait]
pub trait SubmissionSink: Send + Sync + std::fmt::Debug {
    /// Hand one submission to the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission could not be sent. Nothing is
    /// retried; the caller decides whether to log and move on.
    async fn send(&self, payload: &[u8]) -> Result<()>;
}

/// Fire-and-forget UDP relay to a fixed destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpRelay {
    target: SocketAddr,
}

impl UdpRelay {
    /// Create a relay that sends to `target`.
    #[must_use]
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    /// Get the destination address.
    #[must_use]
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Unspecified local address of the same family as the target.
    fn local_bind_addr(&self) -> SocketAddr {
        let ip = match self.target.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        SocketAddr::new(ip, 0)
    }
}

#[async_trait::async_trait]
impl SubmissionSink for UdpRelay {
    async fn send(&self, payload: &[u8]) -> Result<()> {
        let send_err = |source| Error::RelaySend {
            addr: self.target,
            source,
        };

        // The socket lives for this one datagram and is closed on drop.
        let socket = UdpSocket::bind(self.local_bind_addr())
            .await
            .map_err(send_err)?;
        let sent = socket
            .send_to(payload, self.target)
            .await
            .map_err(send_err)?;

        debug!("Relayed {} bytes to {}", sent, self.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay = UdpRelay::new(receiver.local_addr().unwrap());

        relay.send(b"name=Alice&msg=Hi").await.unwrap();

        let mut buf = [0u8; 1024];
        let (len, _from) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"name=Alice&msg=Hi");
    }

    #[tokio::test]
    async fn test_send_without_listener_does_not_fail() {
        // Reserve a port, then close it so nothing is listening.
        let target = {
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            socket.local_addr().unwrap()
        };
        let relay = UdpRelay::new(target);

        assert!(relay.send(b"a=1").await.is_ok());
    }

    #[test]
    fn test_local_bind_addr_matches_family() {
        let v4 = UdpRelay::new("127.0.0.1:5000".parse().unwrap());
        assert!(v4.local_bind_addr().is_ipv4());

        let v6 = UdpRelay::new("[::1]:5000".parse().unwrap());
        assert!(v6.local_bind_addr().is_ipv6());
    }

    #[test]
    fn test_target() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(UdpRelay::new(addr).target(), addr);
    }
}
