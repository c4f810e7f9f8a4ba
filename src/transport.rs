// collectd-emitter - collectd network protocol client
// Copyright (c) 2025 The collectd-emitter contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Transport abstraction
//!
//! The client hands every finished packet to a [`Transport`] once per
//! destination. Sends are fire-and-forget: a failure is reported back to the
//! caller, which logs it and moves on.

use crate::config::Destination;
use crate::error::TransportError;
use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// Something that can deliver a datagram to a destination
pub trait Transport {
    /// Send one packet
    fn send(&mut self, packet: &[u8], destination: &Destination) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, packet: &[u8], destination: &Destination) -> Result<(), TransportError> {
        (**self).send(packet, destination)
    }
}

/// UDP transport with one lazily bound socket per address family
///
/// Each destination is resolved on its first successful send and the
/// address is reused afterwards. Failed resolutions are not cached.
#[derive(Debug, Default)]
pub struct UdpTransport {
    v4: Option<UdpSocket>,
    v6: Option<UdpSocket>,
    resolved: HashMap<Destination, SocketAddr>,
}

impl UdpTransport {
    /// Create a transport; sockets are bound on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Address cached for `destination`, if it has been resolved
    pub fn cached_address(&self, destination: &Destination) -> Option<SocketAddr> {
        self.resolved.get(destination).copied()
    }

    fn resolve(&mut self, destination: &Destination) -> Result<SocketAddr, TransportError> {
        if let Some(addr) = self.resolved.get(destination) {
            return Ok(*addr);
        }
        let addr = (destination.host.as_str(), destination.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Io {
                destination: destination.to_string(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| TransportError::Unresolved(destination.to_string()))?;
        self.resolved.insert(destination.clone(), addr);
        Ok(addr)
    }

    fn socket_for(&mut self, addr: &SocketAddr) -> std::io::Result<&UdpSocket> {
        let (slot, bind) = match addr {
            SocketAddr::V4(_) => (&mut self.v4, "0.0.0.0:0"),
            SocketAddr::V6(_) => (&mut self.v6, "[::]:0"),
        };
        if slot.is_none() {
            *slot = Some(UdpSocket::bind(bind)?);
        }
        slot.as_ref()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "socket unavailable"))
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, packet: &[u8], destination: &Destination) -> Result<(), TransportError> {
        let io_error = |e: std::io::Error| TransportError::Io {
            destination: destination.to_string(),
            reason: e.to_string(),
        };

        let addr = self.resolve(destination)?;
        let socket = self.socket_for(&addr).map_err(io_error)?;
        socket.send_to(packet, addr).map_err(io_error)?;
        Ok(())
    }
}

/// A packet recorded by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    /// Where it was sent
    pub destination: Destination,
    /// Datagram bytes
    pub bytes: Vec<u8>,
}

/// In-memory transport for testing and local inspection
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Vec<SentPacket>,
    failing: bool,
    attempts: u64,
}

impl MemoryTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail (or succeed again)
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Packets delivered so far
    pub fn sent(&self) -> &[SentPacket] {
        &self.sent
    }

    /// Remove and return delivered packets
    pub fn take_sent(&mut self) -> Vec<SentPacket> {
        std::mem::take(&mut self.sent)
    }

    /// Number of send calls, failed ones included
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, packet: &[u8], destination: &Destination) -> Result<(), TransportError> {
        self.attempts += 1;
        if self.failing {
            return Err(TransportError::Io {
                destination: destination.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        self.sent.push(SentPacket {
            destination: destination.clone(),
            bytes: packet.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_transport() {
        let mut transport = MemoryTransport::new();
        let dest = Destination::new("127.0.0.1", 25826);
        transport.send(&[1, 2, 3], &dest).unwrap();

        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.sent()[0].bytes, vec![1, 2, 3]);
        assert_eq!(transport.sent()[0].destination, dest);
    }

    #[test]
    fn test_memory_transport_failing() {
        let mut transport = MemoryTransport::new();
        transport.set_failing(true);
        let dest = Destination::new("127.0.0.1", 25826);
        assert!(matches!(
            transport.send(&[1], &dest),
            Err(TransportError::Io { .. })
        ));
        assert!(transport.sent().is_empty());
        assert_eq!(transport.attempts(), 1);

        transport.set_failing(false);
        transport.send(&[1], &dest).unwrap();
        assert_eq!(transport.take_sent().len(), 1);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_udp_transport_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();

        let mut transport = UdpTransport::new();
        transport
            .send(b"hello", &Destination::new("127.0.0.1", port))
            .unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_udp_transport_uses_cached_address() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();

        let mut transport = UdpTransport::new();
        // Never resolvable; only the cached address can deliver
        let dest = Destination::new("collector.invalid", port);
        assert!(transport.cached_address(&dest).is_none());

        let addr = receiver.local_addr().unwrap();
        transport.resolved.insert(dest.clone(), addr);
        transport.send(b"one", &dest).unwrap();
        transport.send(b"two", &dest).unwrap();
        assert_eq!(transport.cached_address(&dest), Some(addr));

        let mut buf = [0u8; 16];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"one");
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"two");
    }

    #[test]
    fn test_udp_transport_caches_first_resolution() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut transport = UdpTransport::new();
        let dest = Destination::new("127.0.0.1", port);
        transport.send(b"x", &dest).unwrap();
        assert_eq!(
            transport.cached_address(&dest),
            Some(receiver.local_addr().unwrap())
        );
    }

    #[test]
    fn test_boxed_transport() {
        let mut transport: Box<MemoryTransport> = Box::new(MemoryTransport::new());
        transport
            .send(&[9], &Destination::new("127.0.0.1", 1))
            .unwrap();
        assert_eq!(transport.sent().len(), 1);
    }
}
