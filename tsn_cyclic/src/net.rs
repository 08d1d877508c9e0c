//! UDP stand-in transport for the demo binaries.
//!
//! Carries UADP frames as UDP payloads so the data plane runs on any
//! host. The destination MAC and launch-time hints are ignored (the
//! socket sends immediately); the receive window maps to a socket read
//! timeout. A raw AF_PACKET transport with SO_TXTIME stays a deployment
//! concern behind the same trait.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::debug;

use tsn_common::axis::MacAddr;
use tsn_common::time::TaiTime;
use tsn_pubsub::pool::PacketBuffer;

use crate::executor::{Transport, TransportError};

pub struct UdpTransport {
    socket: UdpSocket,
    dest: SocketAddr,
    timeout_ns: u64,
}

impl UdpTransport {
    /// Bind the local endpoint and fix the remote one.
    ///
    /// # Errors
    ///
    /// `TransportError::Addr` on unparseable addresses, `Io` on bind
    /// failure.
    pub fn bind(listen: &str, dest: &str) -> Result<Self, TransportError> {
        let dest: SocketAddr = dest
            .parse()
            .map_err(|_| TransportError::Addr(dest.to_string()))?;
        let listen: SocketAddr = listen
            .parse()
            .map_err(|_| TransportError::Addr(listen.to_string()))?;
        let socket = UdpSocket::bind(listen)?;
        debug!(%listen, %dest, "udp transport bound");
        Ok(Self {
            socket,
            dest,
            timeout_ns: 0,
        })
    }
}

impl Transport for UdpTransport {
    fn send(
        &mut self,
        frame: &[u8],
        _dest: MacAddr,
        _tx_time: TaiTime,
    ) -> Result<(), TransportError> {
        self.socket.send_to(frame, self.dest)?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut PacketBuffer, timeout_ns: u64) -> Result<usize, TransportError> {
        if timeout_ns != self.timeout_ns {
            // A zero Duration would disable the timeout; floor at 1 ns.
            self.socket
                .set_read_timeout(Some(Duration::from_nanos(timeout_ns.max(1))))?;
            self.timeout_ns = timeout_ns;
        }
        match self.socket.recv(buf.storage_mut()) {
            Ok(len) => {
                buf.set_len(len);
                Ok(len)
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(TransportError::Timeout)
            }
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}
