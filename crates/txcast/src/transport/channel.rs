//! Datagram channel adapter.
//!
//! The direct channel is a multicast group on the loopback interface: every
//! peer of an origin binds the same origin-derived port, joins the group, and
//! hears every other peer's sends. Multicast loops a datagram back to the
//! sender's own socket as well, so frames carry a random per-process sender
//! token and the receive path drops frames carrying its own token.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use txcast_proto::{ChangedParts, ChannelFrame};

use crate::config::PropagatorConfig;
use crate::error::Error;

use super::{ListenerHandle, ReceiveHandler, Transport, TransportKind};

/// How often the listener wakes to check its stop flag.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Receive buffer size; also the practical ceiling on an encoded frame.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Adapter for the loopback multicast channel.
pub struct ChannelTransport {
    socket: UdpSocket,
    target: SocketAddr,
    src: u64,
}

impl ChannelTransport {
    /// Whether the channel facility is available in this environment.
    ///
    /// Opens and immediately drops a socket; environments without a
    /// multicast-capable loopback interface fail here and select the
    /// fallback chain instead.
    pub fn probe(config: &PropagatorConfig) -> bool {
        open_socket(config.channel_group(), config.resolved_channel_port()).is_ok()
    }

    /// Join the origin's channel.
    pub fn open(config: &PropagatorConfig) -> Result<Self, Error> {
        let group = config.channel_group();
        let port = config.resolved_channel_port();
        let socket = open_socket(group, port)
            .map_err(|e| Error::Channel(format!("failed to join {group}:{port}: {e}")))?;

        tracing::debug!(%group, port, "datagram channel joined");

        Ok(Self {
            socket,
            target: SocketAddr::V4(SocketAddrV4::new(group, port)),
            src: rand::random(),
        })
    }

    /// This process's sender token.
    pub fn src(&self) -> u64 {
        self.src
    }
}

impl Transport for ChannelTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Channel
    }

    fn send(&self, parts: &ChangedParts) -> Result<(), Error> {
        let frame = ChannelFrame::new(self.src, parts.clone());
        let bytes = frame.encode()?;
        self.socket
            .send_to(&bytes, self.target)
            .map_err(|e| Error::Channel(format!("send failed: {e}")))?;
        Ok(())
    }

    fn listen(&self, handler: ReceiveHandler) -> Result<ListenerHandle, Error> {
        let socket = self
            .socket
            .try_clone()
            .map_err(|e| Error::Channel(format!("failed to clone socket: {e}")))?;
        let own_src = self.src;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let thread = thread::Builder::new()
            .name("txcast-channel".to_string())
            .spawn(move || {
                let mut buf = [0u8; MAX_DATAGRAM_SIZE];
                loop {
                    if stop_flag.load(Ordering::SeqCst) {
                        return;
                    }

                    match socket.recv_from(&mut buf) {
                        Ok((len, _peer)) => match ChannelFrame::decode(&buf[..len]) {
                            Ok(frame) if accept_frame(&frame, own_src) => {
                                handler(frame.changed_parts);
                            }
                            Ok(_) => {} // our own frame, looped back
                            Err(err) => {
                                tracing::trace!(error = %err, "ignoring unrecognized datagram");
                            }
                        },
                        Err(err)
                            if err.kind() == io::ErrorKind::WouldBlock
                                || err.kind() == io::ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(err) => {
                            tracing::trace!(error = %err, "channel receive error");
                        }
                    }
                }
            })
            .map_err(|e| Error::Channel(format!("failed to spawn listener: {e}")))?;

        Ok(ListenerHandle::worker(stop, thread))
    }
}

/// Whether a decoded frame should be delivered locally.
fn accept_frame(frame: &ChannelFrame, own_src: u64) -> bool {
    frame.src != own_src
}

fn open_socket(group: Ipv4Addr, port: u16) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).into())?;

    // Peers share a machine, not a network; pin the group to loopback so
    // frames never leave the host.
    socket.join_multicast_v4(&group, &Ipv4Addr::LOCALHOST)?;
    socket.set_multicast_if_v4(&Ipv4Addr::LOCALHOST)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_read_timeout(Some(RECV_POLL_INTERVAL))?;

    Ok(socket.into())
}
