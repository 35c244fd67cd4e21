//! The two UDP data-plane listeners: one for RTP, one for RTCP, bound to
//! consecutive even/odd ports. Each runs an independent sender (drains an
//! outbound queue) and receiver (attributes inbound datagrams to a
//! publisher by source address) loop.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::forwarder::{self, UdpOutbound};
use crate::registry::{Registry, RegistryInner};
use crate::session::{Session, SessionState, Track};
use crate::wire::interleaved::Flow;

const RECV_BUF_LEN: usize = 2048;
const SEND_QUEUE_DEPTH: usize = 1024;

/// One bound UDP socket plus its sender queue. Receiving is driven by
/// [`UdpListener::spawn_receiver`] so callers control which `Flow` (RTP or
/// RTCP) this listener represents for attribution purposes.
pub struct UdpListener {
    socket: Arc<UdpSocket>,
    sender_tx: UdpOutbound,
    running: Arc<AtomicBool>,
}

impl UdpListener {
    /// Bind to `port` and start its sender thread. `write_timeout` is
    /// re-applied before every send.
    pub fn bind(port: u16, write_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        let socket = Arc::new(socket);
        let running = Arc::new(AtomicBool::new(true));

        let (tx, rx): (UdpOutbound, Receiver<(SocketAddr, Vec<u8>)>) =
            sync_channel(SEND_QUEUE_DEPTH);

        let sender_socket = socket.clone();
        let sender_running = running.clone();
        thread::spawn(move || sender_loop(sender_socket, rx, sender_running, write_timeout));

        Ok(UdpListener {
            socket,
            sender_tx: tx,
            running,
        })
    }

    pub fn local_port(&self) -> Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    pub fn sender(&self) -> UdpOutbound {
        self.sender_tx.clone()
    }

    /// Start this listener's receive loop in a background thread.
    /// `flow` says whether datagrams on this socket are RTP or RTCP, which
    /// selects which of a publisher's track ports must match the source.
    pub fn spawn_receiver(&self, registry: Registry, udp_out: UdpOutbound, flow: Flow) {
        let socket = self.socket.clone();
        let running = self.running.clone();
        thread::spawn(move || receiver_loop(socket, registry, udp_out, flow, running));
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn sender_loop(
    socket: Arc<UdpSocket>,
    rx: Receiver<(SocketAddr, Vec<u8>)>,
    running: Arc<AtomicBool>,
    write_timeout: Duration,
) {
    while running.load(Ordering::SeqCst) {
        let Ok((dest, payload)) = rx.recv_timeout(Duration::from_millis(200)) else {
            continue;
        };
        if socket.set_write_timeout(Some(write_timeout)).is_err() {
            continue;
        }
        if let Err(e) = socket.send_to(&payload, dest) {
            tracing::debug!(error = %e, %dest, "UDP send failed (non-fatal)");
        }
    }
}

fn receiver_loop(
    socket: Arc<UdpSocket>,
    registry: Registry,
    udp_out: UdpOutbound,
    flow: Flow,
    running: Arc<AtomicBool>,
) {
    socket
        .set_read_timeout(Some(Duration::from_millis(200)))
        .ok();

    while running.load(Ordering::SeqCst) {
        // A fresh buffer per datagram: it's handed into the forwarder and
        // must not be aliased with the next read.
        let mut buf = vec![0u8; RECV_BUF_LEN];
        match socket.recv_from(&mut buf) {
            Ok((n, src)) => {
                let guard = registry.read();
                if let Some((session, track_index)) = find_publisher_track(&guard, flow, src) {
                    let path = session.path();
                    forwarder::forward(&guard, &udp_out, &path, track_index, flow, &buf[..n]);
                } else {
                    tracing::trace!(%src, "UDP datagram from unregistered source, dropped");
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                tracing::warn!(error = %e, "UDP receive error");
            }
        }
    }
}

/// Scan every live RECORD-state session for a track whose UDP client port
/// (for this listener's flow) matches `src`'s port, and whose session's
/// peer IP matches `src`'s IP. O(sessions × tracks).
fn find_publisher_track(
    inner: &RegistryInner,
    flow: Flow,
    src: SocketAddr,
) -> Option<(Arc<Session>, usize)> {
    for session in inner.all_sessions() {
        if session.state() != SessionState::Record {
            continue;
        }
        if session.peer_addr.ip() != src.ip() {
            continue;
        }
        if let Some(track) = matching_track(&session.tracks(), flow, src.port()) {
            return Some((session, track.index));
        }
    }
    None
}

fn matching_track(tracks: &[Track], flow: Flow, port: u16) -> Option<Track> {
    tracks
        .iter()
        .find(|t| {
            let candidate = match flow {
                Flow::Rtp => t.client_rtp_port,
                Flow::Rtcp => t.client_rtcp_port,
            };
            candidate == port
        })
        .copied()
}

/// Validate the configured RTP/RTCP port pair at startup: `rtp_port` must
/// be even and `rtcp_port` must equal `rtp_port + 1`.
pub fn check_port_parity(rtp_port: u16, rtcp_port: u16) -> Result<()> {
    if rtp_port % 2 != 0 {
        return Err(crate::error::RtspError::ConfigError(
            "rtp port must be even".to_string(),
        ));
    }
    if rtcp_port != rtp_port + 1 {
        return Err(crate::error::RtspError::ConfigError(
            "rtcp port must be rtp port + 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_odd_rtp_port() {
        assert!(check_port_parity(8001, 8002).is_err());
    }

    #[test]
    fn rejects_non_consecutive_rtcp_port() {
        assert!(check_port_parity(8000, 8003).is_err());
    }

    #[test]
    fn accepts_valid_pair() {
        assert!(check_port_parity(8000, 8001).is_ok());
    }
}
