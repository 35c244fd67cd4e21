//! The cross-session forwarding routine.
//!
//! `forward` copies one frame from a publisher to every reader at the same
//! mount path, rendered per reader's own transport. It never blocks
//! indefinitely on a reader's outbound queue — a full or gone queue just
//! drops that one frame for that one reader and logs, so one slow client
//! cannot stall delivery to the rest.
//!
//! The caller must already hold the registry's read lock — this function
//! borrows a [`RegistryInner`] rather than a [`crate::registry::Registry`]
//! to make that impossible to get wrong.

use std::net::SocketAddr;
use std::sync::mpsc::SyncSender;

use crate::registry::RegistryInner;
use crate::session::TransportChoice;
use crate::wire::interleaved::{Flow, Frame, track_to_channel};

/// `(destination, bytes)` sent down the RTP UDP listener's outbound queue.
/// RTCP forwarding reuses this same queue — see the design note on this in
/// `DESIGN.md`; it is not a separate bug fixed here.
pub type UdpOutbound = SyncSender<(SocketAddr, Vec<u8>)>;

pub fn forward(
    inner: &RegistryInner,
    udp_out: &UdpOutbound,
    path: &str,
    track_index: usize,
    flow: Flow,
    payload: &[u8],
) {
    for reader in inner.readers_at(path) {
        match reader.transport() {
            Some(TransportChoice::Udp) => {
                let Some(track) = reader.tracks().into_iter().find(|t| t.index == track_index)
                else {
                    continue;
                };
                let port = match flow {
                    Flow::Rtp => track.client_rtp_port,
                    Flow::Rtcp => track.client_rtcp_port,
                };
                if port == 0 {
                    continue;
                }
                let addr = SocketAddr::new(reader.peer_addr.ip(), port);
                if udp_out.try_send((addr, payload.to_vec())).is_err() {
                    tracing::warn!(session = %reader.id, %path, "dropped UDP frame for slow reader");
                }
            }
            Some(TransportChoice::TcpInterleaved) => {
                let channel = track_to_channel(track_index, flow);
                let frame = Frame::new(channel, payload.to_vec());
                if reader.try_send_frame(frame).is_err() {
                    tracing::warn!(session = %reader.id, %path, "dropped interleaved frame for slow reader");
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::session::{Session, SessionState, Track};
    use std::net::SocketAddr;
    use std::sync::mpsc::sync_channel;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn forwards_to_tcp_reader_on_correct_channel() {
        let registry = Registry::new();
        let reader = Session::new(addr(9000));
        reader.set_path("/cam1");
        reader.reserve_transport(TransportChoice::TcpInterleaved).unwrap();
        reader.push_track(Track {
            index: 0,
            client_rtp_port: 0,
            client_rtcp_port: 0,
        });
        reader.set_state(SessionState::Play);
        let (tx, rx) = sync_channel(8);
        reader.set_outbound(tx);
        registry.insert_session(reader.clone());

        let (udp_tx, _udp_rx) = sync_channel(8);
        {
            let guard = registry.read();
            forward(&guard, &udp_tx, "/cam1", 0, Flow::Rtp, b"AAAA");
        }

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.channel, 0);
        assert_eq!(frame.payload, b"AAAA");
    }

    #[test]
    fn forwards_to_udp_reader_on_its_client_port() {
        let registry = Registry::new();
        let reader = Session::new(addr(9100));
        reader.set_path("/cam1");
        reader.reserve_transport(TransportChoice::Udp).unwrap();
        reader.push_track(Track {
            index: 0,
            client_rtp_port: 9100,
            client_rtcp_port: 9101,
        });
        reader.set_state(SessionState::Play);
        registry.insert_session(reader);

        let (udp_tx, udp_rx) = sync_channel(8);
        {
            let guard = registry.read();
            forward(&guard, &udp_tx, "/cam1", 0, Flow::Rtp, b"XXXX");
        }

        let (dest, payload) = udp_rx.try_recv().unwrap();
        assert_eq!(dest.port(), 9100);
        assert_eq!(payload, b"XXXX");
    }

    #[test]
    fn skips_readers_on_other_paths() {
        let registry = Registry::new();
        let reader = Session::new(addr(9000));
        reader.set_path("/other");
        reader.reserve_transport(TransportChoice::TcpInterleaved).unwrap();
        reader.push_track(Track {
            index: 0,
            client_rtp_port: 0,
            client_rtcp_port: 0,
        });
        reader.set_state(SessionState::Play);
        let (tx, rx) = sync_channel(8);
        reader.set_outbound(tx);
        registry.insert_session(reader);

        let (udp_tx, _udp_rx) = sync_channel(8);
        {
            let guard = registry.read();
            forward(&guard, &udp_tx, "/cam1", 0, Flow::Rtp, b"AAAA");
        }
        assert!(rx.try_recv().is_err());
    }
}
