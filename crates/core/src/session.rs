//! RTSP session state machine (RFC 2326 §3, §A.1).
//!
//! A [`Session`] is created on TCP accept and lives until its connection
//! closes. It is exclusively owned by its connection thread; the
//! [`crate::registry::Registry`] holds it only by reference (in the
//! session set, and — while it is a live publisher — in the publisher
//! table), never by value.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::SyncSender;

use parking_lot::{Mutex, RwLock};

use crate::error::{RtspError, Result};
use crate::publisher::Publisher;
use crate::wire::auth::Challenge;
use crate::wire::interleaved::Frame;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// RTSP session states (RFC 2326 §A.1). `Paused` round-trips back to
/// `PrePlay` rather than being its own terminal state, matching the
/// transition table: `PLAY --PAUSE--> PRE_PLAY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Announce,
    PrePlay,
    PreRecord,
    Play,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportChoice {
    Udp,
    TcpInterleaved,
}

/// One negotiated media track.
#[derive(Debug, Clone, Copy)]
pub struct Track {
    pub index: usize,
    /// Non-zero only when the session's transport is UDP: the *client's*
    /// receive ports, taken from `client_port=` in the SETUP request. The
    /// forwarder sends to these, not to the server's bound listener ports.
    pub client_rtp_port: u16,
    pub client_rtcp_port: u16,
}

/// Two independent challenge slots so publish-intent and read-intent auth
/// state never interfere.
#[derive(Default)]
struct AuthChallenges {
    publish: Mutex<Option<Challenge>>,
    read: Mutex<Option<Challenge>>,
}

pub enum Intent {
    Publish,
    Read,
}

/// A live RTSP session: the publisher or reader side of one TCP connection.
pub struct Session {
    pub id: String,
    pub peer_addr: SocketAddr,
    state: RwLock<SessionState>,
    path: RwLock<String>,
    transport: RwLock<Option<TransportChoice>>,
    tracks: RwLock<Vec<Track>>,
    /// Publisher's ANNOUNCE body, stored byte-exact. `None` on reader sessions.
    sdp: RwLock<Option<Vec<u8>>>,
    auth: AuthChallenges,
    /// Set once this session reaches PLAY over TCP-interleaved transport;
    /// the writer thread drains it onto the socket.
    outbound: Mutex<Option<SyncSender<Frame>>>,
    /// A clone of the connection's socket, kept only to force-close it from
    /// outside the connection thread (e.g. when its publisher disconnects
    /// and every reader at the same path must be cut loose).
    socket: Mutex<Option<std::net::TcpStream>>,
}

impl Session {
    pub fn new(peer_addr: SocketAddr) -> Arc<Self> {
        let n = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
        Arc::new(Session {
            id: format!("{n:016x}"),
            peer_addr,
            state: RwLock::new(SessionState::Starting),
            path: RwLock::new(String::new()),
            transport: RwLock::new(None),
            tracks: RwLock::new(Vec::new()),
            sdp: RwLock::new(None),
            auth: AuthChallenges::default(),
            outbound: Mutex::new(None),
            socket: Mutex::new(None),
        })
    }

    /// Record a clone of the connection's socket so the session can later
    /// be force-closed from another thread (registry cascade, listener
    /// shutdown).
    pub fn set_socket_handle(&self, socket: std::net::TcpStream) {
        *self.socket.lock() = Some(socket);
    }

    /// Shut down the underlying socket, unblocking the connection thread's
    /// read and letting it run its own cleanup path. Idempotent.
    pub fn force_close(&self) {
        if let Some(socket) = &*self.socket.lock() {
            let _ = socket.shutdown(std::net::Shutdown::Both);
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: SessionState) {
        tracing::debug!(session = %self.id, old = ?*self.state.read(), new = ?state, "state transition");
        *self.state.write() = state;
    }

    pub fn path(&self) -> String {
        self.path.read().clone()
    }

    pub fn set_path(&self, path: &str) {
        *self.path.write() = path.to_string();
    }

    pub fn transport(&self) -> Option<TransportChoice> {
        *self.transport.read()
    }

    /// Reserve a transport choice for this session. Returns an error if the
    /// session already chose a different transport — all tracks within a
    /// session share one transport choice.
    pub fn reserve_transport(&self, choice: TransportChoice) -> Result<()> {
        let mut current = self.transport.write();
        match *current {
            Some(existing) if existing != choice => Err(RtspError::UnsupportedTransport(
                "mixed transport within one session".to_string(),
            )),
            Some(_) => Ok(()),
            None => {
                *current = Some(choice);
                Ok(())
            }
        }
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.read().clone()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.read().len()
    }

    pub fn push_track(&self, track: Track) {
        self.tracks.write().push(track);
    }

    pub fn sdp(&self) -> Option<Vec<u8>> {
        self.sdp.read().clone()
    }

    pub fn set_sdp(&self, sdp: Vec<u8>) {
        *self.sdp.write() = Some(sdp);
    }

    pub fn media_count(&self) -> usize {
        match &*self.sdp.read() {
            Some(sdp) => crate::wire::sdp::count_media(sdp),
            None => 0,
        }
    }

    fn challenge_slot(&self, intent: Intent) -> &Mutex<Option<Challenge>> {
        match intent {
            Intent::Publish => &self.auth.publish,
            Intent::Read => &self.auth.read,
        }
    }

    pub fn current_challenge(&self, intent: Intent) -> Option<Challenge> {
        self.challenge_slot(intent).lock().clone()
    }

    pub fn issue_challenge(&self, intent: Intent, realm: &str) -> Challenge {
        let challenge = Challenge::new(realm);
        *self.challenge_slot(intent).lock() = Some(challenge.clone());
        challenge
    }

    pub fn set_outbound(&self, tx: SyncSender<Frame>) {
        *self.outbound.lock() = Some(tx);
    }

    /// Enqueue an interleaved frame for this session's TCP writer thread.
    /// A full or closed queue means a slow or gone reader; the caller logs
    /// and moves on rather than blocking the forwarder.
    pub fn try_send_frame(&self, frame: Frame) -> std::result::Result<(), ()> {
        match &*self.outbound.lock() {
            Some(tx) => tx.try_send(frame).map_err(|_| ()),
            None => Err(()),
        }
    }
}

impl Publisher for Session {
    fn path(&self) -> String {
        Session::path(self)
    }

    fn sdp(&self) -> Vec<u8> {
        Session::sdp(self).unwrap_or_default()
    }

    fn media_count(&self) -> usize {
        Session::media_count(self)
    }

    fn close(&self) {
        self.force_close();
    }
}
