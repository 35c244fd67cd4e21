//! The server facade: owns the registry and every listener, and exposes the
//! pusher-registry surface an external HTTP/service collaborator drives.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::RelayConfig;
use crate::error::{Result, RtspError};
use crate::pusher::{PullPusher, PusherSnapshot, TransportPreference};
use crate::registry::Registry;
use crate::transport::tcp;
use crate::transport::udp::UdpListener;
use crate::wire::interleaved::Flow;

/// The pusher registry's own reader/writer lock, independent of the
/// session/publisher table's — add/remove are write ops, list/get reads.
#[derive(Default)]
struct PusherRegistry {
    pushers: RwLock<HashMap<String, Arc<PullPusher>>>,
}

impl PusherRegistry {
    fn get(&self, path: &str) -> Option<Arc<PullPusher>> {
        self.pushers.read().get(path).cloned()
    }

    fn list(&self) -> Vec<Arc<PullPusher>> {
        self.pushers.read().values().cloned().collect()
    }

    fn insert(&self, pusher: Arc<PullPusher>) {
        self.pushers
            .write()
            .insert(pusher.mount_path.clone(), pusher);
    }

    fn remove(&self, path: &str) -> Option<Arc<PullPusher>> {
        self.pushers.write().remove(path)
    }
}

/// Top-level orchestrator: binds the UDP RTP/RTCP listeners and the TCP
/// signaling listener, and tracks every running pull-client pusher.
///
/// Not `Clone` — one `RelayServer` owns the process's listeners. Callers
/// needing shared access to the registry from elsewhere (e.g. an HTTP
/// collaborator) should clone [`Registry`] directly, which is cheap.
pub struct RelayServer {
    config: Arc<RelayConfig>,
    registry: Registry,
    pushers: PusherRegistry,
    udp_rtp: Option<UdpListener>,
    udp_rtcp: Option<UdpListener>,
    tcp_listener: Option<TcpListener>,
    running: Arc<AtomicBool>,
    accept_thread: Option<thread::JoinHandle<()>>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        RelayServer {
            config: Arc::new(config),
            registry: Registry::new(),
            pushers: PusherRegistry::default(),
            udp_rtp: None,
            udp_rtcp: None,
            tcp_listener: None,
            running: Arc::new(AtomicBool::new(false)),
            accept_thread: None,
        }
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start every listener in order: UDP RTP, UDP RTCP, TCP. An external
    /// HTTP collaborator (started after this returns) hydrates pushers via
    /// [`Self::add_pusher`].
    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RtspError::AlreadyRunning);
        }
        self.config.validate()?;

        let udp_rtp = UdpListener::bind(self.config.rtp_port, self.config.write_timeout)?;
        let udp_rtcp = UdpListener::bind(self.config.rtcp_port, self.config.write_timeout)?;

        self.running.store(true, Ordering::SeqCst);

        udp_rtp.spawn_receiver(self.registry.clone(), udp_rtp.sender(), Flow::Rtp);
        udp_rtcp.spawn_receiver(self.registry.clone(), udp_rtp.sender(), Flow::Rtcp);

        let tcp_listener = TcpListener::bind(("0.0.0.0", self.config.rtsp_port))?;
        tcp_listener.set_nonblocking(true)?;

        let accept_listener = tcp_listener.try_clone()?;
        let registry = self.registry.clone();
        let config = self.config.clone();
        let udp_out = udp_rtp.sender();
        let running = self.running.clone();
        let accept_thread = thread::spawn(move || {
            tcp::accept_loop(accept_listener, registry, config, udp_out, running);
        });

        tracing::info!(
            rtsp_port = self.config.rtsp_port,
            rtp_port = self.config.rtp_port,
            rtcp_port = self.config.rtcp_port,
            "relay server started"
        );

        self.udp_rtp = Some(udp_rtp);
        self.udp_rtcp = Some(udp_rtcp);
        self.tcp_listener = Some(tcp_listener);
        self.accept_thread = Some(accept_thread);
        Ok(())
    }

    /// Stop every listener and pusher in reverse start order, and close
    /// every live session. Idempotent.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        for pusher in self.pushers.list() {
            pusher.stop();
        }

        if let Some(listener) = self.tcp_listener.take() {
            drop(listener);
        }
        if let Some(thread) = self.accept_thread.take() {
            let _ = thread.join();
        }
        if let Some(rtcp) = self.udp_rtcp.take() {
            rtcp.stop();
        }
        if let Some(rtp) = self.udp_rtp.take() {
            rtp.stop();
        }

        for session in self.registry.read().all_sessions() {
            session.force_close();
        }

        tracing::info!("relay server stopped");
    }

    /// Stop and restart with a freshly supplied configuration, preserving
    /// no in-flight sessions — a reload is a full listener bounce.
    pub fn reload_config(&mut self, config: RelayConfig) -> Result<()> {
        self.stop();
        self.config = Arc::new(config);
        self.start()
    }

    pub fn get_pushers(&self) -> Vec<PusherSnapshot> {
        self.pushers
            .list()
            .iter()
            .map(|p| p.snapshot(&self.registry))
            .collect()
    }

    pub fn get_pusher(&self, path: &str) -> Option<PusherSnapshot> {
        self.pushers.get(path).map(|p| p.snapshot(&self.registry))
    }

    /// Start pulling `source_url` and republish it locally at `mount_path`.
    /// Idempotent on path: replaces any existing pusher at the same path.
    pub fn add_pusher(
        &self,
        source_url: &str,
        mount_path: &str,
        transport: TransportPreference,
        heartbeat_interval: Duration,
        idle_timeout: Duration,
    ) -> Result<Arc<PullPusher>> {
        self.remove_pusher(mount_path);

        let pusher = PullPusher::new(
            source_url,
            mount_path,
            transport,
            heartbeat_interval,
            idle_timeout,
        );
        self.registry
            .register_publisher(mount_path, pusher.clone())?;
        self.pushers.insert(pusher.clone());

        let run_pusher = pusher.clone();
        let registry = self.registry.clone();
        let udp_out = self
            .udp_rtp
            .as_ref()
            .map(UdpListener::sender)
            .ok_or(RtspError::NotStarted)?;
        thread::spawn(move || {
            if let Err(e) = run_pusher.start(registry.clone(), udp_out) {
                tracing::warn!(pusher = %run_pusher.id, error = %e, "pull pusher failed");
                registry.unregister_publisher(&run_pusher.mount_path);
            }
        });

        Ok(pusher)
    }

    /// Stop and deregister the pusher at `mount_path`, if any. Idempotent.
    pub fn remove_pusher(&self, mount_path: &str) {
        if let Some(pusher) = self.pushers.remove(mount_path) {
            pusher.stop();
            self.registry.unregister_publisher(mount_path);
        }
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        self.stop();
    }
}
