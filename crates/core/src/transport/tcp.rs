//! The RTSP signaling TCP listener: accepts connections, owns each
//! connection's request/response loop, and — once a session reaches
//! PLAY or RECORD over interleaved transport — switches that connection
//! into a binary frame pump.

use std::io::{BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{RecvTimeoutError, sync_channel};
use std::thread;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::forwarder::{self, UdpOutbound};
use crate::handler::{Effect, SessionHandler, channel_for_record};
use crate::registry::Registry;
use crate::session::{Session, SessionState};
use crate::wire::interleaved::FRAME_MARKER;
use crate::wire::request::RtspRequest;
use crate::wire::response::RtspResponse;

const READER_QUEUE_DEPTH: usize = 256;

/// Non-blocking accept loop. Checks `running` between accepts with a 50ms
/// poll interval so the listener can be shut down promptly.
pub fn accept_loop(
    listener: TcpListener,
    registry: Registry,
    config: Arc<RelayConfig>,
    udp_out: UdpOutbound,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                let registry = registry.clone();
                let config = config.clone();
                let udp_out = udp_out.clone();
                let running = running.clone();
                thread::spawn(move || {
                    Connection::handle(stream, peer_addr, registry, config, udp_out, running);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

struct Connection;

impl Connection {
    fn handle(
        stream: TcpStream,
        peer_addr: SocketAddr,
        registry: Registry,
        config: Arc<RelayConfig>,
        udp_out: UdpOutbound,
        running: Arc<AtomicBool>,
    ) {
        stream.set_nonblocking(false).ok();
        let Ok(mut writer) = stream.try_clone() else {
            return;
        };
        let Ok(socket_handle) = stream.try_clone() else {
            return;
        };

        let session = Session::new(peer_addr);
        session.set_socket_handle(socket_handle);
        registry.insert_session(session.clone());

        run_script(&config.pre_script, "pre", &session.id);
        tracing::info!(%peer_addr, session = %session.id, "client connected");

        apply_timeouts(&writer, &config);

        let handler = SessionHandler::new(registry.clone(), config.clone());
        let mut reader = BufReader::new(stream);

        let reason = Self::request_loop(
            &mut reader,
            &mut writer,
            &session,
            &handler,
            &registry,
            &udp_out,
            &config,
            &running,
        );

        Self::cleanup(&registry, &session);
        run_script(&config.post_script, "post", &session.id);
        tracing::info!(%peer_addr, session = %session.id, reason, "client disconnected");
    }

    #[allow(clippy::too_many_arguments)]
    fn request_loop(
        reader: &mut BufReader<TcpStream>,
        writer: &mut TcpStream,
        session: &Arc<Session>,
        handler: &SessionHandler,
        registry: &Registry,
        udp_out: &UdpOutbound,
        config: &Arc<RelayConfig>,
        running: &Arc<AtomicBool>,
    ) -> &'static str {
        loop {
            if !running.load(Ordering::SeqCst) {
                return "server shutting down";
            }

            let text = match read_textual_request(reader) {
                Ok(Some(t)) => t,
                Ok(None) => return "connection closed by client",
                Err(_) => return "read error",
            };
            if text.trim().is_empty() {
                continue;
            }

            let content_length = peek_content_length(&text);
            let mut body = vec![0u8; content_length];
            if content_length > 0 && reader.read_exact(&mut body).is_err() {
                return "read error";
            }

            let request = match RtspRequest::parse(&text, body) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(peer = %session.peer_addr, error = %e, "parse error");
                    let resp = RtspResponse::bad_request(&config.server_agent);
                    if writer.write_all(&resp.serialize()).is_err() {
                        return "write error";
                    }
                    continue;
                }
            };

            tracing::debug!(session = %session.id, method = %request.method, uri = %request.uri, "request");
            let outcome = handler.handle(session, &request);

            if let Some(response) = &outcome.response {
                if writer.write_all(&response.serialize()).is_err() {
                    return "write error";
                }
            }

            match outcome.effect {
                Effect::CloseSilently => return "teardown",
                Effect::StartReaderFanout => {
                    return Self::reader_fanout(reader, writer, session, running);
                }
                Effect::StartPublisherFanout => {
                    return Self::publisher_fanout(
                        reader, writer, session, handler, registry, udp_out, config, running,
                    );
                }
                Effect::None => continue,
            }
        }
    }

    /// After PLAY over interleaved transport: drain the session's outbound
    /// frame queue onto the socket from a dedicated writer thread, while
    /// this thread blocks reading and discards whatever the reader sends
    /// back (RTCP feedback is ignored).
    fn reader_fanout(
        reader: &mut BufReader<TcpStream>,
        writer: &mut TcpStream,
        session: &Arc<Session>,
        running: &Arc<AtomicBool>,
    ) -> &'static str {
        let (tx, rx) = sync_channel(READER_QUEUE_DEPTH);
        session.set_outbound(tx);

        let Ok(mut writer_clone) = writer.try_clone() else {
            return "write error";
        };
        let writer_running = running.clone();
        thread::spawn(move || {
            while writer_running.load(Ordering::SeqCst) {
                match rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(frame) => {
                        if writer_clone.write_all(&frame.encode()).is_err() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        let mut discard = [0u8; 2048];
        loop {
            match reader.read(&mut discard) {
                Ok(0) => return "connection closed by client",
                Ok(_) => continue,
                Err(_) => return "read error",
            }
        }
    }

    /// After RECORD over interleaved transport: read `$ channel len
    /// payload` frames and forward each. A byte other than `$` at a frame
    /// boundary means the client resumed a textual request on the same
    /// connection; handle exactly that one request, then resume.
    #[allow(clippy::too_many_arguments)]
    fn publisher_fanout(
        reader: &mut BufReader<TcpStream>,
        writer: &mut TcpStream,
        session: &Arc<Session>,
        handler: &SessionHandler,
        registry: &Registry,
        udp_out: &UdpOutbound,
        config: &Arc<RelayConfig>,
        running: &Arc<AtomicBool>,
    ) -> &'static str {
        loop {
            if !running.load(Ordering::SeqCst) {
                return "server shutting down";
            }

            let mut marker = [0u8; 1];
            if reader.read_exact(&mut marker).is_err() {
                return "connection closed by client";
            }

            if marker[0] != FRAME_MARKER {
                match resume_textual_request(reader, marker[0], writer, session, handler, config) {
                    Ok(Some(reason)) => return reason,
                    Ok(None) => continue,
                    Err(_) => return "read error",
                }
            }

            let mut header = [0u8; 3];
            if reader.read_exact(&mut header).is_err() {
                return "read error";
            }
            let channel = header[0];
            let length = u16::from_be_bytes([header[1], header[2]]) as usize;
            let mut payload = vec![0u8; length];
            if length > 0 && reader.read_exact(&mut payload).is_err() {
                return "read error";
            }

            let Some((track, flow)) = channel_for_record(session, channel) else {
                tracing::warn!(session = %session.id, channel, "interleaved frame on unknown track, dropping");
                continue;
            };

            let path = session.path();
            let guard = registry.read();
            forwarder::forward(&guard, udp_out, &path, track, flow, &payload);
        }
    }

    fn cleanup(registry: &Registry, session: &Arc<Session>) {
        registry.remove_session(&session.id);
        if matches!(
            session.state(),
            SessionState::Announce | SessionState::PreRecord | SessionState::Record
        ) {
            registry.unregister_publisher(&session.path());
        }
    }
}

fn resume_textual_request(
    reader: &mut BufReader<TcpStream>,
    first_byte: u8,
    writer: &mut TcpStream,
    session: &Arc<Session>,
    handler: &SessionHandler,
    config: &Arc<RelayConfig>,
) -> std::io::Result<Option<&'static str>> {
    use std::io::BufRead;

    let mut text = String::new();
    text.push(first_byte as char);
    let mut rest = String::new();
    reader.read_line(&mut rest)?;
    text.push_str(&rest);

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(Some("connection closed by client"));
        }
        text.push_str(&line);
        if line == "\r\n" || line == "\n" {
            break;
        }
    }

    let content_length = peek_content_length(&text);
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body)?;
    }

    let request = match RtspRequest::parse(&text, body) {
        Ok(r) => r,
        Err(_) => {
            writer.write_all(&RtspResponse::bad_request(&config.server_agent).serialize())?;
            return Ok(None);
        }
    };

    let outcome = handler.handle(session, &request);
    if let Some(response) = &outcome.response {
        writer.write_all(&response.serialize())?;
    }

    match outcome.effect {
        Effect::CloseSilently => Ok(Some("teardown")),
        _ => Ok(None),
    }
}

fn read_textual_request(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<String>> {
    use std::io::BufRead;

    let mut text = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        text.push_str(&line);
        if line == "\r\n" || line == "\n" {
            break;
        }
    }
    Ok(Some(text))
}

fn peek_content_length(text: &str) -> usize {
    text.lines()
        .find(|l| l.to_ascii_lowercase().starts_with("content-length:"))
        .and_then(|l| l.split_once(':'))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0)
}

fn apply_timeouts(stream: &TcpStream, config: &RelayConfig) {
    let _ = stream.set_read_timeout(Some(config.read_timeout));
    let _ = stream.set_write_timeout(Some(config.write_timeout));
}

fn run_script(script: &Option<PathBuf>, label: &str, session_id: &str) {
    let Some(path) = script else {
        return;
    };
    if let Err(e) = Command::new(path).spawn() {
        tracing::warn!(session = session_id, label, error = %e, "hook script failed to start");
    }
}
