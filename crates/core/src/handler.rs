//! RTSP method dispatch: turns one parsed request plus a session's current
//! state into a response and, for `PLAY`/`RECORD`, a signal telling the
//! connection loop which fan-in mode to switch into.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::publisher::Publisher;
use crate::registry::Registry;
use crate::session::{Intent, Session, SessionState, Track, TransportChoice};
use crate::wire::auth::{self, Challenge};
use crate::wire::interleaved::{Flow, channel_to_track};
use crate::wire::request::RtspRequest;
use crate::wire::response::RtspResponse;
use crate::wire::transport_header::{TransportHeader, TransportKind};
use crate::wire::uri::mount_path;

const PUBLIC_METHODS: &str = "OPTIONS, DESCRIBE, ANNOUNCE, SETUP, PLAY, PAUSE, RECORD, TEARDOWN";

/// What the connection loop should do after a response is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    StartReaderFanout,
    StartPublisherFanout,
    CloseSilently,
}

pub struct Outcome {
    pub response: Option<RtspResponse>,
    pub effect: Effect,
}

impl Outcome {
    fn respond(response: RtspResponse) -> Self {
        Outcome {
            response: Some(response),
            effect: Effect::None,
        }
    }

    fn respond_with_effect(response: RtspResponse, effect: Effect) -> Self {
        Outcome {
            response: Some(response),
            effect,
        }
    }

    fn silent_close() -> Self {
        Outcome {
            response: None,
            effect: Effect::CloseSilently,
        }
    }

    /// Builds the outcome for a denied/challenged auth attempt: the 401
    /// response is always sent, and `close` (a repeated failure with a
    /// fresh challenge already issued) additionally tears the connection
    /// down right after, rather than letting the client retry forever.
    fn from_auth_failure((response, close): (RtspResponse, bool)) -> Self {
        Outcome {
            response: Some(response),
            effect: if close {
                Effect::CloseSilently
            } else {
                Effect::None
            },
        }
    }
}

/// Dispatches one parsed request against a session's state, returning the
/// response to write and the fan-in effect (if any) to apply afterward.
pub struct SessionHandler {
    registry: Registry,
    config: Arc<RelayConfig>,
}

impl SessionHandler {
    pub fn new(registry: Registry, config: Arc<RelayConfig>) -> Self {
        SessionHandler { registry, config }
    }

    pub fn handle(&self, session: &Arc<Session>, request: &RtspRequest) -> Outcome {
        let cseq = request.cseq().to_string();
        let outcome = match request.method.as_str() {
            "OPTIONS" => self.options(&cseq),
            "DESCRIBE" => self.describe(session, request, &cseq),
            "ANNOUNCE" => self.announce(session, request, &cseq),
            "SETUP" => self.setup(session, request, &cseq),
            "PLAY" => self.play(session, request, &cseq),
            "PAUSE" => self.pause(session, &cseq),
            "RECORD" => self.record(session, &cseq),
            "TEARDOWN" => return Outcome::silent_close(),
            _ => Outcome::respond(self.bad_request(&cseq)),
        };
        outcome
    }

    fn ok(&self, cseq: &str) -> RtspResponse {
        RtspResponse::ok(&self.config.server_agent).add_header("CSeq", cseq)
    }

    fn bad_request(&self, cseq: &str) -> RtspResponse {
        RtspResponse::bad_request(&self.config.server_agent).add_header("CSeq", cseq)
    }

    fn unsupported_transport(&self, cseq: &str) -> RtspResponse {
        RtspResponse::unsupported_transport(&self.config.server_agent).add_header("CSeq", cseq)
    }

    fn options(&self, cseq: &str) -> Outcome {
        Outcome::respond(self.ok(cseq).add_header("Public", PUBLIC_METHODS))
    }

    /// Check `Authorization` for `intent` against the configured credentials
    /// for that intent. `Ok(true)` means proceed; `Ok(false)` means a
    /// response has already been built (challenge or denial) and the caller
    /// should return it; the `bool` says whether the connection must close.
    fn check_auth(
        &self,
        session: &Arc<Session>,
        request: &RtspRequest,
        intent: Intent,
        cseq: &str,
    ) -> Result<(), (RtspResponse, bool)> {
        let creds = match intent {
            Intent::Publish => &self.config.publish_credentials,
            Intent::Read => &self.config.read_credentials,
        };
        let Some(creds) = creds else {
            return Ok(());
        };

        match request.get_header("Authorization") {
            None => {
                let challenge = session.issue_challenge(intent, &self.config.realm);
                let response = RtspResponse::unauthorized(&self.config.server_agent)
                    .add_header("CSeq", cseq)
                    .add_header("WWW-Authenticate", &challenge.www_authenticate());
                Err((response, false))
            }
            Some(header) => {
                let current = session.current_challenge(intent);
                let valid = match &current {
                    Some(challenge) => auth::validate(
                        header,
                        &request.method,
                        &request.uri,
                        &creds.username,
                        &creds.password,
                        challenge,
                    ),
                    None => false,
                };
                if valid {
                    Ok(())
                } else {
                    tracing::error!(session = %session.id, "authentication denied, closing connection");
                    let fresh = session.issue_challenge(intent, &self.config.realm);
                    let response = RtspResponse::unauthorized(&self.config.server_agent)
                        .add_header("CSeq", cseq)
                        .add_header("WWW-Authenticate", &fresh.www_authenticate());
                    Err((response, true))
                }
            }
        }
    }

    fn describe(&self, session: &Arc<Session>, request: &RtspRequest, cseq: &str) -> Outcome {
        if session.state() != SessionState::Starting {
            return Outcome::respond(self.bad_request(cseq));
        }
        if let Err(failure) = self.check_auth(session, request, Intent::Read, cseq) {
            return Outcome::from_auth_failure(failure);
        }

        let path = mount_path(&request.uri);
        let Some(publisher) = self.registry.read().publisher(&path) else {
            return Outcome::respond(self.bad_request(cseq));
        };
        let sdp = publisher.sdp();

        Outcome::respond(
            self.ok(cseq)
                .add_header("Content-Type", "application/sdp")
                .with_body(sdp),
        )
    }

    fn announce(&self, session: &Arc<Session>, request: &RtspRequest, cseq: &str) -> Outcome {
        if session.state() != SessionState::Starting {
            return Outcome::respond(self.bad_request(cseq));
        }
        if let Err(failure) = self.check_auth(session, request, Intent::Publish, cseq) {
            return Outcome::from_auth_failure(failure);
        }
        if request.get_header("Content-Type") != Some("application/sdp") {
            return Outcome::respond(self.bad_request(cseq));
        }

        let path = mount_path(&request.uri);
        if path.is_empty() {
            return Outcome::respond(self.bad_request(cseq));
        }

        let publisher: Arc<dyn Publisher> = session.clone();
        if self.registry.register_publisher(&path, publisher).is_err() {
            return Outcome::respond(self.bad_request(cseq));
        }

        session.set_path(&path);
        session.set_sdp(request.body.clone());
        session.set_state(SessionState::Announce);

        Outcome::respond(self.ok(cseq))
    }

    fn setup(&self, session: &Arc<Session>, request: &RtspRequest, cseq: &str) -> Outcome {
        let Some(transport_str) = request.get_header("Transport") else {
            return Outcome::respond(self.bad_request(cseq));
        };
        let Ok(transport) = TransportHeader::parse(transport_str) else {
            return Outcome::respond(self.bad_request(cseq));
        };

        let enabled = match transport.kind {
            TransportKind::Udp => self.config.udp_enabled,
            TransportKind::TcpInterleaved => self.config.tcp_enabled,
        };
        if !enabled {
            return Outcome::respond(self.unsupported_transport(cseq));
        }

        if transport.record {
            self.setup_publisher(session, request, &transport, cseq)
        } else {
            self.setup_reader(session, request, &transport, cseq)
        }
    }

    fn setup_publisher(
        &self,
        session: &Arc<Session>,
        request: &RtspRequest,
        transport: &TransportHeader,
        cseq: &str,
    ) -> Outcome {
        let state = session.state();
        if !matches!(state, SessionState::Announce | SessionState::PreRecord) {
            return Outcome::respond(self.bad_request(cseq));
        }
        if let Err(failure) = self.check_auth(session, request, Intent::Publish, cseq) {
            return Outcome::from_auth_failure(failure);
        }

        let media_count = session.media_count();
        let index = session.track_count();
        if index >= media_count {
            return Outcome::respond(self.bad_request(cseq));
        }

        let choice = match transport.kind {
            TransportKind::Udp => TransportChoice::Udp,
            TransportKind::TcpInterleaved => TransportChoice::TcpInterleaved,
        };
        if session.reserve_transport(choice).is_err() {
            return Outcome::respond(self.bad_request(cseq));
        }

        let transport_response_value = match transport.kind {
            TransportKind::TcpInterleaved => {
                let expected = (
                    crate::wire::interleaved::track_to_channel(index, Flow::Rtp),
                    crate::wire::interleaved::track_to_channel(index, Flow::Rtcp),
                );
                if transport.interleaved != Some(expected) {
                    return Outcome::respond(self.bad_request(cseq));
                }
                session.push_track(Track {
                    index,
                    client_rtp_port: 0,
                    client_rtcp_port: 0,
                });
                format!(
                    "RTP/AVP/TCP;unicast;mode=record;interleaved={}-{}",
                    expected.0, expected.1
                )
            }
            TransportKind::Udp => {
                let Some((lo, hi)) = transport.client_port.filter(|(lo, hi)| *lo != 0 && *hi != 0)
                else {
                    return Outcome::respond(self.bad_request(cseq));
                };
                session.push_track(Track {
                    index,
                    client_rtp_port: lo,
                    client_rtcp_port: hi,
                });
                format!(
                    "RTP/AVP;unicast;mode=record;client_port={lo}-{hi};server_port={}-{}",
                    self.config.rtp_port, self.config.rtcp_port
                )
            }
        };

        session.set_state(SessionState::PreRecord);

        Outcome::respond(
            self.ok(cseq)
                .add_header("Transport", &transport_response_value)
                .add_header("Session", crate::wire::response::FIXED_SESSION_TOKEN),
        )
    }

    fn setup_reader(
        &self,
        session: &Arc<Session>,
        request: &RtspRequest,
        transport: &TransportHeader,
        cseq: &str,
    ) -> Outcome {
        let state = session.state();
        if !matches!(state, SessionState::Starting | SessionState::PrePlay) {
            return Outcome::respond(self.bad_request(cseq));
        }
        if let Err(failure) = self.check_auth(session, request, Intent::Read, cseq) {
            return Outcome::from_auth_failure(failure);
        }

        let path = mount_path(&request.uri);
        let Some(publisher) = self.registry.read().publisher(&path) else {
            return Outcome::respond(self.bad_request(cseq));
        };

        let index = session.track_count();
        if index >= publisher.media_count() {
            return Outcome::respond(self.bad_request(cseq));
        }

        let choice = match transport.kind {
            TransportKind::Udp => TransportChoice::Udp,
            TransportKind::TcpInterleaved => TransportChoice::TcpInterleaved,
        };
        if session.reserve_transport(choice).is_err() {
            return Outcome::respond(self.bad_request(cseq));
        }

        let transport_response_value = match transport.kind {
            TransportKind::TcpInterleaved => {
                // The server computes the channel assignment from the
                // track's position rather than enforcing the client's
                // requested range.
                let channel = (
                    crate::wire::interleaved::track_to_channel(index, Flow::Rtp),
                    crate::wire::interleaved::track_to_channel(index, Flow::Rtcp),
                );
                session.push_track(Track {
                    index,
                    client_rtp_port: 0,
                    client_rtcp_port: 0,
                });
                format!(
                    "RTP/AVP/TCP;unicast;interleaved={}-{}",
                    channel.0, channel.1
                )
            }
            TransportKind::Udp => {
                let Some((lo, hi)) = transport.client_port.filter(|(lo, hi)| *lo != 0 && *hi != 0)
                else {
                    return Outcome::respond(self.bad_request(cseq));
                };
                session.push_track(Track {
                    index,
                    client_rtp_port: lo,
                    client_rtcp_port: hi,
                });
                format!(
                    "RTP/AVP;unicast;client_port={lo}-{hi};server_port={}-{}",
                    self.config.rtp_port, self.config.rtcp_port
                )
            }
        };

        session.set_path(&path);
        session.set_state(SessionState::PrePlay);

        Outcome::respond(
            self.ok(cseq)
                .add_header("Transport", &transport_response_value)
                .add_header("Session", crate::wire::response::FIXED_SESSION_TOKEN),
        )
    }

    fn play(&self, session: &Arc<Session>, _request: &RtspRequest, cseq: &str) -> Outcome {
        if session.state() != SessionState::PrePlay {
            return Outcome::respond(self.bad_request(cseq));
        }
        let path = session.path();
        let Some(publisher) = self.registry.read().publisher(&path) else {
            return Outcome::respond(self.bad_request(cseq));
        };
        if session.track_count() != publisher.media_count() || session.track_count() == 0 {
            return Outcome::respond(self.bad_request(cseq));
        }

        session.set_state(SessionState::Play);

        let response = self
            .ok(cseq)
            .add_header("Session", crate::wire::response::FIXED_SESSION_TOKEN);

        match session.transport() {
            Some(TransportChoice::TcpInterleaved) => {
                Outcome::respond_with_effect(response, Effect::StartReaderFanout)
            }
            _ => Outcome::respond(response),
        }
    }

    fn pause(&self, session: &Arc<Session>, cseq: &str) -> Outcome {
        if session.state() != SessionState::Play {
            return Outcome::respond(self.bad_request(cseq));
        }
        session.set_state(SessionState::PrePlay);
        Outcome::respond(
            self.ok(cseq)
                .add_header("Session", crate::wire::response::FIXED_SESSION_TOKEN),
        )
    }

    fn record(&self, session: &Arc<Session>, cseq: &str) -> Outcome {
        if session.state() != SessionState::PreRecord {
            return Outcome::respond(self.bad_request(cseq));
        }
        let media_count = session.media_count();
        if session.track_count() != media_count || session.track_count() == 0 {
            return Outcome::respond(self.bad_request(cseq));
        }

        session.set_state(SessionState::Record);

        let response = self
            .ok(cseq)
            .add_header("Session", crate::wire::response::FIXED_SESSION_TOKEN);

        match session.transport() {
            Some(TransportChoice::TcpInterleaved) => {
                Outcome::respond_with_effect(response, Effect::StartPublisherFanout)
            }
            _ => Outcome::respond(response),
        }
    }
}

/// Derive `(track index, flow)` from an interleaved channel, rejecting a
/// channel that addresses a track the session never set up.
pub fn channel_for_record(session: &Session, channel: u8) -> Option<(usize, Flow)> {
    let (track, flow) = channel_to_track(channel);
    if track < session.track_count() {
        Some((track, flow))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::request::RtspRequest;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn handler() -> SessionHandler {
        SessionHandler::new(Registry::new(), Arc::new(RelayConfig::default()))
    }

    #[test]
    fn options_always_succeeds() {
        let h = handler();
        let session = Session::new(addr());
        let req = RtspRequest::parse("OPTIONS * RTSP/1.0\r\nCSeq: 1\r\n\r\n", Vec::new()).unwrap();
        let outcome = h.handle(&session, &req);
        assert_eq!(outcome.response.unwrap().status_code, 200);
    }

    #[test]
    fn describe_without_publisher_is_bad_request() {
        let h = handler();
        let session = Session::new(addr());
        let req = RtspRequest::parse(
            "DESCRIBE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 1\r\n\r\n",
            Vec::new(),
        )
        .unwrap();
        let outcome = h.handle(&session, &req);
        assert_eq!(outcome.response.unwrap().status_code, 400);
    }

    #[test]
    fn announce_then_describe_round_trips_sdp() {
        let registry = Registry::new();
        let h = SessionHandler::new(registry, Arc::new(RelayConfig::default()));
        let publisher = Session::new(addr());
        let sdp = b"v=0\r\nm=video 0 RTP/AVP 96\r\n".to_vec();
        let announce_req = RtspRequest::parse(
            "ANNOUNCE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 1\r\nContent-Type: application/sdp\r\n\r\n",
            sdp.clone(),
        )
        .unwrap();
        let outcome = h.handle(&publisher, &announce_req);
        assert_eq!(outcome.response.unwrap().status_code, 200);
        assert_eq!(publisher.state(), SessionState::Announce);

        let reader = Session::new("127.0.0.1:9001".parse().unwrap());
        let describe_req = RtspRequest::parse(
            "DESCRIBE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 1\r\n\r\n",
            Vec::new(),
        )
        .unwrap();
        let outcome = h.handle(&reader, &describe_req);
        let response = outcome.response.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body.unwrap(), sdp);
    }

    #[test]
    fn announce_twice_on_same_path_is_rejected() {
        let registry = Registry::new();
        let h = SessionHandler::new(registry, Arc::new(RelayConfig::default()));
        let sdp = b"v=0\r\nm=video 0 RTP/AVP 96\r\n".to_vec();
        let req = RtspRequest::parse(
            "ANNOUNCE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 1\r\nContent-Type: application/sdp\r\n\r\n",
            sdp,
        )
        .unwrap();

        let first = Session::new(addr());
        assert_eq!(h.handle(&first, &req).response.unwrap().status_code, 200);

        let second = Session::new("127.0.0.1:9002".parse().unwrap());
        assert_eq!(h.handle(&second, &req).response.unwrap().status_code, 400);
    }

    #[test]
    fn missing_auth_challenges_once_then_accepts_valid_digest() {
        let mut config = RelayConfig::default();
        config.publish_credentials = Some(crate::config::Credentials {
            username: "alice".to_string(),
            password: "secret".to_string(),
        });
        let h = SessionHandler::new(Registry::new(), Arc::new(config));
        let session = Session::new(addr());

        let sdp = b"v=0\r\nm=video 0 RTP/AVP 96\r\n".to_vec();
        let req = RtspRequest::parse(
            "ANNOUNCE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 1\r\nContent-Type: application/sdp\r\n\r\n",
            sdp.clone(),
        )
        .unwrap();
        let outcome = h.handle(&session, &req);
        let response = outcome.response.unwrap();
        assert_eq!(response.status_code, 401);
        let www_auth = response
            .headers
            .iter()
            .find(|(k, _)| k == "WWW-Authenticate")
            .unwrap()
            .1
            .clone();

        let authz =
            auth::digest_authorization("alice", "secret", "ANNOUNCE", "rtsp://host/cam1", &www_auth)
                .unwrap();
        let raw = format!(
            "ANNOUNCE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 2\r\nContent-Type: application/sdp\r\nAuthorization: {authz}\r\n\r\n"
        );
        let req2 = RtspRequest::parse(&raw, sdp).unwrap();
        let outcome2 = h.handle(&session, &req2);
        assert_eq!(outcome2.response.unwrap().status_code, 200);
    }

    #[test]
    fn invalid_auth_retry_closes_the_connection() {
        let mut config = RelayConfig::default();
        config.publish_credentials = Some(crate::config::Credentials {
            username: "alice".to_string(),
            password: "secret".to_string(),
        });
        let h = SessionHandler::new(Registry::new(), Arc::new(config));
        let session = Session::new(addr());

        let sdp = b"v=0\r\nm=video 0 RTP/AVP 96\r\n".to_vec();
        let req = RtspRequest::parse(
            "ANNOUNCE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 1\r\nContent-Type: application/sdp\r\n\r\n",
            sdp.clone(),
        )
        .unwrap();
        let first = h.handle(&session, &req);
        assert_eq!(first.response.unwrap().status_code, 401);
        assert_eq!(first.effect, Effect::None);

        let bad_raw = "ANNOUNCE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 2\r\nContent-Type: application/sdp\r\nAuthorization: Digest username=\"alice\", realm=\"rtsp-relay\", nonce=\"x\", uri=\"rtsp://host/cam1\", response=\"0000000000000000000000000000000\"\r\n\r\n";
        let bad_req = RtspRequest::parse(bad_raw, sdp).unwrap();
        let second = h.handle(&session, &bad_req);
        assert_eq!(second.response.unwrap().status_code, 401);
        assert_eq!(second.effect, Effect::CloseSilently);
    }

    #[test]
    fn setup_with_disabled_transport_is_461() {
        let mut config = RelayConfig::default();
        config.udp_enabled = false;
        let registry = Registry::new();
        let h = SessionHandler::new(registry, Arc::new(config));

        let sdp = b"v=0\r\nm=video 0 RTP/AVP 96\r\n".to_vec();
        let announce = RtspRequest::parse(
            "ANNOUNCE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 1\r\nContent-Type: application/sdp\r\n\r\n",
            sdp,
        )
        .unwrap();
        let publisher = Session::new(addr());
        h.handle(&publisher, &announce);

        let setup = RtspRequest::parse(
            "SETUP rtsp://host/cam1/trackID=0 RTSP/1.0\r\nCSeq: 2\r\nTransport: RTP/AVP;unicast;client_port=9000-9001\r\n\r\n",
            Vec::new(),
        )
        .unwrap();
        let outcome = h.handle(&publisher, &setup);
        assert_eq!(outcome.response.unwrap().status_code, 461);
    }

    #[test]
    fn describe_after_announce_is_bad_request() {
        let registry = Registry::new();
        let h = SessionHandler::new(registry, Arc::new(RelayConfig::default()));
        let sdp = b"v=0\r\nm=video 0 RTP/AVP 96\r\n".to_vec();
        let announce = RtspRequest::parse(
            "ANNOUNCE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 1\r\nContent-Type: application/sdp\r\n\r\n",
            sdp,
        )
        .unwrap();
        let publisher = Session::new(addr());
        assert_eq!(h.handle(&publisher, &announce).response.unwrap().status_code, 200);

        let describe = RtspRequest::parse(
            "DESCRIBE rtsp://host/cam1 RTSP/1.0\r\nCSeq: 2\r\n\r\n",
            Vec::new(),
        )
        .unwrap();
        let outcome = h.handle(&publisher, &describe);
        assert_eq!(outcome.response.unwrap().status_code, 400);
    }

    #[test]
    fn setup_missing_unicast_is_bad_request() {
        let h = handler();
        let session = Session::new(addr());
        let setup = RtspRequest::parse(
            "SETUP rtsp://host/cam1/trackID=0 RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/AVP;client_port=9000-9001\r\n\r\n",
            Vec::new(),
        )
        .unwrap();
        let outcome = h.handle(&session, &setup);
        assert_eq!(outcome.response.unwrap().status_code, 400);
    }

    #[test]
    fn setup_unknown_profile_is_bad_request() {
        let h = handler();
        let session = Session::new(addr());
        let setup = RtspRequest::parse(
            "SETUP rtsp://host/cam1/trackID=0 RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/SAVP;unicast;client_port=9000-9001\r\n\r\n",
            Vec::new(),
        )
        .unwrap();
        let outcome = h.handle(&session, &setup);
        assert_eq!(outcome.response.unwrap().status_code, 400);
    }
}
