//! # rtsp-relay — multi-publisher RTSP relay library
//!
//! Publishers `ANNOUNCE`/`RECORD` a stream at a mount path; any number of
//! readers `DESCRIBE`/`SETUP`/`PLAY` the same path and receive every frame
//! the publisher sends, over TCP-interleaved or plain UDP transport. A
//! pull-client pusher can also populate a mount path by treating a remote
//! RTSP URL as if it were a local publisher.
//!
//! ## Protocol references
//!
//! | RFC | Topic | How this crate uses it |
//! |-----|-------|----------------------|
//! | [RFC 2326](https://tools.ietf.org/html/rfc2326) | RTSP 1.0 | Request/response parsing, session lifecycle, transport negotiation |
//! | [RFC 2617](https://tools.ietf.org/html/rfc2617) | HTTP Basic/Digest auth | Challenge issuance and validation, both as server and as pull-client |
//! | [RFC 4566](https://tools.ietf.org/html/rfc4566) | SDP | Byte-exact passthrough, media-section counting, connection-line rewriting |
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │  server   — RelayServer facade, pusher registry │
//! ├────────────────────────────────────────────┤
//! │  handler  — RTSP method dispatch, state machine │
//! │  session  — per-connection state, pusher — pull-client │
//! ├────────────────────────────────────────────┤
//! │  registry  — publisher table + session set       │
//! │  forwarder — cross-session frame fan-out          │
//! ├────────────────────────────────────────────┤
//! │  transport — TCP signaling listener, UDP data plane │
//! │  wire      — RTSP/SDP/Digest/interleaved codecs     │
//! └────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use rtsp_relay::{RelayConfig, RelayServer};
//!
//! let mut server = RelayServer::new(RelayConfig::default());
//! server.start().unwrap();
//! // ... publishers ANNOUNCE/RECORD, readers DESCRIBE/SETUP/PLAY ...
//! server.stop();
//! ```
//!
//! ## Crate layout
//!
//! - [`server`] — [`RelayServer`] facade: listener lifecycle, pusher registry.
//! - [`handler`] — [`handler::SessionHandler`], the RTSP method dispatcher.
//! - [`session`] — [`session::Session`] state machine and transport negotiation.
//! - [`pusher`] — [`pusher::PullPusher`], the pull-client republisher.
//! - [`registry`] — [`registry::Registry`], the publisher table + session set.
//! - [`forwarder`] — the cross-session frame fan-out routine.
//! - [`transport`] — TCP signaling listener, UDP RTP/RTCP listener pair.
//! - [`wire`] — RTSP/SDP/Digest/interleaved-framing codecs.
//! - [`config`] — [`config::RelayConfig`] and INI-file parsing.
//! - [`error`] — [`error::RtspError`] and [`error::Result`].

pub mod config;
pub mod error;
pub mod forwarder;
pub mod handler;
pub mod publisher;
pub mod pusher;
pub mod registry;
pub mod server;
pub mod session;
pub mod transport;
pub mod wire;

pub use config::RelayConfig;
pub use error::{Result, RtspError};
pub use publisher::Publisher;
pub use registry::Registry;
pub use server::RelayServer;
pub use session::Session;
