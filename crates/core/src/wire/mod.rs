//! RTSP wire codecs (RFC 2326 request/response, interleaved framing,
//! transport-header negotiation, SDP byte-exact handling, Digest/Basic
//! authentication).
//!
//! ## Supported methods
//!
//! | Method | RFC section | Purpose |
//! |--------|-------------|---------|
//! | OPTIONS | §10.1 | Capability discovery |
//! | DESCRIBE | §10.2 | Retrieve the publisher's SDP, byte-exact |
//! | ANNOUNCE | §10.3 | Publisher registers its SDP |
//! | SETUP | §10.4 | Negotiate transport for one track |
//! | PLAY | §10.5 | Start media delivery to a reader |
//! | PAUSE | §10.6 | Suspend delivery |
//! | RECORD | §10.11 | Start accepting media from a publisher |
//! | TEARDOWN | §10.7 | Destroy session |

pub mod auth;
pub mod interleaved;
pub mod request;
pub mod response;
pub mod sdp;
pub mod transport_header;
pub mod uri;

pub use auth::Challenge;
pub use interleaved::{Flow, Frame};
pub use request::RtspRequest;
pub use response::RtspResponse;
pub use transport_header::{TransportHeader, TransportKind};
pub use uri::mount_path;
