//! Network transport layer: the RTSP signaling TCP listener and the RTP/RTCP
//! UDP listener pair.
//!
//! - **TCP** ([`tcp`]): carries RTSP request/response signaling and,
//!   interleaved within the same connection, RTP/RTCP frames for sessions
//!   that negotiated `RTP/AVP/TCP`. One thread per connection.
//!
//! - **UDP** ([`udp`]): two bound listeners, one for RTP and one for RTCP,
//!   each with its own sender and receiver thread, for sessions that
//!   negotiated plain `RTP/AVP`.

pub mod tcp;
pub mod udp;
