//! Interleaved RTP/RTCP framing for TCP transport (RFC 2326 §10.12).
//!
//! Once a session reaches PLAY or RECORD over `RTP/AVP/TCP`, media frames
//! share the same TCP byte stream as RTSP requests/responses, each prefixed
//! by a 4-byte header:
//!
//! ```text
//! '$'  channel:u8  length:u16be  payload[length]
//! ```
//!
//! A byte that isn't `$` at a frame boundary means a textual RTSP request
//! has been resumed on the same connection (some clients interleave a
//! `GET_PARAMETER` keepalive between frames); the caller falls back to
//! line-based request parsing in that case.

pub const FRAME_MARKER: u8 = 0x24; // '$'
const HEADER_LEN: usize = 4;

/// Map a zero-based track index and RTP/RTCP flow to its interleaved channel.
///
/// `track 0` → RTP channel 0, RTCP channel 1; `track 1` → 2/3; and so on.
pub fn track_to_channel(track: usize, flow: Flow) -> u8 {
    let base = (track * 2) as u8;
    match flow {
        Flow::Rtp => base,
        Flow::Rtcp => base + 1,
    }
}

/// Inverse of [`track_to_channel`]: recover the track index and flow from a
/// channel number.
pub fn channel_to_track(channel: u8) -> (usize, Flow) {
    let track = (channel / 2) as usize;
    let flow = if channel % 2 == 0 { Flow::Rtp } else { Flow::Rtcp };
    (track, flow)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Rtp,
    Rtcp,
}

/// A single interleaved frame: its channel and payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub channel: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(channel: u8, payload: Vec<u8>) -> Self {
        Frame { channel, payload }
    }

    /// Encode as `$ channel len payload`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.push(FRAME_MARKER);
        out.push(self.channel);
        out.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_frame() {
        let frame = Frame::new(0, b"AAAAAAAAAAAA".to_vec());
        let encoded = frame.encode();
        assert_eq!(encoded[0], FRAME_MARKER);
        assert_eq!(encoded[1], 0);
        assert_eq!(u16::from_be_bytes([encoded[2], encoded[3]]), 12);
        assert_eq!(&encoded[4..], b"AAAAAAAAAAAA");
    }

    #[test]
    fn channel_mapping_round_trips() {
        for track in 0..8usize {
            for flow in [Flow::Rtp, Flow::Rtcp] {
                let ch = track_to_channel(track, flow);
                assert_eq!(channel_to_track(ch), (track, flow));
            }
        }
    }

    #[test]
    fn rtp_is_even_rtcp_is_odd() {
        assert_eq!(track_to_channel(0, Flow::Rtp), 0);
        assert_eq!(track_to_channel(0, Flow::Rtcp), 1);
        assert_eq!(track_to_channel(3, Flow::Rtp), 6);
        assert_eq!(track_to_channel(3, Flow::Rtcp), 7);
    }
}
