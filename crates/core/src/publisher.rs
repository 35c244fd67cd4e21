//! The "anything that can act as a publisher" capability.
//!
//! A mount path's publisher slot is filled by either an inbound RTSP
//! session in `ANNOUNCE`/`PRE_RECORD`/`RECORD` state, or a
//! [`crate::pusher::PullPusher`] republishing a remote stream. Both are
//! addressed uniformly through this trait; the forwarder and the
//! DESCRIBE/SETUP handlers never need to know which one they're talking to.

/// A publisher occupying one mount-path slot in the registry.
pub trait Publisher: Send + Sync {
    /// The mount path this publisher owns.
    fn path(&self) -> String;

    /// The publisher's SDP, byte-exact as received on ANNOUNCE (or, for a
    /// pull pusher, as received from the upstream DESCRIBE).
    fn sdp(&self) -> Vec<u8>;

    /// Number of `m=` media sections in [`sdp`](Self::sdp). Bounds how many
    /// SETUP requests readers (and, for an inbound session, the publisher
    /// itself) may issue.
    fn media_count(&self) -> usize;

    /// Force this publisher to stop and vacate its mount path. Idempotent.
    fn close(&self);
}
