//! The pull-client pusher: treats a remote RTSP URL as a local publisher so
//! local readers can subscribe to it at a chosen mount path.

mod client;

pub use client::{PullPusher, PusherSnapshot, PusherStats, TransportPreference};
