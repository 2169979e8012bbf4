pub mod connection;
pub mod ice;
pub mod media;
pub mod negotiation;
pub mod types;

pub use connection::{
    ConnectionEvents, ConnectionFactory, MediaConnection, PeerEvent, WebRtcConnector,
};
pub use ice::IceQueue;
pub use media::{LocalMedia, MediaSource, SampleTrackSource};
pub use types::{IceCandidate, RemoteStream, SdpType, ServerConfig, SessionDescription};
