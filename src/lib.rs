pub mod app;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logger;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;
pub mod view;

pub use app::CallApp;
pub use config::{LogConfig, SessionConfig};
pub use coordinator::{SessionCoordinator, SessionEvent};
pub use error::{SessionError, SessionResult};
pub use session::{Role, Session, SessionPhase};
pub use signaling::memory::MemorySignaling;
pub use signaling::{Delivery, Request, SignalingClient, Subscription, Topic};
pub use view::{ChannelViewPort, ViewEvent, ViewPort};
