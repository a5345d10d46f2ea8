//! Networked side of the game: wire protocol, sessions, presence, push
//! delivery, notification batching, the clock broadcast and the TCP gateway.
//!
//! [`GameServer`] owns the process-scoped state (presence registry and the
//! notification batcher); nothing outside it mutates those maps.

pub mod clock;
pub mod gateway;
pub mod notify;
pub mod presence;
pub mod protocol;
pub mod push;
#[allow(clippy::module_inception)]
pub mod server;
pub mod session;

pub use notify::{compose_batch, NotifierHandle, NotifierStats, PendingEntry};
pub use presence::PresenceRegistry;
pub use protocol::{ClientEvent, ServerEvent};
pub use push::{LogPushSender, PushError, PushPayload, PushSender};
pub use server::GameServer;
pub use session::Session;
