//! Player state: profiles, the world map, persistence, and the actions that
//! mutate them under per-account serialization.

pub mod actions;
pub mod errors;
pub mod locks;
pub mod mail;
pub mod storage;
pub mod types;
pub mod world;

pub use actions::{ActionEngine, Outcome, Registration, Rejection, RobReport, RobRules};
pub use errors::GameError;
pub use locks::AccountLocks;
pub use mail::RecordedMessage;
pub use storage::{MemoryProfileStore, ProfileStore, SledProfileStore, SledProfileStoreBuilder};
pub use types::{Direction, MessageRecord, PlayerProfile, MAX_HEALTH};
pub use world::{Location, WorldMap};
