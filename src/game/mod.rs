//! Game simulation modules

pub mod collision;
pub mod entity;
pub mod physics;
pub mod room;
pub mod scheduler;
pub mod snapshot;

pub use entity::ConnectionId;
pub use room::{RoomError, RoomState};
pub use scheduler::TickScheduler;
pub use snapshot::SnapshotBuilder;
