//! Room registry and lifecycle

pub mod code;
pub mod manager;
pub mod room;

pub use manager::RoomManager;
pub use room::{Room, RoomSummary};
