//! Client-side synchronization for pair-programming classrooms.
//!
//! A teacher and one student at a time share a code buffer per problem. Each
//! side runs a [`SyncEngine`] that mirrors full snapshots of the buffer,
//! patches the local editor with a minimal edit set, relays caret positions
//! and keeps the teacher's drawing overlay in view.

pub mod annotation;
pub mod buffer;
pub mod bus;
pub mod cursor;
pub mod diff;
pub mod editor;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod session;
pub mod ws;

pub use bus::{BusError, BusSignal, MemoryBus, RealtimeBus};
pub use cursor::RemoteCursor;
pub use diff::{compute_edits, Position, TextEdit};
pub use editor::{EditorAdapter, EditorError, EditorEvent, TextModel};
pub use engine::{Membership, Participant, SyncEngine};
pub use error::SyncError;
pub use protocol::{ClientEvent, CollabId, Point, Polyline, ProblemId, Role, ServerEvent};
pub use session::SessionPhase;
