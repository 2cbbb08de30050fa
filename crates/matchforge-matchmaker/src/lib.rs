//! Matchmaking for Matchforge.
//!
//! Players queue per [`GameMode`](matchforge_protocol::GameMode). A single
//! [`Scheduler`] loop pairs the oldest waiting requests of each mode, in
//! strict FIFO order, and creates a room for them in the
//! [`RoomRegistry`](matchforge_room::RoomRegistry).
//!
//! ```ignore
//! let scheduler = Scheduler::new(SchedulerConfig::default(), registry);
//! let handle = scheduler.spawn();
//!
//! let (request, outcome) = MatchRequest::new(player_id);
//! let ticket = scheduler.enqueue(GameMode::DEFAULT, request)?;
//! match outcome.await {
//!     Ok(MatchOutcome::Matched(seat)) => { /* enter seat.room_id */ }
//!     Ok(MatchOutcome::Unavailable) => { /* tell the player */ }
//!     Err(_) => { /* cancelled or scheduler stopped */ }
//! }
//!
//! handle.stop().await;
//! ```

mod config;
mod error;
mod queue;
mod scheduler;

pub use config::{ModeConfig, SchedulerConfig};
pub use error::MatchError;
pub use queue::{MatchOutcome, MatchRequest, Ticket};
pub use scheduler::{Scheduler, SchedulerHandle};
