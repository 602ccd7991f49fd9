//! The adaptive future buffer and release scheduler.
//!
//! Frames arrive from the network stamped with a presentation instant on the
//! shared clock, somewhere in the near future. This module holds them until
//! that instant, drops what arrives too late or absurdly early, releases the
//! rest to the [`crate::render::Renderer`] in presentation order, and widens
//! or narrows its depth target as measured network quality moves.

mod actions;
mod adaptive;
mod future_buffer;
mod scheduler;

pub use actions::{ActionQueue, ScheduleOutcome, ScheduledAction};
pub use adaptive::AdaptiveDepth;
pub use future_buffer::{AdmitResult, BufferStats, FutureBuffer};
pub use scheduler::{Scheduler, SchedulerEvent};

#[cfg(test)]
mod tests;
