//! Test doubles: in-memory transports, a recording renderer, and network
//! condition simulation.
//!
//! These live in the crate proper (not behind `cfg(test)`) so integration
//! tests and downstream consumers can drive the stack without sockets or
//! audio hardware.

mod network_sim;
mod renderer;
mod transport;

pub use network_sim::LinkSimulator;
pub use renderer::{MockRenderer, RenderedFrame};
pub use transport::{ChannelTransport, transport_pair};
