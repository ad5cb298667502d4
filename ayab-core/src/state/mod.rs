//! Operating state machine
//!
//! The state is owned by the protocol FSM; these types only define the
//! legal transitions.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::OperatingState;
