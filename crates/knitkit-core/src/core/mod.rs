//! Session state machine and event plumbing

pub mod event;
pub mod state;

pub use event::{EventDispatcher, SessionEvent};
pub use state::{transition, Trigger};
