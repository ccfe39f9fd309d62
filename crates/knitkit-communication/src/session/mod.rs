//! Knitting session engine
//!
//! - [`SessionController`]: state machine plus request/confirm protocol engine
//! - [`LineCursor`]: position of the next pass to serve
//! - [`spawn_session`]: runs a session on a dedicated blocking task

pub mod controller;
pub mod cursor;
pub mod worker;

pub use controller::{KnitJob, SessionController, SessionObserver};
pub use cursor::LineCursor;
pub use worker::{spawn_session, SessionHandle, SessionOutcome, WorkerConfig};
