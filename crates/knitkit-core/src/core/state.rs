//! Session state machine
//!
//! A single transition table shared by the protocol engine and by observers
//! that want to predict what a trigger will do.

use crate::data::SessionState;
use crate::error::SessionError;
use std::fmt;

/// Inputs that move a session between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A job was validated and stored
    Configure,
    /// Knitting was requested
    Knit,
    /// The firmware answered `reqStart`
    StartConfirmed {
        /// Whether the firmware accepted the start.
        success: bool,
    },
    /// A line was sent in response to a request
    LineServed {
        /// Whether the line carried the last-line flag.
        last: bool,
    },
    /// The caller stopped the session
    Cancel,
    /// An unrecoverable transport, protocol or device failure
    Fail,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configure => write!(f, "configure"),
            Self::Knit => write!(f, "knit"),
            Self::StartConfirmed { success } => write!(f, "start confirmed ({})", success),
            Self::LineServed { last } => write!(f, "line served (last={})", last),
            Self::Cancel => write!(f, "cancel"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Compute the state a trigger leads to
pub fn transition(current: SessionState, trigger: Trigger) -> Result<SessionState, SessionError> {
    use SessionState::*;

    let next = match (current, trigger) {
        (_, Trigger::Fail) => Error,
        (Activated | Configured | Finished | Error, Trigger::Configure) => Configured,
        (Configured, Trigger::Knit) => Knitting,
        (Knitting, Trigger::StartConfirmed { success: true }) => Knitting,
        (Knitting, Trigger::StartConfirmed { success: false }) => Error,
        (Knitting, Trigger::LineServed { last: false }) => Knitting,
        (Knitting, Trigger::LineServed { last: true }) => Finished,
        (Knitting, Trigger::Cancel) => Configured,
        (current, trigger) => {
            return Err(SessionError::InvalidStateTransition {
                current: current.to_string(),
                trigger: trigger.to_string(),
            })
        }
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_configure_from_every_idle_state() {
        for state in [Activated, Configured, Finished, Error] {
            assert_eq!(transition(state, Trigger::Configure).unwrap(), Configured);
        }
        assert!(transition(Knitting, Trigger::Configure).is_err());
    }

    #[test]
    fn test_knitting_lifecycle() {
        let state = transition(Configured, Trigger::Knit).unwrap();
        assert_eq!(state, Knitting);
        let state = transition(state, Trigger::StartConfirmed { success: true }).unwrap();
        assert_eq!(state, Knitting);
        let state = transition(state, Trigger::LineServed { last: false }).unwrap();
        assert_eq!(state, Knitting);
        let state = transition(state, Trigger::LineServed { last: true }).unwrap();
        assert_eq!(state, Finished);
    }

    #[test]
    fn test_failures() {
        assert_eq!(
            transition(Knitting, Trigger::StartConfirmed { success: false }).unwrap(),
            Error
        );
        for state in [Activated, Configured, Knitting, Finished, Error] {
            assert_eq!(transition(state, Trigger::Fail).unwrap(), Error);
        }
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(transition(Activated, Trigger::Knit).is_err());
        assert!(transition(Finished, Trigger::Knit).is_err());
        assert!(transition(Configured, Trigger::LineServed { last: false }).is_err());
        assert!(transition(Finished, Trigger::LineServed { last: false }).is_err());
        assert_eq!(transition(Knitting, Trigger::Cancel).unwrap(), Configured);
        assert!(transition(Configured, Trigger::Cancel).is_err());
    }
}
