//! Exit-outcome classification.
//!
//! The decision loop turns the first termination event into a [`Trigger`];
//! the trigger alone decides the exit code:
//!
//! | trigger       | code |
//! |---------------|------|
//! | `Interrupted` | 125  |
//! | `Completed`   | 0    |
//! | `Crashed`     | 1    |

use std::process::ExitCode;

use crate::error::RuntimeError;

/// Exit code for a clean stop.
pub const EXIT_GRACEFUL: u8 = 0;
/// Exit code for an unhandled component failure or a failed bootstrap.
pub const EXIT_CRASH: u8 = 1;
/// Exit code for an operator-requested stop.
pub const EXIT_INTERRUPTED: u8 = 125;

/// What ended the Running phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Operator interrupt.
    Interrupted,
    /// Graceful sentinel, or completion with no error.
    Completed,
    /// A component failed.
    Crashed,
}

impl Trigger {
    pub fn exit_code(&self) -> u8 {
        match self {
            Trigger::Interrupted => EXIT_INTERRUPTED,
            Trigger::Completed => EXIT_GRACEFUL,
            Trigger::Crashed => EXIT_CRASH,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Interrupted => "interrupted",
            Trigger::Completed => "completed",
            Trigger::Crashed => "crashed",
        }
    }
}

/// Terminal result of [`Service::run`](crate::Service::run).
#[derive(Debug)]
pub struct Outcome {
    trigger: Trigger,
    error: Option<RuntimeError>,
}

impl Outcome {
    pub fn interrupted() -> Self {
        Self {
            trigger: Trigger::Interrupted,
            error: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            trigger: Trigger::Completed,
            error: None,
        }
    }

    pub fn crashed(error: RuntimeError) -> Self {
        Self {
            trigger: Trigger::Crashed,
            error: Some(error),
        }
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// The error that caused a crash.
    pub fn error(&self) -> Option<&RuntimeError> {
        self.error.as_ref()
    }

    pub fn into_error(self) -> Option<RuntimeError> {
        self.error
    }

    pub fn exit_code(&self) -> u8 {
        self.trigger.exit_code()
    }

    pub fn is_success(&self) -> bool {
        self.trigger != Trigger::Crashed
    }
}

impl From<&Outcome> for ExitCode {
    fn from(outcome: &Outcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(&outcome)
    }
}
