//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrapping (startup.rs):
//!     Load config → Inject BuildInfo → Validate → Initialize observability
//!
//! Running (service/supervisor.rs):
//!     Launch servers + application → wait on interrupt or first completion
//!
//! ShuttingDown (shutdown.rs):
//!     Deadline context → servers in launch order → application → report
//!
//! Terminated (outcome.rs):
//!     Trigger + error → exit code (0 / 125 / 1)
//! ```
//!
//! # Design Decisions
//! - Every component gets a child [`Context`] of one root context
//! - Shutdown is bounded by a deadline measured from the trigger moment
//! - Shutdown errors are logged and counted, never escalated
//! - Interrupts come from an [`InterruptSource`] so tests can fire them

pub mod context;
pub mod outcome;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use context::Context;
pub use outcome::{Outcome, Trigger, EXIT_CRASH, EXIT_GRACEFUL, EXIT_INTERRUPTED};
pub use shutdown::{ShutdownFailure, ShutdownReport, ShutdownSequence};
pub use signals::{manual, CtrlC, InterruptHandle, InterruptSource, ManualInterrupt};
pub use startup::ConfigSource;
