//! # ddpforge-av
//!
//! External-tool plumbing for the ddpforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool resolution** ([`resolve_tool`]) -- locate the TrueHD decoder and
//!   the Dolby Encoding Engine from a configured directory, the search
//!   directory or `PATH`.
//! - **Command execution** ([`ToolCommand`]) -- async builder that captures
//!   short runs or streams long ones line by line, with a bounded
//!   diagnostic tail.
//! - **Progress** ([`ProgressMonitor`], [`ProgressEvent`]) -- parse the
//!   engine's `Overall progress:` markers into structured events.
//! - **Validator shim** ([`ValidatorShim`]) -- scoped no-op stand-in for the
//!   schema validator the engine invokes.
//! - **Working directories** ([`JobWorkspace`]) -- adopt decoded artifacts,
//!   finalize encoder output, clean intermediates.

pub mod command;
mod error;
pub mod progress;
pub mod shim;
pub mod tools;
pub mod workspace;

// Re-exports
pub use command::{RunOutcome, ToolCommand, ToolOutput, DIAGNOSTIC_TAIL_LINES};
pub use error::{Error, Result};
pub use progress::{format_hms, ProgressEvent, ProgressMonitor};
pub use shim::ValidatorShim;
pub use tools::{check_tool, resolve_tool, Tool, ToolInfo, ToolLocation};
pub use workspace::{CleanupReport, JobWorkspace};
