// Domain Layer - Pure types describing process trees and verification results

pub mod error;
pub mod outcome;
pub mod process;

// Re-exports
pub use error::DomainError;
pub use outcome::{
    DescendantOutcome, FailureKind, Presence, RootExit, TerminationOutcome, TerminationSignal,
    VerificationFailure, VerificationReport,
};
pub use process::{DescendantSet, ProcessId};
