// Central Error Type for a verification run

use thiserror::Error;

use crate::domain::ProcessId;
use crate::port::{LaunchError, ListingError};

/// Fatal verification errors
///
/// Each variant stops the run immediately. Per-descendant failures are NOT
/// errors; they are collected in the `VerificationReport`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Spawn error ({target}): {reason}")]
    Spawn { target: String, reason: String },

    #[error("Malformed listing while enumerating children of {parent}: {line:?}")]
    MalformedListing { parent: ProcessId, line: String },

    #[error("Listing children of {parent} failed: {reason}")]
    ListingFailed { parent: ProcessId, reason: String },

    #[error("Root process {pid} never became ready: {reason}")]
    Readiness { pid: ProcessId, reason: String },

    #[error("Could not deliver termination signal to root {pid}: {reason}")]
    TerminationDelivery { pid: ProcessId, reason: String },

    #[error("Could not collect exit status of root {pid}: {reason}")]
    RootWait { pid: ProcessId, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::domain::DomainError),
}

/// Result type alias using VerifyError
pub type Result<T> = std::result::Result<T, VerifyError>;

impl From<ListingError> for VerifyError {
    fn from(err: ListingError) -> Self {
        match err {
            ListingError::Spawn { parent, reason } => VerifyError::Spawn {
                target: format!("listing query for {}", parent),
                reason,
            },
            ListingError::Malformed { parent, line } => {
                VerifyError::MalformedListing { parent, line }
            }
            ListingError::QueryFailed { parent, reason } => {
                VerifyError::ListingFailed { parent, reason }
            }
        }
    }
}

impl From<LaunchError> for VerifyError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::Spawn { program, reason } => VerifyError::Spawn {
                target: format!("root process {}", program),
                reason,
            },
            LaunchError::Readiness { pid, reason } => VerifyError::Readiness { pid, reason },
            LaunchError::Signal { pid, reason } => VerifyError::TerminationDelivery { pid, reason },
            LaunchError::Wait { pid, reason } => VerifyError::RootWait { pid, reason },
        }
    }
}
