//! Error types for the generation job tracker.

use thiserror::Error;

use super::status::{JobStatus, Provider};
use crate::blender::BlenderError;

/// Errors raised by [`super::JobTracker`].
#[derive(Debug, Error)]
pub enum JobError {
    /// No tracked job matches the given id.
    #[error("Unknown generation job '{job_id}'. Use the id returned by the generate tool")]
    UnknownJob {
        /// Id (or alias) that was looked up.
        job_id: String,
    },

    /// The job has not succeeded, so there is nothing to import.
    #[error("Generation job '{job_id}' is {status}; only Succeeded jobs can be imported")]
    NotReady {
        /// Job id.
        job_id: String,
        /// Current status.
        status: JobStatus,
    },

    /// The job's result was already imported and the job dropped.
    #[error("Generation job '{job_id}' has already been imported")]
    AlreadyImported {
        /// Job id.
        job_id: String,
    },

    /// The provider rejected or did not understand the request.
    #[error("{provider} error: {message}")]
    Remote {
        /// Provider that failed.
        provider: Provider,
        /// Message passed through from the provider.
        message: String,
    },

    /// The add-on could not be reached or reported an error.
    #[error(transparent)]
    Blender(#[from] BlenderError),
}

impl JobError {
    /// Returns true for contract violations by the caller (unknown id,
    /// premature or repeated import), as opposed to remote failures.
    #[must_use]
    pub const fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::UnknownJob { .. } | Self::NotReady { .. } | Self::AlreadyImported { .. }
        )
    }
}
