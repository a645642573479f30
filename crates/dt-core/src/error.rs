//! Error taxonomy shared by the pipeline stages and their collaborators.

use std::fmt;

use thiserror::Error;

/// Which external signal source an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Motion,
    Location,
    Track,
}

impl SourceKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Motion => "motion",
            Self::Location => "location",
            Self::Track => "track",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the persistent store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A keyed read found nothing.
    #[error("no results")]
    NoResults,
    /// A stored record could not be turned back into a domain value.
    #[error("could not parse stored {record}: {message}")]
    CouldNotParse {
        record: &'static str,
        message: String,
    },
    /// The storage engine itself failed.
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Errors from a signal source query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source cannot be queried, usually for lack of permission.
    #[error("{0} source is not available")]
    NotAvailable(SourceKind),
    /// The source is backed by storage and the read failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Motion segmentation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MotionError {
    #[error("motion activity is not available")]
    NotAvailable,
    #[error("no qualifying motion activities in window")]
    NoActivities,
}

/// Why a pipeline run aborted. Nothing is persisted or cleaned for the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A source could not be queried; surfaced to the permission prompt, not retried.
    #[error("{0} source unavailable")]
    SourceUnavailable(SourceKind),
    /// A source answered but nothing in the window was usable.
    #[error("no qualifying {0} data")]
    NoQualifyingData(SourceKind),
    /// Reading from or writing to the store failed.
    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl From<SourceError> for PipelineError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotAvailable(kind) => Self::SourceUnavailable(kind),
            SourceError::Store(store) => Self::StorageFailure(store),
        }
    }
}

impl From<MotionError> for PipelineError {
    fn from(err: MotionError) -> Self {
        match err {
            MotionError::NotAvailable => Self::SourceUnavailable(SourceKind::Motion),
            MotionError::NoActivities => Self::NoQualifyingData(SourceKind::Motion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_map_onto_pipeline_taxonomy() {
        assert_eq!(
            PipelineError::from(SourceError::NotAvailable(SourceKind::Location)),
            PipelineError::SourceUnavailable(SourceKind::Location)
        );
        assert_eq!(
            PipelineError::from(SourceError::Store(StoreError::NoResults)),
            PipelineError::StorageFailure(StoreError::NoResults)
        );
        assert_eq!(
            PipelineError::from(MotionError::NoActivities),
            PipelineError::NoQualifyingData(SourceKind::Motion)
        );
    }

    #[test]
    fn messages_name_the_source() {
        let err = PipelineError::SourceUnavailable(SourceKind::Motion);
        assert_eq!(err.to_string(), "motion source unavailable");
    }
}
