//! Conversion Context - Errors

use thiserror::Error;

use super::JobState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Chunk index {index} out of range (total {total})")]
    OutOfRange { index: usize, total: usize },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },
}
