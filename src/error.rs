use thiserror::Error;

/// Errors raised when the upstream landmark source breaks its contract.
///
/// Tracking loss, shaky calibration and abandoned reps are not errors; the
/// pipeline recovers from those on its own and reports them as feedback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("expected {expected} landmarks per frame, got {actual}")]
    WrongLandmarkCount { expected: usize, actual: usize },

    #[error("landmark {index} has a non-finite coordinate or visibility")]
    NonFiniteLandmark { index: usize },

    #[error("unknown exercise: {0}")]
    UnknownExercise(String),
}
