use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeatError {
    #[error("no compatible lane or ready-up slot for category '{0}'")]
    NoCompatibleSlot(String),

    #[error("no lanes could be filled")]
    NothingToFill,

    #[error("no lanes to update")]
    NothingToUpdate,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("lane {0} not found")]
    LaneNotFound(u32),

    #[error("competitor not found: {0}")]
    CompetitorNotFound(String),

    #[error("lane {0} is locked")]
    LaneLocked(u32),

    #[error("lane {0} still has competitors assigned")]
    LaneOccupied(u32),

    #[error("exercise record is missing: initialize the competition first")]
    ExerciseMissing,

    #[error("exercise already initialized")]
    ExerciseExists,

    #[error("conflicting concurrent update: {0}")]
    Conflict(String),

    #[error("invalid rules config: {0}")]
    InvalidRules(String),

    #[error("invalid category '{0}'")]
    InvalidCategory(String),

    #[error("invalid lane type '{0}'")]
    InvalidLaneType(String),

    #[error("invalid exercise type '{0}'")]
    InvalidExerciseType(String),

    #[error("invalid exercise status '{0}'")]
    InvalidExerciseStatus(String),

    #[error("invalid competitor status '{0}'")]
    InvalidCompetitorStatus(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HeatError {
    /// True for failures where retrying the same operation may succeed
    /// once the conflicting writer has finished.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HeatError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, HeatError>;
