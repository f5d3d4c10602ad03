use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulingError {
    /// The stored memory state violates a model invariant. Indicates upstream
    /// data corruption; callers must not substitute defaults.
    #[error("corrupt card state: {0}")]
    CorruptState(String),

    #[error("invalid scheduler parameters: {0}")]
    InvalidParams(String),
}
