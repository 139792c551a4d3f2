use thiserror::Error;

/// Errors that can occur in the sable engine core
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("score {0} is outside [-1, 1]")]
    InvalidScore(f32),
}

/// Convenience Result type for engine core operations
pub type Result<T> = std::result::Result<T, EngineError>;
