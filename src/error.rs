use thiserror::Error;

/// Errors that abort report generation.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The population selector does not resolve to an existing record
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A store query failed
    #[error("store query failed: {0}")]
    Store(#[from] sqlx::Error),
}

impl AnalysisError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        AnalysisError::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalysisError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
