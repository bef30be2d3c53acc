use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// An assumption is malformed or contradicts another one.
    #[error("invalid assumption `{field}`: {reason}")]
    InvalidAssumptions { field: &'static str, reason: String },

    /// Doubling the upper bound never produced a balance that lasts the term.
    #[error(
        "no search bracket found below {ceiling:.0}; the plan is unsustainable at any finite starting balance"
    )]
    NoBracketFound { ceiling: f64 },

    #[error("invalid solver config: {0}")]
    InvalidSolverConfig(String),

    #[error("failed to render report: {0}")]
    Render(String),
}

impl ModelError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidAssumptions {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
