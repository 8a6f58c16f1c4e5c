use thiserror::Error;

/// Failures surfaced to the caller. The `kind()` strings are part of the API
/// contract; the message text carried by each variant is cosmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("{0}")]
    InvalidParameters(String),
    #[error("{0}")]
    NoFeasibleSolution(String),
    #[error("{0}")]
    SolverUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl SchedulerError {
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::InvalidParameters(_) => "invalid_parameters",
            SchedulerError::NoFeasibleSolution(_) => "no_feasible_solution",
            SchedulerError::SolverUnavailable(_) => "solver_unavailable",
            SchedulerError::Internal(_) => "internal",
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        SchedulerError::InvalidParameters(message.into())
    }

    pub fn no_solution(message: impl Into<String>) -> Self {
        SchedulerError::NoFeasibleSolution(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SchedulerError::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            SchedulerError::invalid("bad").kind(),
            "invalid_parameters"
        );
        assert_eq!(
            SchedulerError::no_solution("none").kind(),
            "no_feasible_solution"
        );
        assert_eq!(
            SchedulerError::SolverUnavailable("engine".to_string()).kind(),
            "solver_unavailable"
        );
        assert_eq!(SchedulerError::internal("boom").kind(), "internal");
    }

    #[test]
    fn message_is_the_display_form() {
        assert_eq!(
            SchedulerError::no_solution("no feasible solution").to_string(),
            "no feasible solution"
        );
    }
}
