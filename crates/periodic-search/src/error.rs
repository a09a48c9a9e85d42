//! Search Error Types

use thiserror::Error;

/// Errors arming a search budget
#[derive(Debug, Error)]
pub enum BudgetError {
    /// Only one signal-driven budget may be armed per process
    #[error("A search alarm is already armed in this process")]
    AlreadyArmed,

    /// The OS refused to install the handler or timer
    #[error("Failed to arm search alarm: {0}")]
    Os(#[from] std::io::Error),

    /// Signal-driven budgets need a unix target
    #[error("Signal-driven budgets are not supported on this platform")]
    Unsupported,
}
