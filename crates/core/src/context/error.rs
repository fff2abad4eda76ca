use thiserror::Error;

/// Misuse of the ambient request context.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    /// Request state was read or written with no request scope active.
    #[error("no request scope is active on this task")]
    NoActiveScope,
}
