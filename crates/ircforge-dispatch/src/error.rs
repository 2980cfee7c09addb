//! Error types for the dispatch layer.

/// Errors raised while building a [`Registry`](crate::Registry).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A handler with this name is already registered.
    #[error("handler {0:?} is already registered")]
    Duplicate(String),
}
