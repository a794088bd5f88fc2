//! Load state of asynchronous view data.

use crate::api::ApiError;

/// Exactly one of these holds for every piece of data a view fetches.
/// A failed load is never shown as an empty success.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState<T> {
    #[default]
    Idle,
    Loading,
    Loaded(T),
    Failed(ApiError),
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            LoadState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the UI should offer a retry.
    pub fn can_retry(&self) -> bool {
        self.error().is_some_and(ApiError::is_retryable)
    }

    pub fn from_result(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(value) => LoadState::Loaded(value),
            Err(e) => LoadState::Failed(e),
        }
    }
}
