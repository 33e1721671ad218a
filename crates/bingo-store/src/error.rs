/// Errors returned by a [`StateStore`](crate::StateStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    /// The backend was reached but rejected or failed the operation.
    #[error("state store error: {0}")]
    Backend(String),
}
