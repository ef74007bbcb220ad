#[derive(Debug)]
pub enum SyncError {
    /// The durable store could not be reached or rejected a statement.
    Storage(sqlx::Error),
    /// Wiring defect, e.g. no processor registered for an action type.
    Configuration(String),
    /// A stored row could not be decoded.
    Corrupt(String),
    Internal(String),
}

impl SyncError {
    /// Store faults that are likely to clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Storage(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Storage(err) => write!(f, "Storage Error: {err}"),
            SyncError::Configuration(msg) => write!(f, "Configuration Error: {msg}"),
            SyncError::Corrupt(msg) => write!(f, "Corrupt Record: {msg}"),
            SyncError::Internal(msg) => write!(f, "Internal Error: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Storage(err)
    }
}
