//! Favorite store error types.

/// Errors from reading or writing the persisted favorites snapshot.
///
/// Cloneable so the last failure can ride along in published snapshots.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    /// Reading or writing the backing file failed
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// The snapshot could not be encoded
    #[error("failed to serialize favorites: {message}")]
    Serialize { message: String },

    /// The stored snapshot could not be decoded
    #[error("corrupt favorites snapshot: {message}")]
    Corrupt { message: String },

    /// The backend refused the write
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },
}

/// Errors returned by favorite store mutations.
///
/// A failed save does not roll back the in-memory change; the mutation is
/// kept, published and reported through this error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("favorites changed but could not be saved: {0}")]
    Persist(#[from] PersistError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PersistError::Io {
            path: "/data/favorites.json".into(),
            message: "permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "I/O error on /data/favorites.json: permission denied"
        );

        let err = StoreError::from(PersistError::Unavailable {
            message: "disk full".into(),
        });
        assert!(err.to_string().contains("could not be saved"));
        assert!(err.to_string().contains("disk full"));
    }
}
