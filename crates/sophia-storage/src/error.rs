// Storage errors callers need to tell apart from generic failures

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A unique constraint rejected the write
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Whether `err` was caused by a unique constraint, on either backend.
pub fn is_conflict(err: &anyhow::Error) -> bool {
    if matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::Conflict(_))
    ) {
        return true;
    }
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_detection() {
        let conflict = anyhow::Error::new(StorageError::Conflict("email".to_string()));
        assert!(is_conflict(&conflict));
        assert_eq!(conflict.to_string(), "conflict: email");

        assert!(!is_conflict(&anyhow::anyhow!("connection reset")));
        assert!(!is_conflict(&anyhow::Error::new(sqlx::Error::RowNotFound)));
    }
}
