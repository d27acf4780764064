//! Error types for the session store layer.

/// Errors a [`SessionStore`](crate::SessionStore) can report.
///
/// None of these mean "no session exists". A missing session is
/// `Ok(None)`, never an error. Keeping the two apart is what stops a
/// database hiccup from looking like a player with a bad credential.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Every pooled connection was busy for the whole acquire timeout.
    #[error("session store connection pool exhausted")]
    PoolExhausted,

    /// The backing service could not be reached: pool closed, network
    /// or TLS failure, authority down.
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    /// The backend answered, but with an error (bad SQL, schema drift,
    /// undecodable row, unexpected authority response).
    #[error("session store query failed: {0}")]
    Query(String),
}

impl StoreError {
    /// Returns `true` for failures that may clear up on their own
    /// (retrying later could succeed).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PoolExhausted | Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_pool_and_unavailable_are_transient() {
        assert!(StoreError::PoolExhausted.is_transient());
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(!StoreError::Query("syntax".into()).is_transient());
    }

    #[test]
    fn test_display_includes_cause() {
        let err = StoreError::Query("relation does not exist".into());
        assert!(err.to_string().contains("relation does not exist"));
    }
}
