use legacy_cache::CacheError;
use legacy_db::DbError;
use thiserror::Error;

/// Failures returned to whoever invoked a command. The display text is meant
/// to be shown to that player as is.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The request was rejected; nothing changed.
    #[error("{0}")]
    Invalid(String),

    /// The request was valid but the server could not carry it out.
    #[error("Something went wrong: {0}")]
    Failed(String),

    /// The command surface is shutting down.
    #[error("The server is shutting down")]
    Closed,
}

impl CommandError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<DbError> for CommandError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::StaleWrite(message) => Self::Invalid(message),
            err if err.is_validation() => Self::Invalid(err.to_string()),
            DbError::Closed => Self::Closed,
            err => Self::Failed(err.to_string()),
        }
    }
}

impl From<CacheError> for CommandError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Db(err) => err.into(),
            err => Self::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_preconditions_read_as_plain_messages() {
        let err: CommandError = DbError::stale("A nation named Rome already exists").into();
        assert!(matches!(err, CommandError::Invalid(_)));
        assert_eq!(err.to_string(), "A nation named Rome already exists");
    }

    #[test]
    fn store_failures_are_not_validation_errors() {
        let err: CommandError = DbError::Closed.into();
        assert!(matches!(err, CommandError::Closed));

        let err: CommandError = CacheError::NotLoaded("NationCache".to_string()).into();
        assert!(matches!(err, CommandError::Failed(_)));
        assert_eq!(err.to_string(), "Something went wrong: NationCache has not been loaded");
    }
}
