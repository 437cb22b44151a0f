/// Broad classification of a failure reported by the database.
///
/// The kind is informational. The harness treats every [DbError] as a recoverable data error when
/// it escapes a scenario iteration, the same way a benchmark counts SQL failures without stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorKind {
    /// Two transactions waited on each other and one was chosen as the victim.
    Deadlock,
    /// A lock could not be acquired within the store's busy timeout.
    LockTimeout,
    /// A unique, primary key or foreign key constraint rejected the write.
    ConstraintViolation,
    /// The connection could not be established or was lost.
    Connectivity,
    /// The statement itself was rejected, e.g. a syntax error or a missing table.
    Statement,
    Other,
}

/// An error raised by a [crate::prelude::Connection].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?} database error: {message}")]
pub struct DbError {
    kind: DbErrorKind,
    message: String,
}

impl DbError {
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::Connectivity, message)
    }

    pub fn statement(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::Statement, message)
    }

    pub fn kind(&self) -> DbErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Check whether an error returned by a scenario hook is a recoverable data error.
///
/// An error is recoverable when a [DbError] appears anywhere in its chain, so that scenarios can
/// wrap database failures with context without changing how the failure is counted.
pub fn is_recoverable(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<DbError>() {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, thiserror::Error)]
    #[error("wrapped")]
    struct Wrapper(#[source] DbError);

    #[derive(Debug, thiserror::Error)]
    #[error("unrelated")]
    struct Unrelated;

    #[test]
    fn db_error_is_recoverable() {
        let err = DbError::new(DbErrorKind::Deadlock, "victim");
        assert!(is_recoverable(&err));
    }

    #[test]
    fn wrapped_db_error_is_recoverable() {
        let err = Wrapper(DbError::statement("no such table"));
        assert!(is_recoverable(&err));
    }

    #[test]
    fn other_errors_are_not_recoverable() {
        assert!(!is_recoverable(&Unrelated));
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = DbError::new(DbErrorKind::LockTimeout, "database is locked");
        assert_eq!("LockTimeout database error: database is locked", err.to_string());
    }
}
