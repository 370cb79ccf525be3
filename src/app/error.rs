use thiserror::Error;

/// Caller-facing failures of the relationship graph and messaging services.
/// Every failure path surfaces a distinct kind; nothing here is fatal to the
/// process. Store errors are the only opaque variant and map to an internal
/// failure at the HTTP boundary.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("cannot target your own account")]
    SelfReference,
    #[error("already following this account")]
    AlreadyFollowing,
    #[error("not following this account")]
    NotFollowing,
    #[error("account is already blocked")]
    AlreadyBlocked,
    #[error("account is not blocked")]
    NotBlocked,
    #[error("interaction is not allowed between blocked accounts")]
    Blocked,
    #[error("{0}")]
    Privacy(&'static str),
    #[error("a pending follow request already exists")]
    DuplicateRequest,
    #[error("follow request has already been resolved")]
    InvalidState,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("handle is already taken")]
    HandleTaken,
    #[error("only the sender can edit a message")]
    NotOwner,
    #[error("only the recipient can mark a message as read")]
    NotRecipient,
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Unique-constraint violations that race past the in-transaction checks
    /// still surface as the right conflict kind.
    pub fn from_unique_violation(err: sqlx::Error, conflict: DomainError) -> DomainError {
        let is_unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
        if is_unique {
            conflict
        } else {
            DomainError::Store(err)
        }
    }
}
