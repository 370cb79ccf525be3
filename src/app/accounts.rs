use sqlx::Row;
use uuid::Uuid;

use crate::app::{DomainError, DomainResult};
use crate::domain::account::Account;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct AccountService {
    db: Db,
}

impl AccountService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Registers a new account. Any dependent setup runs here, in the same
    /// transaction, rather than behind an implicit post-save broadcast.
    pub async fn register(
        &self,
        handle: &str,
        display_name: &str,
        bio: Option<&str>,
    ) -> DomainResult<Account> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(DomainError::Validation("handle must not be empty"));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(DomainError::Validation("display name must not be empty"));
        }

        let row = sqlx::query(
            "INSERT INTO accounts (handle, display_name, bio) \
             VALUES ($1, $2, $3) \
             RETURNING id, handle, display_name, bio, private, verified, created_at",
        )
        .bind(handle)
        .bind(display_name)
        .bind(bio)
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| DomainError::from_unique_violation(err, DomainError::HandleTaken))?;

        Ok(account_from_row(&row))
    }

    pub async fn get(&self, account_id: Uuid) -> DomainResult<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, handle, display_name, bio, private, verified, created_at \
             FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| account_from_row(&row)))
    }

    pub async fn lookup_handle(&self, handle: &str) -> DomainResult<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, handle, display_name, bio, private, verified, created_at \
             FROM accounts WHERE handle = $1",
        )
        .bind(handle)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| account_from_row(&row)))
    }

    /// Sets the privacy flag to an explicit value. An explicit bool rather
    /// than a toggle: concurrent toggles do not commute.
    pub async fn set_privacy(&self, account_id: Uuid, private: bool) -> DomainResult<Account> {
        let row = sqlx::query(
            "UPDATE accounts SET private = $2 WHERE id = $1 \
             RETURNING id, handle, display_name, bio, private, verified, created_at",
        )
        .bind(account_id)
        .bind(private)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| account_from_row(&row))
            .ok_or(DomainError::NotFound("account"))
    }
}

pub(crate) fn account_from_row(row: &sqlx::postgres::PgRow) -> Account {
    Account {
        id: row.get("id"),
        handle: row.get("handle"),
        display_name: row.get("display_name"),
        bio: row.get("bio"),
        private: row.get("private"),
        verified: row.get("verified"),
        created_at: row.get("created_at"),
    }
}
