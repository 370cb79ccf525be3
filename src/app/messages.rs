use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use crate::app::accounts::account_from_row;
use crate::app::relationships;
use crate::app::{DomainError, DomainResult};
use crate::domain::account::Account;
use crate::domain::message::Message;
use crate::infra::db::Db;

/// Append-only message log plus the derived conversation views. A
/// conversation is the set of messages whose unordered `{sender, receiver}`
/// pair matches; no conversation entity is stored.
#[derive(Clone)]
pub struct MessageService {
    db: Db,
}

/// One inbox row: the latest message exchanged with a distinct partner.
#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub partner: Account,
    pub message: Message,
    pub unread_count: i64,
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> Message {
    Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        text: row.get("text"),
        is_read: row.get("is_read"),
        is_edited: row.get("is_edited"),
        conversation_code: row.get("conversation_code"),
        created_at: row.get("created_at"),
    }
}

impl MessageService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn send(
        &self,
        sender: Uuid,
        receiver: Uuid,
        text: &str,
        conversation_code: Option<&str>,
    ) -> DomainResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::Validation("message text must not be empty"));
        }
        if sender == receiver {
            return Err(DomainError::Validation("cannot message yourself"));
        }

        let mut tx = self.db.begin().await?;
        // Locking the pair serializes sends against a concurrent block.
        relationships::lock_pair(&mut tx, sender, receiver).await?;
        if relationships::pair_is_blocked(&mut tx, sender, receiver).await? {
            return Err(DomainError::Blocked);
        }

        let row = sqlx::query(
            "INSERT INTO messages (sender_id, receiver_id, text, conversation_code) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, sender_id, receiver_id, text, is_read, is_edited, \
                       conversation_code, created_at",
        )
        .bind(sender)
        .bind(receiver)
        .bind(text)
        .bind(conversation_code)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message_from_row(&row))
    }

    /// Top-1-per-group over the flat log: for every distinct partner the
    /// actor has exchanged messages with, the single most recent message
    /// (latest created_at, highest id on ties), newest conversation first.
    /// The group key is the canonicalized unordered pair, so a partner is
    /// never double counted across sender/receiver roles.
    pub async fn inbox(&self, actor: Uuid) -> DomainResult<Vec<InboxEntry>> {
        let rows = sqlx::query(
            "SELECT m.id AS message_id, m.sender_id, m.receiver_id, m.text, m.is_read, \
                    m.is_edited, m.conversation_code, m.created_at AS message_created_at, \
                    a.id, a.handle, a.display_name, a.bio, a.private, a.verified, a.created_at, \
                    (SELECT COUNT(*) FROM messages u \
                     WHERE u.receiver_id = $1 AND u.sender_id = a.id AND NOT u.is_read \
                    ) AS unread_count \
             FROM ( \
                 SELECT DISTINCT ON (LEAST(sender_id, receiver_id), GREATEST(sender_id, receiver_id)) * \
                 FROM messages \
                 WHERE sender_id = $1 OR receiver_id = $1 \
                 ORDER BY LEAST(sender_id, receiver_id), GREATEST(sender_id, receiver_id), \
                          created_at DESC, id DESC \
             ) m \
             JOIN accounts a \
               ON a.id = CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END \
             ORDER BY m.created_at DESC, m.id DESC",
        )
        .bind(actor)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| InboxEntry {
                partner: account_from_row(row),
                message: Message {
                    id: row.get("message_id"),
                    sender_id: row.get("sender_id"),
                    receiver_id: row.get("receiver_id"),
                    text: row.get("text"),
                    is_read: row.get("is_read"),
                    is_edited: row.get("is_edited"),
                    conversation_code: row.get("conversation_code"),
                    created_at: row.get("message_created_at"),
                },
                unread_count: row.get("unread_count"),
            })
            .collect())
    }

    /// Every message between the actor and one partner, oldest first.
    pub async fn thread(&self, actor: Uuid, partner: Uuid) -> DomainResult<Vec<Message>> {
        let partner_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
                .bind(partner)
                .fetch_one(self.db.pool())
                .await?;
        if !partner_exists {
            return Err(DomainError::NotFound("account"));
        }

        let rows = sqlx::query(
            "SELECT id, sender_id, receiver_id, text, is_read, is_edited, \
                    conversation_code, created_at \
             FROM messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1) \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(actor)
        .bind(partner)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    /// Only the original sender may edit; `created_at` is never touched.
    pub async fn edit(&self, actor: Uuid, message_id: i64, text: &str) -> DomainResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::Validation("message text must not be empty"));
        }

        let mut tx = self.db.begin().await?;

        let sender_id: Option<Uuid> =
            sqlx::query_scalar("SELECT sender_id FROM messages WHERE id = $1 FOR UPDATE")
                .bind(message_id)
                .fetch_optional(&mut *tx)
                .await?;
        let sender_id = sender_id.ok_or(DomainError::NotFound("message"))?;
        if sender_id != actor {
            return Err(DomainError::NotOwner);
        }

        let row = sqlx::query(
            "UPDATE messages SET text = $2, is_edited = true WHERE id = $1 \
             RETURNING id, sender_id, receiver_id, text, is_read, is_edited, \
                       conversation_code, created_at",
        )
        .bind(message_id)
        .bind(text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message_from_row(&row))
    }

    /// Only the recipient may mark a message read; idempotent after that.
    pub async fn mark_read(&self, actor: Uuid, message_id: i64) -> DomainResult<Message> {
        let mut tx = self.db.begin().await?;

        let receiver_id: Option<Uuid> =
            sqlx::query_scalar("SELECT receiver_id FROM messages WHERE id = $1 FOR UPDATE")
                .bind(message_id)
                .fetch_optional(&mut *tx)
                .await?;
        let receiver_id = receiver_id.ok_or(DomainError::NotFound("message"))?;
        if receiver_id != actor {
            return Err(DomainError::NotRecipient);
        }

        let row = sqlx::query(
            "UPDATE messages SET is_read = true WHERE id = $1 \
             RETURNING id, sender_id, receiver_id, text, is_read, is_edited, \
                       conversation_code, created_at",
        )
        .bind(message_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message_from_row(&row))
    }
}
