use serde::Serialize;
use sqlx::{Postgres, Row, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::accounts::account_from_row;
use crate::app::{DomainError, DomainResult};
use crate::domain::account::Account;
use crate::domain::relationship::RequestStatus;
use crate::infra::db::Db;

/// Enforces the invariants of the relationship store: follow edges, block
/// sets, and the follow-request state machine.
#[derive(Clone)]
pub struct RelationshipService {
    db: Db,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipEdge {
    pub account: Account,
    #[serde(with = "time::serde::rfc3339")]
    pub followed_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedEntry {
    pub account: Account,
    #[serde(with = "time::serde::rfc3339")]
    pub blocked_at: OffsetDateTime,
}

/// A pending follow request as seen from either end; `account` is the
/// counterparty (the requester for received, the target for sent).
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequest {
    pub account: Account,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    Accept,
    Decline,
}

/// Locks both accounts' rows in ascending-id order, serializing every
/// mutation on the pair and making concurrent follow/block resolve to one
/// of the two valid end states. Errors if either account does not exist.
pub(crate) async fn lock_pair(
    tx: &mut Transaction<'static, Postgres>,
    a: Uuid,
    b: Uuid,
) -> DomainResult<()> {
    let locked: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM accounts WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(vec![a, b])
            .fetch_all(&mut **tx)
            .await?;

    if locked.len() != 2 {
        return Err(DomainError::NotFound("account"));
    }
    Ok(())
}

pub(crate) async fn pair_is_blocked(
    tx: &mut Transaction<'static, Postgres>,
    a: Uuid,
    b: Uuid,
) -> DomainResult<bool> {
    let blocked: bool = sqlx::query_scalar(
        "SELECT EXISTS ( \
             SELECT 1 FROM blocks \
             WHERE (blocker_id = $1 AND blocked_id = $2) \
                OR (blocker_id = $2 AND blocked_id = $1) \
         )",
    )
    .bind(a)
    .bind(b)
    .fetch_one(&mut **tx)
    .await?;

    Ok(blocked)
}

async fn edge_exists(
    tx: &mut Transaction<'static, Postgres>,
    follower_id: Uuid,
    followee_id: Uuid,
) -> DomainResult<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
    )
    .bind(follower_id)
    .bind(followee_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(exists)
}

impl RelationshipService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn follow(&self, actor: Uuid, target: Uuid) -> DomainResult<()> {
        if actor == target {
            return Err(DomainError::SelfReference);
        }

        let mut tx = self.db.begin().await?;
        lock_pair(&mut tx, actor, target).await?;

        if pair_is_blocked(&mut tx, actor, target).await? {
            return Err(DomainError::Blocked);
        }
        if edge_exists(&mut tx, actor, target).await? {
            return Err(DomainError::AlreadyFollowing);
        }

        let private: bool = sqlx::query_scalar("SELECT private FROM accounts WHERE id = $1")
            .bind(target)
            .fetch_one(&mut *tx)
            .await?;
        if private {
            return Err(DomainError::Privacy(
                "account is private; send a follow request instead",
            ));
        }

        sqlx::query("INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2)")
            .bind(actor)
            .bind(target)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                DomainError::from_unique_violation(err, DomainError::AlreadyFollowing)
            })?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn unfollow(&self, actor: Uuid, target: Uuid) -> DomainResult<()> {
        if actor == target {
            return Err(DomainError::SelfReference);
        }

        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(actor)
            .bind(target)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFollowing);
        }
        Ok(())
    }

    /// Deletes the edge in the opposite direction: `follower` no longer
    /// follows the actor.
    pub async fn remove_follower(&self, actor: Uuid, follower: Uuid) -> DomainResult<()> {
        if actor == follower {
            return Err(DomainError::SelfReference);
        }

        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower)
            .bind(actor)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFollowing);
        }
        Ok(())
    }

    /// Severs both follow edges, cancels any pending request between the
    /// pair, and records the block, as one atomic unit. A partially applied
    /// block would leave a blocked pair still connected.
    pub async fn block(&self, actor: Uuid, target: Uuid) -> DomainResult<()> {
        if actor == target {
            return Err(DomainError::SelfReference);
        }

        let mut tx = self.db.begin().await?;
        lock_pair(&mut tx, actor, target).await?;

        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM blocks WHERE blocker_id = $1 AND blocked_id = $2)",
        )
        .bind(actor)
        .bind(target)
        .fetch_one(&mut *tx)
        .await?;
        if already {
            return Err(DomainError::AlreadyBlocked);
        }

        sqlx::query(
            "DELETE FROM follows \
             WHERE (follower_id = $1 AND followee_id = $2) \
                OR (follower_id = $2 AND followee_id = $1)",
        )
        .bind(actor)
        .bind(target)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE follow_requests \
             SET status = 'CANCELLED', decided_at = NOW() \
             WHERE status = 'PENDING' \
               AND ((requester_id = $1 AND target_id = $2) \
                 OR (requester_id = $2 AND target_id = $1))",
        )
        .bind(actor)
        .bind(target)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO blocks (blocker_id, blocked_id) VALUES ($1, $2)")
            .bind(actor)
            .bind(target)
            .execute(&mut *tx)
            .await
            .map_err(|err| DomainError::from_unique_violation(err, DomainError::AlreadyBlocked))?;

        tx.commit().await?;
        Ok(())
    }

    /// Removes the block only. Previously severed follow edges stay gone.
    pub async fn unblock(&self, actor: Uuid, target: Uuid) -> DomainResult<()> {
        if actor == target {
            return Err(DomainError::SelfReference);
        }

        let result = sqlx::query("DELETE FROM blocks WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(actor)
            .bind(target)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotBlocked);
        }
        Ok(())
    }

    pub async fn send_follow_request(&self, actor: Uuid, target: Uuid) -> DomainResult<()> {
        if actor == target {
            return Err(DomainError::SelfReference);
        }

        let mut tx = self.db.begin().await?;
        lock_pair(&mut tx, actor, target).await?;

        if pair_is_blocked(&mut tx, actor, target).await? {
            return Err(DomainError::Blocked);
        }
        if edge_exists(&mut tx, actor, target).await? {
            return Err(DomainError::AlreadyFollowing);
        }

        let private: bool = sqlx::query_scalar("SELECT private FROM accounts WHERE id = $1")
            .bind(target)
            .fetch_one(&mut *tx)
            .await?;
        if !private {
            return Err(DomainError::Privacy(
                "only private accounts accept follow requests",
            ));
        }

        let pending: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM follow_requests \
                 WHERE requester_id = $1 AND target_id = $2 AND status = 'PENDING' \
             )",
        )
        .bind(actor)
        .bind(target)
        .fetch_one(&mut *tx)
        .await?;
        if pending {
            return Err(DomainError::DuplicateRequest);
        }

        sqlx::query("INSERT INTO follow_requests (requester_id, target_id) VALUES ($1, $2)")
            .bind(actor)
            .bind(target)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                DomainError::from_unique_violation(err, DomainError::DuplicateRequest)
            })?;

        tx.commit().await?;
        Ok(())
    }

    /// Resolves the pending request `(requester, actor)`. Accepting also
    /// creates the follow edge in the same transaction. ACCEPTED, DECLINED
    /// and CANCELLED are terminal; responding to a resolved request fails.
    pub async fn respond_follow_request(
        &self,
        actor: Uuid,
        requester: Uuid,
        decision: RequestDecision,
    ) -> DomainResult<()> {
        if actor == requester {
            return Err(DomainError::SelfReference);
        }

        let mut tx = self.db.begin().await?;
        lock_pair(&mut tx, actor, requester).await?;

        let row = sqlx::query(
            "SELECT id, status FROM follow_requests \
             WHERE requester_id = $1 AND target_id = $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1",
        )
        .bind(requester)
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await?;

        let row = row.ok_or(DomainError::NotFound("follow request"))?;
        let request_id: Uuid = row.get("id");
        let status: String = row.get("status");
        let status =
            RequestStatus::parse(&status).ok_or(DomainError::NotFound("follow request"))?;
        if status.is_terminal() {
            return Err(DomainError::InvalidState);
        }

        let new_status = match decision {
            RequestDecision::Accept => RequestStatus::Accepted,
            RequestDecision::Decline => RequestStatus::Declined,
        };
        sqlx::query("UPDATE follow_requests SET status = $2, decided_at = NOW() WHERE id = $1")
            .bind(request_id)
            .bind(new_status.as_str())
            .execute(&mut *tx)
            .await?;

        if decision == RequestDecision::Accept {
            sqlx::query(
                "INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(requester)
            .bind(actor)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// The requester withdraws a request they sent, before a decision.
    pub async fn cancel_follow_request(&self, actor: Uuid, target: Uuid) -> DomainResult<()> {
        if actor == target {
            return Err(DomainError::SelfReference);
        }

        let mut tx = self.db.begin().await?;
        lock_pair(&mut tx, actor, target).await?;

        let result = sqlx::query(
            "UPDATE follow_requests \
             SET status = 'CANCELLED', decided_at = NOW() \
             WHERE requester_id = $1 AND target_id = $2 AND status = 'PENDING'",
        )
        .bind(actor)
        .bind(target)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound("follow request"));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_followers(
        &self,
        account_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> DomainResult<Vec<RelationshipEdge>> {
        let rows = match cursor {
            Some((created_at, follower_id)) => {
                sqlx::query(
                    "SELECT a.id, a.handle, a.display_name, a.bio, a.private, a.verified, \
                            a.created_at, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN accounts a ON a.id = f.follower_id \
                     WHERE f.followee_id = $1 \
                       AND (f.created_at < $2 OR (f.created_at = $2 AND f.follower_id < $3)) \
                     ORDER BY f.created_at DESC, f.follower_id DESC \
                     LIMIT $4",
                )
                .bind(account_id)
                .bind(created_at)
                .bind(follower_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT a.id, a.handle, a.display_name, a.bio, a.private, a.verified, \
                            a.created_at, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN accounts a ON a.id = f.follower_id \
                     WHERE f.followee_id = $1 \
                     ORDER BY f.created_at DESC, f.follower_id DESC \
                     LIMIT $2",
                )
                .bind(account_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows
            .iter()
            .map(|row| RelationshipEdge {
                account: account_from_row(row),
                followed_at: row.get("followed_at"),
            })
            .collect())
    }

    pub async fn list_following(
        &self,
        account_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> DomainResult<Vec<RelationshipEdge>> {
        let rows = match cursor {
            Some((created_at, followee_id)) => {
                sqlx::query(
                    "SELECT a.id, a.handle, a.display_name, a.bio, a.private, a.verified, \
                            a.created_at, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN accounts a ON a.id = f.followee_id \
                     WHERE f.follower_id = $1 \
                       AND (f.created_at < $2 OR (f.created_at = $2 AND f.followee_id < $3)) \
                     ORDER BY f.created_at DESC, f.followee_id DESC \
                     LIMIT $4",
                )
                .bind(account_id)
                .bind(created_at)
                .bind(followee_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT a.id, a.handle, a.display_name, a.bio, a.private, a.verified, \
                            a.created_at, f.created_at AS followed_at \
                     FROM follows f \
                     JOIN accounts a ON a.id = f.followee_id \
                     WHERE f.follower_id = $1 \
                     ORDER BY f.created_at DESC, f.followee_id DESC \
                     LIMIT $2",
                )
                .bind(account_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows
            .iter()
            .map(|row| RelationshipEdge {
                account: account_from_row(row),
                followed_at: row.get("followed_at"),
            })
            .collect())
    }

    pub async fn list_blocked(&self, account_id: Uuid) -> DomainResult<Vec<BlockedEntry>> {
        let rows = sqlx::query(
            "SELECT a.id, a.handle, a.display_name, a.bio, a.private, a.verified, \
                    a.created_at, b.created_at AS blocked_at \
             FROM blocks b \
             JOIN accounts a ON a.id = b.blocked_id \
             WHERE b.blocker_id = $1 \
             ORDER BY b.created_at DESC, b.blocked_id DESC",
        )
        .bind(account_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| BlockedEntry {
                account: account_from_row(row),
                blocked_at: row.get("blocked_at"),
            })
            .collect())
    }

    pub async fn list_pending_received(
        &self,
        account_id: Uuid,
    ) -> DomainResult<Vec<PendingRequest>> {
        let rows = sqlx::query(
            "SELECT a.id, a.handle, a.display_name, a.bio, a.private, a.verified, \
                    a.created_at, r.created_at AS requested_at \
             FROM follow_requests r \
             JOIN accounts a ON a.id = r.requester_id \
             WHERE r.target_id = $1 AND r.status = 'PENDING' \
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .bind(account_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| PendingRequest {
                account: account_from_row(row),
                requested_at: row.get("requested_at"),
            })
            .collect())
    }

    pub async fn list_pending_sent(&self, account_id: Uuid) -> DomainResult<Vec<PendingRequest>> {
        let rows = sqlx::query(
            "SELECT a.id, a.handle, a.display_name, a.bio, a.private, a.verified, \
                    a.created_at, r.created_at AS requested_at \
             FROM follow_requests r \
             JOIN accounts a ON a.id = r.target_id \
             WHERE r.requester_id = $1 AND r.status = 'PENDING' \
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .bind(account_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| PendingRequest {
                account: account_from_row(row),
                requested_at: row.get("requested_at"),
            })
            .collect())
    }
}
