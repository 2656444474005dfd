//! Refresh token storage: one active record per member.
//!
//! Access tokens are stateless and never stored. Every successful reissue
//! overwrites the member's record in place, so a superseded refresh token is
//! simply no longer found.

use sqlx::sqlite::SqlitePool;

/// The active refresh token of a member.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshRecord {
    pub member_id: i64,
    pub token: String,
    /// Expiration (Unix milliseconds)
    pub expires_at: i64,
}

impl RefreshRecord {
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at <= to_sql_millis(now)
    }
}

/// Store for the per-member refresh token record.
#[derive(Clone)]
pub struct RefreshStore {
    pool: SqlitePool,
}

impl RefreshStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the member's record, or insert it if none exists.
    pub async fn upsert(
        &self,
        member_id: i64,
        token: &str,
        expires_at: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (member_id, token, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(member_id) DO UPDATE SET token = excluded.token, expires_at = excluded.expires_at",
        )
        .bind(member_id)
        .bind(token)
        .bind(to_sql_millis(expires_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Swap `current` for `new` only if `current` is still the member's active token.
    /// Returns false if someone else rotated or replaced it first.
    pub async fn rotate(
        &self,
        member_id: i64,
        current: &str,
        new: &str,
        expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET token = ?, expires_at = ? WHERE member_id = ? AND token = ?",
        )
        .bind(new)
        .bind(to_sql_millis(expires_at))
        .bind(member_id)
        .bind(current)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_principal(
        &self,
        member_id: i64,
    ) -> Result<Option<RefreshRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT member_id, token, expires_at FROM refresh_tokens WHERE member_id = ?",
        )
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Locate the record holding exactly this token string.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<RefreshRecord>, sqlx::Error> {
        sqlx::query_as("SELECT member_id, token, expires_at FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
    }

    /// Delete the member's record (logout, expiry).
    pub async fn delete(&self, member_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE member_id = ?")
            .bind(member_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete the member's record only while it still holds `token`.
    /// A record replaced by a newer login or reissue is left alone.
    pub async fn delete_token(&self, member_id: i64, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE member_id = ? AND token = ?")
            .bind(member_id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all records that have expired as of `now` (Unix milliseconds).
    pub async fn delete_expired(&self, now: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(to_sql_millis(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

/// SQLite integers are signed; clamp instead of wrapping.
fn to_sql_millis(millis: u64) -> i64 {
    i64::try_from(millis).unwrap_or(i64::MAX)
}
