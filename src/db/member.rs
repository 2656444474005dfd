use std::str::FromStr;

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct MemberStore {
    pool: SqlitePool,
}

/// Member role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown member role: {0}")]
pub struct UnknownRole(pub String);

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::User => "USER",
            MemberRole::Admin => "ADMIN",
        }
    }
}

impl FromStr for MemberRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(MemberRole::User),
            "ADMIN" => Ok(MemberRole::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A stored role that does not parse is a corrupt row, not a plain user.
fn decode_role(raw: &str) -> Result<MemberRole, sqlx::Error> {
    raw.parse().map_err(|e: UnknownRole| sqlx::Error::ColumnDecode {
        index: "role".into(),
        source: Box::new(e),
    })
}

#[derive(Debug, Clone)]
pub struct Member {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: MemberRole,
    pub email_verified: bool,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: i64,
    email: String,
    password_hash: String,
    role: String,
    email_verified: bool,
}

impl TryFrom<MemberRow> for Member {
    type Error = sqlx::Error;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            role: decode_role(&row.role)?,
            email_verified: row.email_verified,
        })
    }
}

/// Public member summary for the admin listing. Does not expose password hashes.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub id: i64,
    pub email: String,
    pub role: MemberRole,
    pub email_verified: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct MemberSummaryRow {
    id: i64,
    email: String,
    role: String,
    email_verified: bool,
    created_at: String,
}

impl TryFrom<MemberSummaryRow> for MemberSummary {
    type Error = sqlx::Error;

    fn try_from(row: MemberSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: row.email,
            role: decode_role(&row.role)?,
            email_verified: row.email_verified,
            created_at: row.created_at,
        })
    }
}

impl MemberStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a member whose email needs no confirmation. Returns the member ID.
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: MemberRole,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO members (email, password_hash, role, email_verified) VALUES (?, ?, ?, 1)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Create a member that must confirm `token` before `expires_at` (Unix
    /// milliseconds) to be able to log in. Returns the member ID.
    pub async fn create_unverified(
        &self,
        email: &str,
        password_hash: &str,
        role: MemberRole,
        token: &str,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO members (email, password_hash, role, email_verified, verification_token, verification_expires_at)
             VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(token)
        .bind(i64::try_from(expires_at).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Mark the member verified if `token` matches and has not expired at `now`.
    /// The token is consumed. Returns false if nothing matched.
    pub async fn confirm_email(&self, id: i64, token: &str, now: u64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE members
             SET email_verified = 1, verification_token = NULL, verification_expires_at = NULL
             WHERE id = ? AND email_verified = 0 AND verification_token = ? AND verification_expires_at > ?",
        )
        .bind(id)
        .bind(token)
        .bind(i64::try_from(now).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get a member by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Member>, sqlx::Error> {
        let row: Option<MemberRow> = sqlx::query_as(
            "SELECT id, email, password_hash, role, email_verified FROM members WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Member::try_from).transpose()
    }

    /// Get a member by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Member>, sqlx::Error> {
        let row: Option<MemberRow> = sqlx::query_as(
            "SELECT id, email, password_hash, role, email_verified FROM members WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Member::try_from).transpose()
    }

    /// Check whether an email is already registered.
    pub async fn exists_by_email(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM members WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Delete a member by ID. Their refresh token record goes with them.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM members WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all members, oldest first.
    pub async fn list(&self) -> Result<Vec<MemberSummary>, sqlx::Error> {
        let rows: Vec<MemberSummaryRow> = sqlx::query_as(
            "SELECT id, email, role, email_verified, created_at FROM members ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(MemberSummary::try_from).collect()
    }
}
