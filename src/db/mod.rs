mod member;
mod refresh_token;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

pub use member::{Member, MemberRole, MemberStore, MemberSummary, UnknownRole};
pub use refresh_token::{RefreshRecord, RefreshStore};

/// Schema steps in order. Entry `n` brings the schema to version `n + 1`.
const MIGRATIONS: &[&[&str]] = &[
    &[
        "CREATE TABLE members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT UNIQUE NOT NULL COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'USER',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        // One row per member: the primary key is what keeps a single active refresh token
        "CREATE TABLE refresh_tokens (
            member_id INTEGER PRIMARY KEY REFERENCES members(id) ON DELETE CASCADE,
            token TEXT UNIQUE NOT NULL,
            expires_at INTEGER NOT NULL
        )",
        "CREATE INDEX idx_refresh_tokens_expires_at ON refresh_tokens(expires_at)",
    ],
    &[
        "ALTER TABLE members ADD COLUMN email_verified INTEGER NOT NULL DEFAULT 0",
        "ALTER TABLE members ADD COLUMN verification_token TEXT",
        "ALTER TABLE members ADD COLUMN verification_expires_at INTEGER",
        // Accounts created before verification existed stay usable
        "UPDATE members SET email_verified = 1",
    ],
];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database file at `path`, creating it if needed, and bring the
    /// schema up to date. `":memory:"` gives a private in-memory database
    /// shared by every connection of the pool.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let options = match path {
            ":memory:" => SqliteConnectOptions::from_str("sqlite::memory:")?,
            _ => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        }
        .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.apply_migrations().await?;
        Ok(db)
    }

    /// Latest schema version this build knows about.
    pub fn schema_version() -> i64 {
        MIGRATIONS.len() as i64
    }

    /// Apply every step newer than the recorded version in one transaction.
    /// Each applied version is recorded as its own row.
    async fn apply_migrations(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&mut *tx)
            .await?;
        let applied: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&mut *tx)
            .await?;

        for (version, steps) in (1i64..).zip(MIGRATIONS.iter()) {
            if version <= applied {
                continue;
            }
            for step in steps.iter() {
                sqlx::query(*step).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            info!(version, "Applied schema migration");
        }

        tx.commit().await
    }

    /// Get the member store.
    pub fn members(&self) -> MemberStore {
        MemberStore::new(self.pool.clone())
    }

    /// Get the refresh token store.
    pub fn refresh_tokens(&self) -> RefreshStore {
        RefreshStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_recorded_once() {
        let db = Database::open(":memory:").await.unwrap();
        db.apply_migrations().await.unwrap();

        let versions: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert_eq!(versions, (1..=Database::schema_version()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_memory_database_shared_across_connections() {
        let db = Database::open(":memory:").await.unwrap();
        db.members()
            .create("alice@example.com", "hash", MemberRole::User)
            .await
            .unwrap();

        // Hold one connection so the lookup below runs on another
        let _held = db.pool().acquire().await.unwrap();
        assert!(db.members().exists_by_email("alice@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_and_get_member() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .members()
            .create("alice@example.com", "hash", MemberRole::User)
            .await
            .unwrap();

        let member = db
            .members()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.id, id);
        assert_eq!(member.email, "alice@example.com");
        assert_eq!(member.password_hash, "hash");
        assert_eq!(member.role, MemberRole::User);

        let member = db.members().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(member.id, id);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let db = Database::open(":memory:").await.unwrap();

        db.members()
            .create("Alice@Example.com", "hash", MemberRole::User)
            .await
            .unwrap();

        assert!(
            db.members()
                .get_by_email("alice@example.com")
                .await
                .unwrap()
                .is_some()
        );
        assert!(db.members().exists_by_email("ALICE@EXAMPLE.COM").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.members()
            .create("alice@example.com", "hash", MemberRole::User)
            .await
            .unwrap();
        let result = db
            .members()
            .create("alice@example.com", "hash", MemberRole::User)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_admin_role_persisted() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .members()
            .create("admin@example.com", "hash", MemberRole::Admin)
            .await
            .unwrap();

        let member = db.members().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(member.role, MemberRole::Admin);

        let listed = db.members().list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].role, MemberRole::Admin);
    }

    #[tokio::test]
    async fn test_delete_member() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .members()
            .create("alice@example.com", "hash", MemberRole::User)
            .await
            .unwrap();
        db.members().delete(id).await.unwrap();

        assert!(db.members().get_by_id(id).await.unwrap().is_none());
    }
}
