use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

pub use crate::auth::repo_types::{NewUser, PublicUser, User};

/// Postgres error code for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
const EMAIL_CONSTRAINT: &str = "uq_users_email";
/// Advisory lock key serialising first-admin inserts.
const FIRST_ADMIN_LOCK: i64 = 0x5350_4144_4d49_4e31;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable user records.
///
/// Token redemption methods are single conditional updates: when two callers
/// race on the same token, exactly one of them gets the row back.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Inserts a user. A clash on the email constraint yields `DuplicateEmail`.
    async fn create(&self, new: NewUser<'_>) -> Result<User, StoreError>;

    /// Inserts an admin only while no admin row exists, serialised against
    /// other first-admin inserts.
    /// `None` means another admin was already present.
    async fn create_first_admin(&self, new: NewUser<'_>) -> Result<Option<User>, StoreError>;

    /// Marks the owner of `token` verified and clears the token.
    async fn consume_verification_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Replaces the pending verification token of an unverified user.
    /// Returns `false` when the user is gone or already verified.
    async fn replace_verification_token(&self, id: Uuid, token: &str)
        -> Result<bool, StoreError>;

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Stores `password_hash` for the owner of a reset token still valid at
    /// `now`, clearing the token and its expiry.
    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;

    async fn count_admins(&self) -> Result<i64, StoreError>;

    /// Force-verifies an existing account, dropping any pending verification token.
    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn classify_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
            && db_err.constraint() == Some(EMAIL_CONSTRAINT)
        {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_admin, is_email_verified,
                   verification_token, reset_token, reset_token_expiry, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_admin, is_email_verified,
                   verification_token, reset_token, reset_token_expiry, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser<'_>) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, is_admin, is_email_verified, verification_token)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, password_hash, is_admin, is_email_verified,
                      verification_token, reset_token, reset_token_expiry, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.role.is_admin())
        .bind(new.is_email_verified)
        .bind(new.verification_token)
        .fetch_one(&self.db)
        .await
        .map_err(classify_insert_error)
    }

    async fn create_first_admin(&self, new: NewUser<'_>) -> Result<Option<User>, StoreError> {
        let mut tx = self.db.begin().await?;
        // Under READ COMMITTED two inserts could both see no admin without this.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(FIRST_ADMIN_LOCK)
            .execute(&mut *tx)
            .await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, is_admin, is_email_verified, verification_token)
            SELECT $1, $2, $3, TRUE, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM users WHERE is_admin)
            RETURNING id, email, password_hash, is_admin, is_email_verified,
                      verification_token, reset_token, reset_token_expiry, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.is_email_verified)
        .bind(new.verification_token)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_insert_error)?;

        tx.commit().await?;
        Ok(user)
    }

    async fn consume_verification_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET is_email_verified = TRUE, verification_token = NULL
             WHERE verification_token = $1
            RETURNING id, email, password_hash, is_admin, is_email_verified,
                      verification_token, reset_token, reset_token_expiry, created_at
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn replace_verification_token(
        &self,
        id: Uuid,
        token: &str,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET verification_token = $2
             WHERE id = $1 AND is_email_verified = FALSE
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token = $2, reset_token_expiry = $3
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET password_hash = $2, reset_token = NULL, reset_token_expiry = NULL
             WHERE reset_token = $1 AND reset_token_expiry > $3
            RETURNING id, email, password_hash, is_admin, is_email_verified,
                      verification_token, reset_token, reset_token_expiry, created_at
            "#,
        )
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn count_admins(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM users WHERE is_admin"#)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET is_email_verified = TRUE, verification_token = NULL
             WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
