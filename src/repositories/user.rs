// src/repositories/user.rs - Data access
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::{NewUser, Session, User};

type Result<T> = std::result::Result<T, RepositoryError>;

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// Inserts a new account
    ///
    /// ### Errors
    /// * `RepositoryError::Conflict` - If the email is already registered
    /// * `RepositoryError::Database` - If a database error occurs
    async fn create(&self, user: &NewUser) -> Result<User>;

    /// Finds an account by its UUID
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Finds an account by its (already normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Updates name and/or email; `None` leaves a column unchanged
    ///
    /// ### Errors
    /// * `RepositoryError::NotFound` - If the account doesn't exist
    /// * `RepositoryError::Conflict` - If the new email is taken
    async fn update_profile(
        &self,
        id: &Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<User>;

    /// Replaces the password hash and revokes every session of the account in
    /// a single transaction
    ///
    /// ### Returns
    /// * `Result<u64>` - number of sessions revoked
    async fn update_password(&self, id: &Uuid, password_hash: &str) -> Result<u64>;

    async fn create_session(&self, session: &Session) -> Result<()>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>>;

    /// Deletes a session; deleting an unknown session is not an error
    async fn delete_session(&self, token_hash: &str) -> Result<bool>;

    /// Deletes every session that expired at or before `now`
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

// Implementation using actual database
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    // Helper method for transactions
    async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to start database transaction: {}", e);
            RepositoryError::Database(e)
        })
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn create(&self, user: &NewUser) -> Result<User> {
        let query = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                debug!("Failed to insert user: {}", e);
                RepositoryError::from(e)
            })
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: &Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<User> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(name) = name {
            query_builder.push(", name = ");
            query_builder.push_bind(name);
        }

        if let Some(email) = email {
            query_builder.push(", email = ");
            query_builder.push_bind(email);
        }

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(*id);
        query_builder.push(" RETURNING ");
        query_builder.push(USER_COLUMNS);

        query_builder
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", id)))
    }

    async fn update_password(&self, id: &Uuid, password_hash: &str) -> Result<u64> {
        let mut tx = self.begin_transaction().await?;

        let updated = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(RepositoryError::NotFound(format!("User {} not found", id)));
        }

        let revoked = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            RepositoryError::Database(e)
        })?;

        Ok(revoked)
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT token_hash, user_id, created_at, expires_at FROM sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
