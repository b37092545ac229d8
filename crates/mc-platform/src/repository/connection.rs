use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::domain::MailchimpConnection;
use crate::error::{PlatformError, Result};

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Insert, or replace the existing record for the same user
    async fn upsert(&self, connection: &MailchimpConnection) -> Result<MailchimpConnection>;

    async fn find_by_user(&self, user_id: &str) -> Result<Option<MailchimpConnection>>;

    async fn find_active_by_user(&self, user_id: &str) -> Result<Option<MailchimpConnection>>;

    async fn touch_validated(&self, user_id: &str) -> Result<()>;

    async fn deactivate(&self, user_id: &str) -> Result<()>;

    /// Returns whether a record was removed
    async fn delete_by_user(&self, user_id: &str) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

pub struct SqliteConnectionRepository {
    pool: SqlitePool,
}

impl SqliteConnectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mailchimp_connections (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL UNIQUE,
                access_token_encrypted TEXT NOT NULL,
                server_prefix TEXT NOT NULL,
                account_id TEXT NOT NULL,
                account_name TEXT NOT NULL,
                login_email TEXT,
                api_endpoint TEXT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                last_validated_at BIGINT,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_mailchimp_connections_account ON mailchimp_connections(account_id)",
        )
        .execute(&self.pool)
        .await?;

        info!("Connection store schema ready");
        Ok(())
    }

    async fn find_where(&self, user_id: &str, active_only: bool) -> Result<Option<MailchimpConnection>> {
        let sql = if active_only {
            "SELECT * FROM mailchimp_connections WHERE user_id = $1 AND is_active = TRUE"
        } else {
            "SELECT * FROM mailchimp_connections WHERE user_id = $1"
        };
        let row = sqlx::query(sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_connection(&r)).transpose()
    }
}

fn millis_to_datetime(column: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| PlatformError::internal(format!("Invalid timestamp in {}", column)))
}

fn row_to_connection(row: &SqliteRow) -> Result<MailchimpConnection> {
    let last_validated_at = row
        .get::<Option<i64>, _>("last_validated_at")
        .map(|ms| millis_to_datetime("last_validated_at", ms))
        .transpose()?;

    Ok(MailchimpConnection {
        id: row.get("id"),
        user_id: row.get("user_id"),
        access_token_encrypted: row.get("access_token_encrypted"),
        server_prefix: row.get("server_prefix"),
        account_id: row.get("account_id"),
        account_name: row.get("account_name"),
        login_email: row.get("login_email"),
        api_endpoint: row.get("api_endpoint"),
        is_active: row.get("is_active"),
        last_validated_at,
        created_at: millis_to_datetime("created_at", row.get("created_at"))?,
        updated_at: millis_to_datetime("updated_at", row.get("updated_at"))?,
    })
}

#[async_trait]
impl ConnectionRepository for SqliteConnectionRepository {
    async fn upsert(&self, connection: &MailchimpConnection) -> Result<MailchimpConnection> {
        // created_at and id survive a reconnect
        sqlx::query(
            r#"
            INSERT INTO mailchimp_connections (
                id, user_id, access_token_encrypted, server_prefix, account_id, account_name,
                login_email, api_endpoint, is_active, last_validated_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT(user_id) DO UPDATE SET
                access_token_encrypted = excluded.access_token_encrypted,
                server_prefix = excluded.server_prefix,
                account_id = excluded.account_id,
                account_name = excluded.account_name,
                login_email = excluded.login_email,
                api_endpoint = excluded.api_endpoint,
                is_active = excluded.is_active,
                last_validated_at = excluded.last_validated_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&connection.id)
        .bind(&connection.user_id)
        .bind(&connection.access_token_encrypted)
        .bind(&connection.server_prefix)
        .bind(&connection.account_id)
        .bind(&connection.account_name)
        .bind(&connection.login_email)
        .bind(&connection.api_endpoint)
        .bind(connection.is_active)
        .bind(connection.last_validated_at.map(|t| t.timestamp_millis()))
        .bind(connection.created_at.timestamp_millis())
        .bind(connection.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        debug!(user_id = %connection.user_id, account_id = %connection.account_id, "Stored Mailchimp connection");

        self.find_by_user(&connection.user_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("MailchimpConnection", &connection.user_id))
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Option<MailchimpConnection>> {
        self.find_where(user_id, false).await
    }

    async fn find_active_by_user(&self, user_id: &str) -> Result<Option<MailchimpConnection>> {
        self.find_where(user_id, true).await
    }

    async fn touch_validated(&self, user_id: &str) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            "UPDATE mailchimp_connections SET last_validated_at = $1, updated_at = $1 WHERE user_id = $2",
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found("MailchimpConnection", user_id));
        }
        Ok(())
    }

    async fn deactivate(&self, user_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE mailchimp_connections SET is_active = FALSE, updated_at = $1 WHERE user_id = $2",
        )
        .bind(Utc::now().timestamp_millis())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found("MailchimpConnection", user_id));
        }
        info!(user_id = %user_id, "Deactivated Mailchimp connection");
        Ok(())
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mailchimp_connections WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
