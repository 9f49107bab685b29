use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use marktforge_core::{
    AccountStatus, GoogleAccount, NewAccount, NewProxy, Proxy, ProxyStatus,
};

mod task_queries;

pub use task_queries::PairCredentials;

/// Pool & task store. One pooled Postgres connection set, acquired per
/// operation; callers never see a raw connection.
#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

type AccountRow = (i64, String, String, String, DateTime<Utc>);
type ProxyRow = (
    i64,
    String,
    i32,
    Option<String>,
    Option<String>,
    String,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

fn account_from_row(row: AccountRow) -> Result<GoogleAccount> {
    let (id, email, password, status, created_at) = row;
    let status = AccountStatus::parse(&status)
        .ok_or_else(|| anyhow!("unknown account status '{}' for id {}", status, id))?;
    Ok(GoogleAccount { id, email, password, status, created_at })
}

fn proxy_from_row(row: ProxyRow) -> Result<Proxy> {
    let (id, host, port, username, password, status, last_checked, created_at) = row;
    let status = ProxyStatus::parse(&status)
        .ok_or_else(|| anyhow!("unknown proxy status '{}' for id {}", status, id))?;
    let port = u16::try_from(port).map_err(|_| anyhow!("invalid proxy port {}", port))?;
    Ok(Proxy { id, host, port, username, password, status, last_checked, created_at })
}

impl Storage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../migrations/001_init.sql"))
            .execute(&self.pool)
            .await?;
        info!("migrations complete");
        Ok(())
    }

    pub async fn check_connectivity(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // --- Google accounts ---

    pub async fn list_accounts(&self) -> Result<Vec<GoogleAccount>> {
        let rows: Vec<AccountRow> = sqlx::query_as(
            "SELECT id, email, password, status, created_at
             FROM google_accounts ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(account_from_row).collect()
    }

    pub async fn get_account(&self, id: i64) -> Result<Option<GoogleAccount>> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, email, password, status, created_at
             FROM google_accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(account_from_row).transpose()
    }

    /// Bulk import. Duplicate emails are silently skipped; returns the number
    /// of rows actually inserted.
    pub async fn insert_accounts(&self, accounts: &[NewAccount]) -> Result<u64> {
        let mut inserted = 0;
        for account in accounts {
            let result = sqlx::query(
                "INSERT INTO google_accounts (email, password)
                 VALUES ($1, $2) ON CONFLICT (email) DO NOTHING",
            )
            .bind(&account.email)
            .bind(&account.password)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    pub async fn delete_account(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM google_accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_account_status(&self, id: i64, status: AccountStatus) -> Result<()> {
        sqlx::query("UPDATE google_accounts SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Proxies ---

    pub async fn list_proxies(&self) -> Result<Vec<Proxy>> {
        let rows: Vec<ProxyRow> = sqlx::query_as(
            "SELECT id, host, port, username, password, status, last_checked, created_at
             FROM proxies ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(proxy_from_row).collect()
    }

    pub async fn get_proxy(&self, id: i64) -> Result<Option<Proxy>> {
        let row: Option<ProxyRow> = sqlx::query_as(
            "SELECT id, host, port, username, password, status, last_checked, created_at
             FROM proxies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(proxy_from_row).transpose()
    }

    pub async fn insert_proxies(&self, proxies: &[NewProxy]) -> Result<u64> {
        let mut inserted = 0;
        for proxy in proxies {
            let result = sqlx::query(
                "INSERT INTO proxies (host, port, username, password)
                 VALUES ($1, $2, $3, $4) ON CONFLICT (host, port) DO NOTHING",
            )
            .bind(&proxy.host)
            .bind(proxy.port as i32)
            .bind(&proxy.username)
            .bind(&proxy.password)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    pub async fn delete_proxy(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM proxies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Status update; probe transitions also stamp `last_checked`.
    pub async fn update_proxy_status(&self, id: i64, status: ProxyStatus) -> Result<()> {
        sqlx::query("UPDATE proxies SET status = $1, last_checked = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Settings ---

    pub async fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT setting_key, setting_value FROM automation_settings ORDER BY setting_key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO automation_settings (setting_key, setting_value)
             VALUES ($1, $2)
             ON CONFLICT (setting_key) DO UPDATE
                SET setting_value = EXCLUDED.setting_value, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
