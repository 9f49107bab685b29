use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use marktforge_core::{RegistrationTask, TaskStatus, TaskView};

use crate::Storage;

/// Freshly generated target-site credentials for one pair.
pub struct PairCredentials {
    pub login: String,
    pub password: String,
}

type TaskRow = (
    i64,
    i64,
    i64,
    String,
    String,
    String,
    Option<String>,
    i32,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

const TASK_COLUMNS: &str = "id, google_account_id, proxy_id, marktplaats_login, \
     marktplaats_password, status, error_message, attempts, cookies_data, logs, \
     created_at, claimed_at, completed_at";

fn task_from_row(row: TaskRow) -> Result<RegistrationTask> {
    let (
        id,
        google_account_id,
        proxy_id,
        marktplaats_login,
        marktplaats_password,
        status,
        error_message,
        attempts,
        cookies_data,
        logs,
        created_at,
        claimed_at,
        completed_at,
    ) = row;
    let status = TaskStatus::parse(&status)
        .ok_or_else(|| anyhow!("unknown task status '{}' for id {}", status, id))?;
    Ok(RegistrationTask {
        id,
        google_account_id,
        proxy_id,
        marktplaats_login,
        marktplaats_password,
        status,
        error_message,
        attempts,
        cookies_data,
        logs,
        created_at,
        claimed_at,
        completed_at,
    })
}

impl Storage {
    /// Pairing transaction: pick up to `limit` free accounts and free proxies,
    /// zip them into distinct pairs and insert one `waiting` task per pair.
    ///
    /// A resource is free when its status allows assignment and no task in
    /// {waiting, processing, completed} references it. `FOR UPDATE SKIP
    /// LOCKED` on the picked rows serializes concurrent pairing calls: a
    /// second caller skips rows the first one holds, so the same account or
    /// proxy can never be booked twice.
    pub async fn create_pending_tasks(
        &self,
        limit: i64,
        credentials: &mut dyn FnMut() -> PairCredentials,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let account_ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM google_accounts ga
             WHERE ga.status IN ('active', 'ready')
               AND NOT EXISTS (
                   SELECT 1 FROM registration_tasks rt
                   WHERE rt.google_account_id = ga.id
                     AND rt.status IN ('waiting', 'processing', 'completed')
               )
             ORDER BY ga.created_at
             LIMIT $1
             FOR UPDATE SKIP LOCKED",
        )
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let proxy_ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM proxies p
             WHERE p.status = 'active'
               AND NOT EXISTS (
                   SELECT 1 FROM registration_tasks rt
                   WHERE rt.proxy_id = p.id
                     AND rt.status IN ('waiting', 'processing', 'completed')
               )
             ORDER BY p.created_at
             LIMIT $1
             FOR UPDATE SKIP LOCKED",
        )
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let mut created = 0;
        for ((account_id,), (proxy_id,)) in account_ids.into_iter().zip(proxy_ids.into_iter()) {
            let creds = credentials();
            sqlx::query(
                "INSERT INTO registration_tasks
                     (google_account_id, proxy_id, marktplaats_login, marktplaats_password, status)
                 VALUES ($1, $2, $3, $4, 'waiting')",
            )
            .bind(account_id)
            .bind(proxy_id)
            .bind(&creds.login)
            .bind(&creds.password)
            .execute(&mut *tx)
            .await?;
            created += 1;
        }

        tx.commit().await?;
        debug!(created, "pairing transaction committed");
        Ok(created)
    }

    /// Atomically claim the oldest waiting task: one conditional UPDATE, so a
    /// concurrent caller observes `processing` and moves on.
    pub async fn claim_oldest_waiting(&self) -> Result<Option<RegistrationTask>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "UPDATE registration_tasks SET status = 'processing', claimed_at = NOW()
             WHERE id = (
                 SELECT id FROM registration_tasks
                 WHERE status = 'waiting'
                 ORDER BY created_at, id
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {TASK_COLUMNS}"
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.map(task_from_row).transpose()
    }

    /// Terminal success write: cookies and logs persisted, completion stamped.
    pub async fn complete_task(&self, id: i64, cookies_json: &str, logs_json: &str) -> Result<()> {
        sqlx::query(
            "UPDATE registration_tasks
             SET status = 'completed', completed_at = NOW(),
                 cookies_data = $2, logs = $3, error_message = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(cookies_json)
        .bind(logs_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal failure write: truncated error, attempt counter bumped
    /// exactly once, logs persisted.
    pub async fn fail_task(&self, id: i64, error_message: &str, logs_json: &str) -> Result<()> {
        sqlx::query(
            "UPDATE registration_tasks
             SET status = 'failed', error_message = $2,
                 attempts = attempts + 1, logs = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(error_message)
        .bind(logs_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Lease-based recovery for tasks stranded in `processing` by a crash:
    /// anything claimed longer than `after_seconds` ago goes back to
    /// `waiting`.
    pub async fn reclaim_stuck(&self, after_seconds: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE registration_tasks
             SET status = 'waiting', claimed_at = NULL
             WHERE status = 'processing'
               AND claimed_at < NOW() - INTERVAL '1 second' * $1",
        )
        .bind(after_seconds)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskView>> {
        let rows: Vec<(
            i64,
            String,
            String,
            Option<String>,
            i32,
            Option<String>,
            Option<String>,
            Option<i32>,
            DateTime<Utc>,
            Option<DateTime<Utc>>,
        )> = sqlx::query_as(
            "SELECT rt.id, rt.status, rt.marktplaats_login, rt.error_message, rt.attempts,
                    ga.email, p.host, p.port, rt.created_at, rt.completed_at
             FROM registration_tasks rt
             LEFT JOIN google_accounts ga ON rt.google_account_id = ga.id
             LEFT JOIN proxies p ON rt.proxy_id = p.id
             ORDER BY rt.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, status, login, error, attempts, email, host, port, created, completed)| {
                    let proxy_addr = match (host, port) {
                        (Some(h), Some(p)) => Some(format!("{}:{}", h, p)),
                        _ => None,
                    };
                    TaskView {
                        id,
                        status,
                        marktplaats_login: login,
                        error_message: error,
                        attempts,
                        account_email: email,
                        proxy_addr,
                        created_at: created,
                        completed_at: completed,
                    }
                },
            )
            .collect())
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<RegistrationTask>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM registration_tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(task_from_row).transpose()
    }

    /// Unconditional delete; releases the referenced account and proxy back
    /// into the eligible pool.
    pub async fn delete_task(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM registration_tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_tasks(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM registration_tasks")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_tasks_by_status(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM registration_tasks GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
