use anyhow::Result;

use marktforge_core::AppConfig;
use marktforge_pipeline::{process_next, start_pairing, ProcessOutcome};
use marktforge_storage::Storage;

pub async fn start(storage: &Storage, config: &AppConfig, limit: Option<i64>) -> Result<()> {
    let limit = limit.unwrap_or(config.automation.pair_limit);
    let created = start_pairing(storage, limit).await?;
    println!("{} tasks created", created);
    Ok(())
}

/// Process up to `count` tasks, one synchronous claim at a time. Stops early
/// when the waiting queue drains.
pub async fn process(storage: &Storage, config: &AppConfig, count: u32) -> Result<()> {
    for _ in 0..count {
        match process_next(storage, config).await? {
            ProcessOutcome::NoWaitingTasks => {
                println!("no waiting tasks");
                break;
            }
            ProcessOutcome::Completed { task_id } => {
                println!("task {} completed", task_id);
            }
            ProcessOutcome::Failed {
                task_id,
                error,
                retryable,
            } => {
                let hint = if retryable {
                    "transient; delete the task to re-pair and retry"
                } else {
                    "needs operator attention"
                };
                println!("task {} failed ({}): {}", task_id, hint, error);
            }
        }
    }
    Ok(())
}
