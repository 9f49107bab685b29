use anyhow::Result;

use marktforge_storage::Storage;

pub async fn run(storage: &Storage) -> Result<()> {
    storage.check_connectivity().await?;

    let accounts = storage.list_accounts().await?;
    let proxies = storage.list_proxies().await?;
    let task_counts = storage.count_tasks_by_status().await?;

    println!("accounts: {}", accounts.len());
    for status in ["active", "ready", "checking", "failed"] {
        let n = accounts.iter().filter(|a| a.status.as_str() == status).count();
        if n > 0 {
            println!("  {:<11} {}", status, n);
        }
    }

    println!("proxies: {}", proxies.len());
    for status in ["active", "checking", "failed"] {
        let n = proxies.iter().filter(|p| p.status.as_str() == status).count();
        if n > 0 {
            println!("  {:<11} {}", status, n);
        }
    }

    let total: i64 = task_counts.iter().map(|(_, n)| n).sum();
    println!("tasks: {}", total);
    for (status, n) in &task_counts {
        println!("  {:<11} {}", status, n);
    }

    Ok(())
}
