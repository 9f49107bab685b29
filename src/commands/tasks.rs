use anyhow::Result;

use marktforge_storage::Storage;

use crate::cli::TaskAction;

pub async fn run(storage: &Storage, action: TaskAction) -> Result<()> {
    match action {
        TaskAction::List => {
            let tasks = storage.list_tasks().await?;
            for task in &tasks {
                println!(
                    "{:>6}  {:<11} {:<14} via {:<22} attempts={} {}",
                    task.id,
                    task.status,
                    task.marktplaats_login,
                    task.proxy_addr.as_deref().unwrap_or("-"),
                    task.attempts,
                    task.error_message.as_deref().unwrap_or("")
                );
            }
            println!("{} tasks", tasks.len());
        }
        TaskAction::Show { id } => match storage.get_task(id).await? {
            None => println!("task {} not found", id),
            Some(task) => {
                println!("task {}", task.id);
                println!("  status     {}", task.status.as_str());
                println!("  login      {}", task.marktplaats_login);
                println!("  account id {}", task.google_account_id);
                println!("  proxy id   {}", task.proxy_id);
                println!("  attempts   {}", task.attempts);
                println!("  created    {}", task.created_at);
                if let Some(completed) = task.completed_at {
                    println!("  completed  {}", completed);
                }
                if let Some(error) = &task.error_message {
                    println!("  error      {}", error);
                }
                if let Some(cookies) = &task.cookies_data {
                    println!("  cookies    {} bytes captured", cookies.len());
                }
                if !task.status.is_terminal() {
                    println!("  (still in flight; the step log lands with the terminal write)");
                }
                if let Some(logs) = &task.logs {
                    println!("  steps:");
                    match serde_json::from_str::<Vec<String>>(logs) {
                        Ok(steps) => {
                            for step in steps {
                                println!("    {}", step);
                            }
                        }
                        Err(_) => println!("    {}", logs),
                    }
                }
            }
        },
        TaskAction::Delete { id } => {
            if storage.delete_task(id).await? {
                println!("task {} deleted, resources released", id);
            } else {
                println!("task {} not found", id);
            }
        }
        TaskAction::Clear => {
            let removed = storage.delete_all_tasks().await?;
            println!("{} tasks deleted", removed);
        }
    }
    Ok(())
}
