use anyhow::{Context, Result};

use marktforge_core::{AppConfig, NewAccount};
use marktforge_pipeline::validators;
use marktforge_storage::Storage;

use crate::cli::AccountAction;

pub async fn run(storage: &Storage, config: &AppConfig, action: AccountAction) -> Result<()> {
    match action {
        AccountAction::List => {
            let accounts = storage.list_accounts().await?;
            for account in &accounts {
                println!(
                    "{:>6}  {:<40} {:<10} {}",
                    account.id,
                    account.email,
                    account.status.as_str(),
                    account.created_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!("{} accounts", accounts.len());
        }
        AccountAction::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file))?;
            let accounts = parse_import(&content);
            let inserted = storage.insert_accounts(&accounts).await?;
            println!("{} of {} accounts imported (duplicates skipped)", inserted, accounts.len());
        }
        AccountAction::Delete { id } => {
            if storage.delete_account(id).await? {
                println!("account {} deleted", id);
            } else {
                println!("account {} not found", id);
            }
        }
        AccountAction::Check { id } => {
            let alive = validators::check_google_account(storage, config, id).await?;
            println!("account {}: {}", id, if alive { "active" } else { "failed" });
        }
    }
    Ok(())
}

/// One `email:password` per line; blank lines and `#` comments are skipped.
fn parse_import(content: &str) -> Vec<NewAccount> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (email, password) = line.split_once(':')?;
            Some(NewAccount {
                email: email.trim().to_string(),
                password: password.trim().to_string(),
            })
        })
        .collect()
}
