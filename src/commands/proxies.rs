use anyhow::{Context, Result};

use marktforge_core::{AppConfig, NewProxy};
use marktforge_pipeline::validators;
use marktforge_storage::Storage;

use crate::cli::ProxyAction;

pub async fn run(storage: &Storage, config: &AppConfig, action: ProxyAction) -> Result<()> {
    match action {
        ProxyAction::List => {
            let proxies = storage.list_proxies().await?;
            for proxy in &proxies {
                let checked = proxy
                    .last_checked
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:>6}  {:<28} {:<10} checked {}",
                    proxy.id,
                    proxy.addr(),
                    proxy.status.as_str(),
                    checked
                );
            }
            println!("{} proxies", proxies.len());
        }
        ProxyAction::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file))?;
            let proxies = parse_import(&content);
            let inserted = storage.insert_proxies(&proxies).await?;
            println!("{} of {} proxies imported (duplicates skipped)", inserted, proxies.len());
        }
        ProxyAction::Delete { id } => {
            if storage.delete_proxy(id).await? {
                println!("proxy {} deleted", id);
            } else {
                println!("proxy {} not found", id);
            }
        }
        ProxyAction::Check { id } => {
            let alive = validators::check_proxy(storage, config, id).await?;
            println!("proxy {}: {}", id, if alive { "active" } else { "failed" });
        }
    }
    Ok(())
}

/// One `host:port` or `host:port:user:pass` per line; malformed lines are
/// skipped.
fn parse_import(content: &str) -> Vec<NewProxy> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.splitn(4, ':');
            let host = parts.next()?.to_string();
            let port: u16 = parts.next()?.parse().ok()?;
            let username = parts.next().map(str::to_string);
            let password = parts.next().map(str::to_string);
            Some(NewProxy { host, port, username, password })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proxy_lines() {
        let parsed = parse_import("1.2.3.4:1080\n5.6.7.8:9050:user:pass\nnot-a-proxy\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].port, 1080);
        assert!(parsed[0].username.is_none());
        assert_eq!(parsed[1].username.as_deref(), Some("user"));
        assert_eq!(parsed[1].password.as_deref(), Some("pass"));
    }
}
