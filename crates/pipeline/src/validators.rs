use std::time::Duration;

use anyhow::{bail, Result};
use tracing::info;

use marktforge_automation::session::ChromeSession;
use marktforge_automation::{google, probe};
use marktforge_core::{AccountStatus, AppConfig, ProxyStatus, StepLog};
use marktforge_storage::Storage;

/// Liveness probe for one proxy: GET the echo endpoint through it, HTTP 200
/// within the timeout passes. Status walks checking -> active | failed.
pub async fn check_proxy(storage: &Storage, config: &AppConfig, id: i64) -> Result<bool> {
    let Some(proxy) = storage.get_proxy(id).await? else {
        bail!("proxy {} not found", id);
    };

    storage.update_proxy_status(id, ProxyStatus::Checking).await?;

    let alive = probe::probe_proxy(
        &proxy,
        &config.automation.probe_url,
        Duration::from_secs(config.automation.probe_timeout_seconds),
    )
    .await
    .is_ok();

    let status = if alive { ProxyStatus::Active } else { ProxyStatus::Failed };
    storage.update_proxy_status(id, status).await?;
    info!(proxy = %proxy.addr(), alive, "proxy check finished");
    Ok(alive)
}

/// Liveness probe for one Google account: the driver's sign-in step without
/// any target-site steps. Status walks checking -> active | failed.
pub async fn check_google_account(storage: &Storage, config: &AppConfig, id: i64) -> Result<bool> {
    let Some(account) = storage.get_account(id).await? else {
        bail!("google account {} not found", id);
    };

    storage
        .update_account_status(id, AccountStatus::Checking)
        .await?;

    let alive = match ChromeSession::open(&config.browser, None) {
        Ok(session) => {
            let mut log = StepLog::new();
            let signed_in = google::sign_in(
                &session,
                &config.target.google_signin_url,
                &account.email,
                &account.password,
                Duration::from_secs(config.automation.element_wait_seconds),
                &mut log,
            )
            .await
            .is_ok();
            session.close();
            signed_in
        }
        Err(_) => false,
    };

    let status = if alive { AccountStatus::Active } else { AccountStatus::Failed };
    storage.update_account_status(id, status).await?;
    info!(email = %account.email, alive, "google account check finished");
    Ok(alive)
}
