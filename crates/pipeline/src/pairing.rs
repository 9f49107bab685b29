use anyhow::Result;
use tracing::info;

use marktforge_storage::Storage;

use crate::credentials;

/// Match idle accounts to idle proxies and create one `waiting` task per
/// pair. Returns the number of tasks created; an exhausted pool is a zero,
/// not an error. Idempotent per resource: a claimed account or proxy stays
/// out of selection until its task leaves {waiting, processing, completed}.
pub async fn start_pairing(storage: &Storage, limit: i64) -> Result<u64> {
    let created = storage
        .create_pending_tasks(limit, &mut credentials::generate_pair)
        .await?;
    info!(created, "pairing complete");
    Ok(created)
}
