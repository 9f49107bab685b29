use anyhow::Result;

use marktforge_storage::Storage;

use crate::cli::SettingAction;

pub async fn run(storage: &Storage, action: SettingAction) -> Result<()> {
    match action {
        SettingAction::List => {
            for (key, value) in storage.list_settings().await? {
                println!("{} = {}", key, value);
            }
        }
        SettingAction::Set { key, value } => {
            storage.set_setting(&key, &value).await?;
            println!("{} updated", key);
        }
    }
    Ok(())
}
