pub mod accounts;
pub mod proxies;
pub mod run;
pub mod settings;
pub mod status;
pub mod tasks;
