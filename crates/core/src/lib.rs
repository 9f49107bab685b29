pub mod config;
pub mod error;
pub mod step_log;
pub mod types;

pub use config::AppConfig;
pub use error::DriverError;
pub use step_log::StepLog;
pub use types::*;
