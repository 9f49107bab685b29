pub mod credentials;
pub mod pairing;
pub mod tasks;
pub mod validators;

pub use pairing::start_pairing;
pub use tasks::{process_next, ProcessOutcome, TaskStore};
