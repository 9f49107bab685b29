use chrono::Utc;
use tracing::info;

/// Hard cap on entries; the log grows with driver steps, never user input,
/// but a wedged retry loop must not inflate the task row.
const MAX_ENTRIES: usize = 256;

/// Ordered, timestamped trail of driver steps. Persisted verbatim on the
/// task row as a JSON array of strings for operator debugging.
#[derive(Debug, Default, Clone)]
pub struct StepLog {
    entries: Vec<String>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        if self.entries.len() < MAX_ENTRIES {
            let stamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
            self.entries.push(format!("[{}] {}", stamp, message));
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Truncate an error message on a char boundary before it is persisted.
pub fn truncate_error(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let cut: String = message.chars().take(max_chars).collect();
    format!("{}…", cut)
}
