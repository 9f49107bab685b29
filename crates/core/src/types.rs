use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a pooled Google account. `ready` is the import state, the
/// validator moves it through `checking` to `active` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Ready,
    Checking,
    Failed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Ready => "ready",
            AccountStatus::Checking => "checking",
            AccountStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AccountStatus::Active),
            "ready" => Some(AccountStatus::Ready),
            "checking" => Some(AccountStatus::Checking),
            "failed" => Some(AccountStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    Active,
    Checking,
    Failed,
}

impl ProxyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyStatus::Active => "active",
            ProxyStatus::Checking => "checking",
            ProxyStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProxyStatus::Active),
            "checking" => Some(ProxyStatus::Checking),
            "failed" => Some(ProxyStatus::Failed),
            _ => None,
        }
    }
}

/// Task lifecycle: waiting -> processing -> completed | failed. Failed tasks
/// hold their resources until an operator deletes the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Waiting,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(TaskStatus::Waiting),
            "processing" => Some(TaskStatus::Processing),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct GoogleAccount {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Proxy {
    pub id: i64,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub status: ProxyStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Proxy {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// SOCKS5 URL with inline credentials when present, suitable for both
    /// the reqwest probe and the browser's --proxy-server argument.
    pub fn socks5_url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                format!("socks5://{}:{}@{}:{}", user, pass, self.host, self.port)
            }
            _ => format!("socks5://{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProxy {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegistrationTask {
    pub id: i64,
    pub google_account_id: i64,
    pub proxy_id: i64,
    pub marktplaats_login: String,
    pub marktplaats_password: String,
    pub status: TaskStatus,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub cookies_data: Option<String>,
    pub logs: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Joined row for operator-facing task listings.
#[derive(Debug, Clone)]
pub struct TaskView {
    pub id: i64,
    pub status: String,
    pub marktplaats_login: String,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub account_email: Option<String>,
    pub proxy_addr: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One captured browser cookie. `name`/`value` are the compatibility
/// contract; domain and path are kept when the browser reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for s in [
            TaskStatus::Waiting,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::parse("pending"), None);
        assert_eq!(AccountStatus::parse("ready"), Some(AccountStatus::Ready));
        assert_eq!(ProxyStatus::parse("ready"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Waiting.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }

    #[test]
    fn socks5_url_with_and_without_auth() {
        let mut proxy = Proxy {
            id: 1,
            host: "10.0.0.2".into(),
            port: 1080,
            username: None,
            password: None,
            status: ProxyStatus::Active,
            last_checked: None,
            created_at: Utc::now(),
        };
        assert_eq!(proxy.socks5_url(), "socks5://10.0.0.2:1080");
        proxy.username = Some("u".into());
        proxy.password = Some("p".into());
        assert_eq!(proxy.socks5_url(), "socks5://u:p@10.0.0.2:1080");
    }

    #[test]
    fn cookie_serializes_minimal_shape() {
        let cookie = SessionCookie {
            name: "sid".into(),
            value: "abc".into(),
            domain: None,
            path: None,
        };
        assert_eq!(
            serde_json::to_string(&cookie).unwrap(),
            r#"{"name":"sid","value":"abc"}"#
        );
    }
}
