use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub browser: BrowserConfig,
    pub automation: AutomationConfig,
    pub target: TargetConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub postgres_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Which browser backend drives the session: a locally launched headless
/// Chrome, or a remote browser-as-a-service DevTools endpoint.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrowserBackend {
    Local,
    Remote,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    #[serde(default = "default_backend")]
    pub backend: BrowserBackend,
    /// WebSocket endpoint of the remote browser provider.
    pub remote_ws_url: Option<String>,
    /// Access token appended to the remote endpoint.
    pub remote_token: Option<String>,
    /// Explicit Chrome binary path; CHROME_PATH env also works.
    pub chrome_path: Option<String>,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutomationConfig {
    #[serde(default = "default_pair_limit")]
    pub pair_limit: i64,
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
    #[serde(default = "default_element_wait")]
    pub element_wait_seconds: u64,
    #[serde(default = "default_google_button_wait")]
    pub google_button_wait_seconds: u64,
    #[serde(default = "default_settle")]
    pub settle_seconds: u64,
    #[serde(default = "default_error_max_chars")]
    pub error_message_max_chars: usize,
    /// Lease for tasks stuck in `processing` after a crash; 0 disables the
    /// reclaim sweep.
    #[serde(default = "default_reclaim_after")]
    pub reclaim_after_seconds: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_google_signin_url")]
    pub google_signin_url: String,
}

fn default_max_connections() -> u32 { 10 }
fn default_backend() -> BrowserBackend { BrowserBackend::Local }
fn default_window_width() -> u32 { 1920 }
fn default_window_height() -> u32 { 1080 }
fn default_pair_limit() -> i64 { 10 }
fn default_probe_url() -> String { "https://httpbin.org/ip".to_string() }
fn default_probe_timeout() -> u64 { 10 }
fn default_element_wait() -> u64 { 10 }
fn default_google_button_wait() -> u64 { 30 }
fn default_settle() -> u64 { 3 }
fn default_error_max_chars() -> usize { 500 }
fn default_reclaim_after() -> i64 { 900 }
fn default_site_url() -> String { "https://www.marktplaats.nl".to_string() }
fn default_google_signin_url() -> String { "https://accounts.google.com/ServiceLogin".to_string() }
