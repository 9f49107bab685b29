use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use tracing::{debug, info};

use marktforge_core::config::{BrowserBackend, BrowserConfig};
use marktforge_core::{DriverError, SessionCookie};

/// The capability seam the driver works against: navigate, fill, click,
/// wait-for, read cookies. Backends differ only in how the session is opened;
/// tests substitute a scripted implementation.
pub trait BrowserSession: Send + Sync {
    fn navigate(&self, url: &str) -> Result<(), DriverError>;
    fn wait_for(&self, selector: &str, timeout: Duration) -> bool;
    fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;
    fn click(&self, selector: &str) -> Result<(), DriverError>;
    /// First selector that clicks wins.
    fn click_any(&self, selectors: &[&str]) -> bool;
    /// Click the first button/link whose visible text contains one of the
    /// needles (lowercase). Tolerates localized button labels.
    fn click_by_text(&self, needles: &[&str]) -> bool;
    fn page_text(&self) -> String;
    fn current_url(&self) -> String;
    fn title(&self) -> String;
    fn cookies(&self) -> Result<Vec<SessionCookie>, DriverError>;
}

fn browser_err(e: impl ToString) -> DriverError {
    DriverError::Browser(e.to_string())
}

/// JSON-encode a string for safe embedding into an evaluated expression.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Chrome DevTools session, either launched locally or connected to a remote
/// browser provider. One tab per task; the whole browser is torn down when
/// the session is dropped.
pub struct ChromeSession {
    browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    /// Open a session according to the configured backend. `proxy_url` is the
    /// per-task SOCKS5 proxy; the remote provider receives it as a launch
    /// parameter on the endpoint URL.
    pub fn open(config: &BrowserConfig, proxy_url: Option<&str>) -> Result<Self, DriverError> {
        let browser = match config.backend {
            BrowserBackend::Local => Self::launch_local(config, proxy_url)?,
            BrowserBackend::Remote => Self::connect_remote(config, proxy_url)?,
        };
        let tab = browser.new_tab().map_err(browser_err)?;
        Ok(Self { browser, tab })
    }

    fn launch_local(config: &BrowserConfig, proxy_url: Option<&str>) -> Result<Browser, DriverError> {
        let mut extra_args: Vec<OsString> = Vec::new();

        // Required for running in containers
        extra_args.push(OsString::from("--no-sandbox"));
        extra_args.push(OsString::from("--disable-dev-shm-usage"));
        extra_args.push(OsString::from("--disable-gpu"));

        if let Some(proxy) = proxy_url {
            extra_args.push(OsString::from(format!("--proxy-server={}", proxy)));
        }

        let mut builder = LaunchOptionsBuilder::default();
        builder
            .headless(true)
            .window_size(Some((config.window_width, config.window_height)))
            .args(extra_args.iter().map(|a| a.as_ref()).collect());

        if let Some(path) = &config.chrome_path {
            builder.path(Some(std::path::PathBuf::from(path)));
        } else if let Ok(path) = std::env::var("CHROME_PATH") {
            builder.path(Some(std::path::PathBuf::from(path)));
        }

        let options = builder.build().map_err(browser_err)?;
        info!(proxy = ?proxy_url, "launching local headless chrome");
        Browser::new(options).map_err(browser_err)
    }

    fn connect_remote(config: &BrowserConfig, proxy_url: Option<&str>) -> Result<Browser, DriverError> {
        let base = config.remote_ws_url.as_deref().ok_or_else(|| {
            DriverError::Browser("remote backend selected but remote_ws_url is not set".into())
        })?;

        let mut endpoint = url::Url::parse(base)
            .map_err(|e| DriverError::Browser(format!("invalid remote_ws_url: {}", e)))?;
        if let Some(token) = &config.remote_token {
            endpoint.query_pairs_mut().append_pair("token", token);
        }
        if let Some(proxy) = proxy_url {
            endpoint.query_pairs_mut().append_pair("--proxy-server", proxy);
        }

        info!("connecting to remote browser endpoint");
        Browser::connect(endpoint.to_string()).map_err(browser_err)
    }

    /// Explicit release. Dropping the browser closes the WebSocket and kills
    /// a locally launched process; the driver calls this on every exit path
    /// so remote sessions are never left running.
    pub fn close(self) {
        debug!("closing browser session");
        drop(self.tab);
        drop(self.browser);
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&self, url: &str) -> Result<(), DriverError> {
        debug!(url, "navigating");
        self.tab.navigate_to(url).map_err(browser_err)?;
        self.tab.wait_until_navigated().map_err(browser_err)?;
        Ok(())
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> bool {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .is_ok()
    }

    fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let expr = format!(
            r#"
            const elem = document.querySelector({sel});
            if (elem) {{
                elem.value = {val};
                elem.dispatchEvent(new Event('input', {{ bubbles: true }}));
                elem.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }} else {{
                throw new Error('element not found: ' + {sel});
            }}
            "#,
            sel = js_string(selector),
            val = js_string(value),
        );
        self.tab.evaluate(&expr, false).map_err(browser_err)?;
        Ok(())
    }

    fn click(&self, selector: &str) -> Result<(), DriverError> {
        let expr = format!(
            r#"
            const elem = document.querySelector({sel});
            if (elem) {{
                elem.click();
            }} else {{
                throw new Error('element not found: ' + {sel});
            }}
            "#,
            sel = js_string(selector),
        );
        self.tab.evaluate(&expr, false).map_err(browser_err)?;
        Ok(())
    }

    fn click_any(&self, selectors: &[&str]) -> bool {
        for selector in selectors {
            if self.click(selector).is_ok() {
                debug!(selector, "clicked");
                return true;
            }
        }
        false
    }

    fn click_by_text(&self, needles: &[&str]) -> bool {
        let needles_json =
            serde_json::to_string(needles).unwrap_or_else(|_| "[]".to_string());
        let expr = format!(
            r#"
            (() => {{
                const needles = {needles_json};
                const nodes = Array.from(
                    document.querySelectorAll('button, a, [role="button"], input[type="submit"]')
                );
                const hit = nodes.find(n => {{
                    const text = (n.innerText || n.textContent || n.value || '')
                        .trim().toLowerCase();
                    return needles.some(k => text.includes(k));
                }});
                if (hit) {{ hit.click(); return true; }}
                return false;
            }})()
            "#
        );
        self.tab
            .evaluate(&expr, false)
            .ok()
            .and_then(|result| result.value)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn page_text(&self) -> String {
        self.tab.get_content().unwrap_or_default()
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    fn title(&self) -> String {
        self.tab.get_title().unwrap_or_default()
    }

    fn cookies(&self) -> Result<Vec<SessionCookie>, DriverError> {
        let cookies = self.tab.get_cookies().map_err(browser_err)?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
                domain: Some(c.domain),
                path: Some(c.path),
            })
            .collect())
    }
}
