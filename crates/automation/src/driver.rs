use std::time::Duration;

use tokio::time::{sleep, Instant};

use marktforge_core::step_log::truncate_error;
use marktforge_core::{AppConfig, DriverError, GoogleAccount, Proxy, SessionCookie, StepLog};

use crate::google;
use crate::probe;
use crate::selectors;
use crate::session::{BrowserSession, ChromeSession};

#[derive(Debug, Clone)]
pub struct DriverSuccess {
    pub cookies: Vec<SessionCookie>,
    pub final_url: String,
    pub final_title: String,
}

/// What one registration attempt produced: the typed outcome plus the full
/// step trail, which is persisted on the task either way.
#[derive(Debug)]
pub struct DriverReport {
    pub result: Result<DriverSuccess, DriverError>,
    pub log: StepLog,
}

impl DriverReport {
    /// Report for a failure that happened before (or instead of) the driver
    /// running, e.g. a panic caught at the task boundary.
    pub fn aborted(reason: String) -> Self {
        let mut log = StepLog::new();
        log.step(format!("attempt aborted: {}", reason));
        Self {
            result: Err(DriverError::Unknown(reason)),
            log,
        }
    }
}

/// Run one full registration attempt: proxy probe, Google sign-in, target
/// site Google-login, cookie capture. Never panics on its own error paths;
/// the session is released on every exit.
pub async fn run(config: &AppConfig, account: &GoogleAccount, proxy: &Proxy) -> DriverReport {
    let mut log = StepLog::new();
    let result = run_inner(config, account, proxy, &mut log).await;
    if let Err(e) = &result {
        log.step(format!("attempt failed: {}", e));
    }
    DriverReport { result, log }
}

async fn run_inner(
    config: &AppConfig,
    account: &GoogleAccount,
    proxy: &Proxy,
    log: &mut StepLog,
) -> Result<DriverSuccess, DriverError> {
    log.step(format!("probing proxy {}", proxy.addr()));
    let echo = probe::probe_proxy(
        proxy,
        &config.automation.probe_url,
        Duration::from_secs(config.automation.probe_timeout_seconds),
    )
    .await?;
    log.step(format!("proxy reachable, echo: {}", truncate_error(&echo, 120)));

    let session = ChromeSession::open(&config.browser, Some(&proxy.socks5_url()))?;
    log.step("browser session opened");

    let outcome = run_flow(&session, config, account, log).await;

    session.close();
    log.step("browser session closed");
    outcome
}

/// The browser-visible part of the flow, driven through the session trait so
/// tests can script it.
pub async fn run_flow(
    session: &dyn BrowserSession,
    config: &AppConfig,
    account: &GoogleAccount,
    log: &mut StepLog,
) -> Result<DriverSuccess, DriverError> {
    let element_wait = Duration::from_secs(config.automation.element_wait_seconds);
    let settle = Duration::from_secs(config.automation.settle_seconds);

    google::sign_in(
        session,
        &config.target.google_signin_url,
        &account.email,
        &account.password,
        element_wait,
        log,
    )
    .await?;

    log.step(format!("navigating to {}", config.target.site_url));
    session.navigate(&config.target.site_url)?;
    sleep(settle).await;

    let clicked_login = session.click_any(selectors::LOGIN_LINK_SELECTORS)
        || session.click_by_text(selectors::LOGIN_TEXT_VARIANTS);
    if clicked_login {
        log.step("clicked site login control");
        sleep(settle).await;
    } else {
        // Not fatal: an authenticated session skips straight to the provider
        // buttons, so keep going and let the Google-button search decide.
        log.step("site login control not found, continuing");
    }

    let deadline = Instant::now() + Duration::from_secs(config.automation.google_button_wait_seconds);
    loop {
        if session.click_any(selectors::GOOGLE_BUTTON_SELECTORS)
            || session.click_by_text(selectors::GOOGLE_TEXT_VARIANTS)
        {
            log.step("clicked continue-with-google");
            break;
        }
        if Instant::now() >= deadline {
            log.step("continue-with-google control never appeared");
            return Err(if clicked_login {
                DriverError::TargetGoogleButtonNotFound
            } else {
                DriverError::TargetLoginControlNotFound
            });
        }
        sleep(Duration::from_secs(1)).await;
    }

    sleep(settle).await;

    let cookies = session.cookies()?;
    let final_url = session.current_url();
    let final_title = session.title();
    log.step(format!("captured {} cookies at {}", cookies.len(), final_url));

    Ok(DriverSuccess {
        cookies,
        final_url,
        final_title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marktforge_core::config::{
        AppConfig, AutomationConfig, BrowserBackend, BrowserConfig, DatabaseConfig, TargetConfig,
    };

    fn test_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                postgres_url: "postgres://localhost/marktforge_test".into(),
                max_connections: 1,
            },
            browser: BrowserConfig {
                backend: BrowserBackend::Local,
                remote_ws_url: None,
                remote_token: None,
                chrome_path: None,
                window_width: 1280,
                window_height: 800,
            },
            automation: AutomationConfig {
                pair_limit: 10,
                probe_url: "https://httpbin.org/ip".into(),
                probe_timeout_seconds: 1,
                element_wait_seconds: 1,
                google_button_wait_seconds: 0,
                settle_seconds: 0,
                error_message_max_chars: 500,
                reclaim_after_seconds: 0,
            },
            target: TargetConfig {
                site_url: "https://www.marktplaats.nl".into(),
                google_signin_url: "https://accounts.google.com/ServiceLogin".into(),
            },
        }
    }

    fn test_account() -> GoogleAccount {
        GoogleAccount {
            id: 1,
            email: "tester@gmail.com".into(),
            password: "hunter22".into(),
            status: marktforge_core::AccountStatus::Active,
            created_at: chrono::Utc::now(),
        }
    }

    /// Scripted session: behavior keyed off the selector/needle content the
    /// driver actually uses.
    struct ScriptedSession {
        email_input: bool,
        password_input: bool,
        challenge_text: Option<String>,
        click_login: bool,
        click_google: bool,
        cookies: Vec<SessionCookie>,
    }

    impl ScriptedSession {
        fn happy() -> Self {
            Self {
                email_input: true,
                password_input: true,
                challenge_text: None,
                click_login: true,
                click_google: true,
                cookies: vec![SessionCookie {
                    name: "sid".into(),
                    value: "abc123".into(),
                    domain: Some(".marktplaats.nl".into()),
                    path: Some("/".into()),
                }],
            }
        }
    }

    impl BrowserSession for ScriptedSession {
        fn navigate(&self, _url: &str) -> Result<(), DriverError> {
            Ok(())
        }

        fn wait_for(&self, selector: &str, _timeout: Duration) -> bool {
            if selector.contains("email") {
                self.email_input
            } else if selector.contains("password") {
                self.password_input
            } else {
                false
            }
        }

        fn fill(&self, _selector: &str, _value: &str) -> Result<(), DriverError> {
            Ok(())
        }

        fn click(&self, _selector: &str) -> Result<(), DriverError> {
            Ok(())
        }

        fn click_any(&self, selectors: &[&str]) -> bool {
            if selectors.iter().any(|s| s.contains("google")) {
                self.click_google
            } else if selectors.iter().any(|s| s.contains("login")) {
                self.click_login
            } else {
                // Google's own next buttons
                true
            }
        }

        fn click_by_text(&self, needles: &[&str]) -> bool {
            if needles.iter().any(|n| n.contains("google")) {
                self.click_google
            } else {
                self.click_login
            }
        }

        fn page_text(&self) -> String {
            self.challenge_text.clone().unwrap_or_default()
        }

        fn current_url(&self) -> String {
            "https://www.marktplaats.nl/".into()
        }

        fn title(&self) -> String {
            "Marktplaats".into()
        }

        fn cookies(&self) -> Result<Vec<SessionCookie>, DriverError> {
            Ok(self.cookies.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_captures_cookies() {
        let session = ScriptedSession::happy();
        let mut log = StepLog::new();
        let result = run_flow(&session, &test_config(), &test_account(), &mut log)
            .await
            .unwrap();

        assert_eq!(result.cookies.len(), 1);
        assert_eq!(result.final_url, "https://www.marktplaats.nl/");

        // Persisted cookies deserialize back to what the driver produced.
        let json = serde_json::to_string(&result.cookies).unwrap();
        let back: Vec<SessionCookie> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result.cookies);

        let steps = log.entries().join("\n");
        assert!(steps.contains("google sign-in complete"));
        assert!(steps.contains("clicked continue-with-google"));
    }

    #[tokio::test(start_paused = true)]
    async fn verification_challenge_is_non_retryable() {
        let session = ScriptedSession {
            password_input: false,
            challenge_text: Some("Enter the verification code we sent to your phone".into()),
            ..ScriptedSession::happy()
        };
        let mut log = StepLog::new();
        let err = run_flow(&session, &test_config(), &test_account(), &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::GoogleVerificationRequired(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_google_button_is_hard_failure() {
        let session = ScriptedSession {
            click_google: false,
            ..ScriptedSession::happy()
        };
        let mut log = StepLog::new();
        let err = run_flow(&session, &test_config(), &test_account(), &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::TargetGoogleButtonNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_login_control_reported_when_nothing_clicked() {
        let session = ScriptedSession {
            click_login: false,
            click_google: false,
            ..ScriptedSession::happy()
        };
        let mut log = StepLog::new();
        let err = run_flow(&session, &test_config(), &test_account(), &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, DriverError::TargetLoginControlNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn login_control_missing_but_google_button_present_continues() {
        let session = ScriptedSession {
            click_login: false,
            ..ScriptedSession::happy()
        };
        let mut log = StepLog::new();
        let result = run_flow(&session, &test_config(), &test_account(), &mut log).await;

        assert!(result.is_ok());
        assert!(log.entries().join("\n").contains("login control not found"));
    }
}
