use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

use marktforge_automation::driver::{self, DriverReport};
use marktforge_core::step_log::truncate_error;
use marktforge_core::{AppConfig, GoogleAccount, Proxy, RegistrationTask};
use marktforge_storage::Storage;

/// Outcome of one `process_next` call, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No waiting task existed; nothing was mutated.
    NoWaitingTasks,
    Completed {
        task_id: i64,
    },
    Failed {
        task_id: i64,
        error: String,
        /// Transient failure: deleting the task and re-pairing may succeed.
        /// Non-retryable failures need operator action first.
        retryable: bool,
    },
}

/// The store surface the task state machine dispatches against. `Storage`
/// provides the real implementation; tests script it.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn reclaim_stuck(&self, after_seconds: i64) -> Result<u64>;
    async fn claim_oldest_waiting(&self) -> Result<Option<RegistrationTask>>;
    async fn get_account(&self, id: i64) -> Result<Option<GoogleAccount>>;
    async fn get_proxy(&self, id: i64) -> Result<Option<Proxy>>;
    async fn complete_task(&self, id: i64, cookies_json: &str, logs_json: &str) -> Result<()>;
    async fn fail_task(&self, id: i64, error_message: &str, logs_json: &str) -> Result<()>;
}

#[async_trait]
impl TaskStore for Storage {
    async fn reclaim_stuck(&self, after_seconds: i64) -> Result<u64> {
        Storage::reclaim_stuck(self, after_seconds).await
    }
    async fn claim_oldest_waiting(&self) -> Result<Option<RegistrationTask>> {
        Storage::claim_oldest_waiting(self).await
    }
    async fn get_account(&self, id: i64) -> Result<Option<GoogleAccount>> {
        Storage::get_account(self, id).await
    }
    async fn get_proxy(&self, id: i64) -> Result<Option<Proxy>> {
        Storage::get_proxy(self, id).await
    }
    async fn complete_task(&self, id: i64, cookies_json: &str, logs_json: &str) -> Result<()> {
        Storage::complete_task(self, id, cookies_json, logs_json).await
    }
    async fn fail_task(&self, id: i64, error_message: &str, logs_json: &str) -> Result<()> {
        Storage::fail_task(self, id, error_message, logs_json).await
    }
}

type DriverFuture = Pin<Box<dyn Future<Output = DriverReport> + Send + 'static>>;

/// Claim the oldest waiting task and run it to a terminal state.
pub async fn process_next(storage: &Storage, config: &AppConfig) -> Result<ProcessOutcome> {
    let driver_config = config.clone();
    process_on(storage, config, move |account, proxy| {
        Box::pin(async move { driver::run(&driver_config, &account, &proxy).await })
    })
    .await
}

/// The state machine proper, over the store seam and an injectable driver.
///
/// Everything between the claim and the terminal write is a failure-safe
/// region: reference lookups fold into an aborted report, the driver runs
/// under its own spawned task so even a panic is caught at the join, and
/// every arm below ends in exactly one of `complete_task` / `fail_task`. A
/// claimed task never stays in `processing` past this function except on a
/// store write failure, which the reclaim sweep covers on the next call.
async fn process_on<F>(
    store: &dyn TaskStore,
    config: &AppConfig,
    drive: F,
) -> Result<ProcessOutcome>
where
    F: FnOnce(GoogleAccount, Proxy) -> DriverFuture,
{
    if config.automation.reclaim_after_seconds > 0 {
        let reclaimed = store
            .reclaim_stuck(config.automation.reclaim_after_seconds)
            .await?;
        if reclaimed > 0 {
            warn!(reclaimed, "returned stuck processing tasks to waiting");
        }
    }

    let Some(task) = store.claim_oldest_waiting().await? else {
        info!("no waiting tasks");
        return Ok(ProcessOutcome::NoWaitingTasks);
    };
    info!(task_id = task.id, "claimed task");

    let report = match resolve_refs(store, &task).await {
        Ok((account, proxy)) => contain_panics(drive(account, proxy)).await,
        Err(reason) => DriverReport::aborted(reason),
    };

    match report.result {
        Ok(success) => {
            let cookies_json =
                serde_json::to_string(&success.cookies).unwrap_or_else(|_| "[]".to_string());
            store
                .complete_task(task.id, &cookies_json, &report.log.to_json())
                .await?;
            info!(task_id = task.id, final_url = %success.final_url, "task completed");
            Ok(ProcessOutcome::Completed { task_id: task.id })
        }
        Err(e) => {
            let message = truncate_error(&e.to_string(), config.automation.error_message_max_chars);
            store
                .fail_task(task.id, &message, &report.log.to_json())
                .await?;
            warn!(task_id = task.id, error = %message, "task failed");
            Ok(ProcessOutcome::Failed {
                task_id: task.id,
                error: message,
                retryable: e.is_retryable(),
            })
        }
    }
}

/// Resolve the task's account and proxy. A missing reference or a store read
/// error becomes the stored failure reason rather than an early return.
async fn resolve_refs(
    store: &dyn TaskStore,
    task: &RegistrationTask,
) -> Result<(GoogleAccount, Proxy), String> {
    let account = match store.get_account(task.google_account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return Err(format!(
                "referenced google account {} no longer exists",
                task.google_account_id
            ))
        }
        Err(e) => return Err(format!("account lookup failed: {}", e)),
    };
    let proxy = match store.get_proxy(task.proxy_id).await {
        Ok(Some(proxy)) => proxy,
        Ok(None) => {
            return Err(format!(
                "referenced proxy {} no longer exists",
                task.proxy_id
            ))
        }
        Err(e) => return Err(format!("proxy lookup failed: {}", e)),
    };
    Ok((account, proxy))
}

/// The driver runs under its own spawned task so a panic surfaces as a join
/// error instead of unwinding through the claim.
async fn contain_panics(attempt: DriverFuture) -> DriverReport {
    match tokio::spawn(attempt).await {
        Ok(report) => report,
        Err(join_err) => {
            error!(error = %join_err, "driver task aborted");
            DriverReport::aborted(format!("driver aborted: {}", join_err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use marktforge_automation::driver::DriverSuccess;
    use marktforge_core::config::{
        AutomationConfig, BrowserBackend, BrowserConfig, DatabaseConfig, TargetConfig,
    };
    use marktforge_core::{
        AccountStatus, DriverError, ProxyStatus, SessionCookie, StepLog, TaskStatus,
    };

    /// Scripted store: hands out at most one claimed task and records every
    /// terminal write.
    #[derive(Default)]
    struct ScriptedStore {
        task: Mutex<Option<RegistrationTask>>,
        account: Option<GoogleAccount>,
        proxy: Option<Proxy>,
        reclaim_calls: Mutex<u32>,
        completed: Mutex<Vec<(i64, String, String)>>,
        failed: Mutex<Vec<(i64, String, String)>>,
    }

    impl ScriptedStore {
        fn terminal_writes(&self) -> (usize, usize) {
            (
                self.completed.lock().unwrap().len(),
                self.failed.lock().unwrap().len(),
            )
        }
    }

    #[async_trait]
    impl TaskStore for ScriptedStore {
        async fn reclaim_stuck(&self, _after_seconds: i64) -> Result<u64> {
            *self.reclaim_calls.lock().unwrap() += 1;
            Ok(0)
        }
        async fn claim_oldest_waiting(&self) -> Result<Option<RegistrationTask>> {
            Ok(self.task.lock().unwrap().take())
        }
        async fn get_account(&self, _id: i64) -> Result<Option<GoogleAccount>> {
            Ok(self.account.clone())
        }
        async fn get_proxy(&self, _id: i64) -> Result<Option<Proxy>> {
            Ok(self.proxy.clone())
        }
        async fn complete_task(&self, id: i64, cookies_json: &str, logs_json: &str) -> Result<()> {
            self.completed
                .lock()
                .unwrap()
                .push((id, cookies_json.to_string(), logs_json.to_string()));
            Ok(())
        }
        async fn fail_task(&self, id: i64, error_message: &str, logs_json: &str) -> Result<()> {
            self.failed
                .lock()
                .unwrap()
                .push((id, error_message.to_string(), logs_json.to_string()));
            Ok(())
        }
    }

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
                google_button_wait_seconds: 1,
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

    fn claimed_task() -> RegistrationTask {
        RegistrationTask {
            id: 7,
            google_account_id: 1,
            proxy_id: 2,
            marktplaats_login: "user_abc12345".into(),
            marktplaats_password: "Xy12Ab34Cd56".into(),
            status: TaskStatus::Processing,
            error_message: None,
            attempts: 0,
            cookies_data: None,
            logs: None,
            created_at: Utc::now(),
            claimed_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    fn store_with_task() -> ScriptedStore {
        ScriptedStore {
            task: Mutex::new(Some(claimed_task())),
            account: Some(GoogleAccount {
                id: 1,
                email: "tester@gmail.com".into(),
                password: "hunter22".into(),
                status: AccountStatus::Active,
                created_at: Utc::now(),
            }),
            proxy: Some(Proxy {
                id: 2,
                host: "10.0.0.2".into(),
                port: 1080,
                username: None,
                password: None,
                status: ProxyStatus::Active,
                last_checked: None,
                created_at: Utc::now(),
            }),
            ..Default::default()
        }
    }

    fn success_report() -> DriverReport {
        let mut log = StepLog::new();
        log.step("captured 1 cookies");
        DriverReport {
            result: Ok(DriverSuccess {
                cookies: vec![SessionCookie {
                    name: "sid".into(),
                    value: "abc123".into(),
                    domain: Some(".marktplaats.nl".into()),
                    path: Some("/".into()),
                }],
                final_url: "https://www.marktplaats.nl/".into(),
                final_title: "Marktplaats".into(),
            }),
            log,
        }
    }

    #[tokio::test]
    async fn success_writes_completed_with_cookies() {
        let store = store_with_task();
        let outcome = process_on(&store, &test_config(), |_, _| {
            Box::pin(async { success_report() })
        })
        .await
        .unwrap();

        assert_eq!(outcome, ProcessOutcome::Completed { task_id: 7 });
        assert_eq!(store.terminal_writes(), (1, 0));

        let (id, cookies_json, logs_json) = store.completed.lock().unwrap()[0].clone();
        assert_eq!(id, 7);
        let cookies: Vec<SessionCookie> = serde_json::from_str(&cookies_json).unwrap();
        assert_eq!(cookies[0].name, "sid");
        let steps: Vec<String> = serde_json::from_str(&logs_json).unwrap();
        assert!(!steps.is_empty());
    }

    #[tokio::test]
    async fn every_failure_kind_ends_terminal_with_one_attempt_bump() {
        let failures = [
            DriverError::ProxyUnreachable("connection refused".into()),
            DriverError::ProxyTimeout(10),
            DriverError::GoogleVerificationRequired("challenge".into()),
            DriverError::TargetLoginControlNotFound,
            DriverError::TargetGoogleButtonNotFound,
            DriverError::Browser("tab crashed".into()),
            DriverError::Unknown("boom".into()),
        ];

        for failure in failures {
            let store = store_with_task();
            let expected_retryable = failure.is_retryable();
            let expected_message = failure.to_string();
            let outcome = process_on(&store, &test_config(), move |_, _| {
                Box::pin(async move {
                    DriverReport {
                        result: Err(failure),
                        log: StepLog::new(),
                    }
                })
            })
            .await
            .unwrap();

            // Terminal state, never processing: exactly one failure write,
            // which is also the single attempts increment for this call.
            assert_eq!(store.terminal_writes(), (0, 1));
            assert_eq!(
                outcome,
                ProcessOutcome::Failed {
                    task_id: 7,
                    error: expected_message.clone(),
                    retryable: expected_retryable,
                }
            );
            assert_eq!(store.failed.lock().unwrap()[0].1, expected_message);
        }
    }

    #[tokio::test]
    async fn panicking_driver_still_fails_the_task() {
        let store = store_with_task();
        let outcome = process_on(&store, &test_config(), |_, _| {
            Box::pin(async { panic!("kaboom") })
        })
        .await
        .unwrap();

        assert_eq!(store.terminal_writes(), (0, 1));
        match outcome {
            ProcessOutcome::Failed { task_id, error, .. } => {
                assert_eq!(task_id, 7);
                assert!(error.contains("driver aborted"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_account_reference_fails_the_task() {
        let store = ScriptedStore {
            account: None,
            ..store_with_task()
        };
        let outcome = process_on(&store, &test_config(), |_, _| {
            Box::pin(async { success_report() })
        })
        .await
        .unwrap();

        assert_eq!(store.terminal_writes(), (0, 1));
        match outcome {
            ProcessOutcome::Failed { error, .. } => {
                assert!(error.contains("google account 1 no longer exists"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stored_error_is_truncated() {
        let store = store_with_task();
        let outcome = process_on(&store, &test_config(), |_, _| {
            Box::pin(async {
                DriverReport {
                    result: Err(DriverError::Unknown("x".repeat(600))),
                    log: StepLog::new(),
                }
            })
        })
        .await
        .unwrap();

        let stored = store.failed.lock().unwrap()[0].1.clone();
        assert_eq!(stored.chars().count(), 501); // 500 chars + ellipsis
        match outcome {
            ProcessOutcome::Failed { error, .. } => assert_eq!(error, stored),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let store = ScriptedStore::default();
        let outcome = process_on(&store, &test_config(), |_, _| {
            Box::pin(async { success_report() })
        })
        .await
        .unwrap();

        assert_eq!(outcome, ProcessOutcome::NoWaitingTasks);
        assert_eq!(store.terminal_writes(), (0, 0));
    }

    #[tokio::test]
    async fn second_call_after_drain_mutates_nothing() {
        let store = store_with_task();
        let first = process_on(&store, &test_config(), |_, _| {
            Box::pin(async { success_report() })
        })
        .await
        .unwrap();
        assert_eq!(first, ProcessOutcome::Completed { task_id: 7 });

        let second = process_on(&store, &test_config(), |_, _| {
            Box::pin(async { success_report() })
        })
        .await
        .unwrap();
        assert_eq!(second, ProcessOutcome::NoWaitingTasks);
        assert_eq!(store.terminal_writes(), (1, 0));
    }

    #[tokio::test]
    async fn reclaim_sweep_runs_only_when_configured() {
        let mut config = test_config();

        let store = ScriptedStore::default();
        process_on(&store, &config, |_, _| Box::pin(async { success_report() }))
            .await
            .unwrap();
        assert_eq!(*store.reclaim_calls.lock().unwrap(), 0);

        config.automation.reclaim_after_seconds = 900;
        let store = ScriptedStore::default();
        process_on(&store, &config, |_, _| Box::pin(async { success_report() }))
            .await
            .unwrap();
        assert_eq!(*store.reclaim_calls.lock().unwrap(), 1);
    }
}
