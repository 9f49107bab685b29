use std::time::Duration;

use tracing::{debug, warn};

use marktforge_core::{DriverError, Proxy};

/// Verify proxy connectivity by fetching an IP-echo endpoint through it.
/// Returns the (trimmed) echo body on success.
///
/// Errors come from the transport layer as typed variants, not message
/// matching: connect-level failures are `ProxyUnreachable`, an accepted
/// connection that never produces a response is `ProxyTimeout`.
pub async fn probe_proxy(
    proxy: &Proxy,
    probe_url: &str,
    timeout: Duration,
) -> Result<String, DriverError> {
    let upstream = reqwest::Proxy::all(proxy.socks5_url())
        .map_err(|e| DriverError::ProxyUnreachable(format!("invalid proxy config: {}", e)))?;

    let client = reqwest::Client::builder()
        .proxy(upstream)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(|e| DriverError::Unknown(e.to_string()))?;

    debug!(proxy = %proxy.addr(), probe_url, "probing proxy");

    match client.get(probe_url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let body = resp.text().await.unwrap_or_default();
            Ok(body.trim().to_string())
        }
        Ok(resp) => Err(DriverError::ProxyUnreachable(format!(
            "probe returned HTTP {}",
            resp.status().as_u16()
        ))),
        Err(e) => {
            warn!(proxy = %proxy.addr(), error = %e, "proxy probe failed");
            Err(classify_transport_error(&e, timeout.as_secs()))
        }
    }
}

fn classify_transport_error(e: &reqwest::Error, timeout_secs: u64) -> DriverError {
    if e.is_connect() {
        DriverError::ProxyUnreachable(connect_detail(e))
    } else if e.is_timeout() {
        DriverError::ProxyTimeout(timeout_secs)
    } else {
        DriverError::ProxyUnreachable(connect_detail(e))
    }
}

/// Innermost source message, without the request URL reqwest prepends.
fn connect_detail(e: &reqwest::Error) -> String {
    let mut source: &dyn std::error::Error = e;
    while let Some(inner) = source.source() {
        source = inner;
    }
    source.to_string()
}
