// src/server.rs

use std::time::Duration;

use tracing::{debug, info};

use crate::error::{ClientError, Result};

/// Polls `{url}/health` until the backend answers 2xx or `timeout_secs`
/// passes.
pub async fn wait_for_server_ready(url: &str, timeout_secs: u64) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let health_url = format!("{}/health", url.trim_end_matches('/'));
    let start = std::time::Instant::now();

    loop {
        if start.elapsed().as_secs() > timeout_secs {
            return Err(ClientError::NotReady(format!(
                "no healthy response from {} after {}s",
                health_url, timeout_secs
            )));
        }

        match client.get(&health_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(url = %url, "backend ready");
                return Ok(());
            }
            Ok(resp) => debug!(status = %resp.status(), "backend not ready yet"),
            Err(e) => debug!(error = %e, "backend unreachable"),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
