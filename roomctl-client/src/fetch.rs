//! Pulling the device list over HTTP.

use roomctl_state::DeviceView;

use crate::cache::ClientCache;
use crate::error::{ClientError, Result};

/// `GET {http_base}/device`.
pub async fn fetch_devices(http: &reqwest::Client, http_base: &str) -> Result<Vec<DeviceView>> {
    let url = format!("{}/device", http_base.trim_end_matches('/'));
    let response = http.get(&url).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::InvalidResponse(format!("{status}: {body}")));
    }

    response
        .json::<Vec<DeviceView>>()
        .await
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

/// Fetch the device list and apply it to `cache` as a full snapshot.
pub async fn sync_cache(
    http: &reqwest::Client,
    http_base: &str,
    cache: &ClientCache,
) -> Result<usize> {
    let devices = fetch_devices(http, http_base).await?;
    let count = devices.len();
    cache.replace_all(devices);
    tracing::debug!(count, "device list synced over http");
    Ok(count)
}
