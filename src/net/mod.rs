//! HTTP transport shared by the remote sources.
//!
//! Every request races the caller's cancellation token so an aborted search
//! drops its connection instead of waiting for the timeout.

use crate::config::NetworkConfig;
use crate::error::{SourceError, SourceResult};
use anyhow::Context;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
}

impl HttpClient {
    pub fn new(cfg: &NetworkConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build reqwest client")?;
        Ok(Self { http })
    }

    /// GET `url` and decode the JSON body. `Ok(None)` on 404.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        abort: &CancellationToken,
    ) -> SourceResult<Option<T>> {
        match self.get_text(url, abort).await? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// GET `url` and return the body as text. `Ok(None)` on 404.
    pub async fn get_text(
        &self,
        url: &str,
        abort: &CancellationToken,
    ) -> SourceResult<Option<String>> {
        tracing::debug!("GET {url}");
        cancellable(abort, async {
            let response = self.http.get(url).send().await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(SourceError::Status(status.as_u16()));
            }
            Ok(Some(response.text().await?))
        })
        .await
    }
}

/// Run `fut` unless `abort` fires first.
pub async fn cancellable<T, F>(abort: &CancellationToken, fut: F) -> SourceResult<T>
where
    F: Future<Output = SourceResult<T>>,
{
    if abort.is_cancelled() {
        return Err(SourceError::Cancelled);
    }
    tokio::select! {
        _ = abort.cancelled() => Err(SourceError::Cancelled),
        result = fut => result,
    }
}
