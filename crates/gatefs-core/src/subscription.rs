//! Remote denylist subscriptions.
//!
//! An [`HttpSubscriber`] keeps a local denylist file in sync with a remote
//! one by periodically requesting the byte range past the local file length
//! and appending whatever comes back. A followed [`crate::Denylist`] on the
//! same file then ingests the appended rules through its normal tail path.

use reqwest::{header, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::time;
use tracing::{debug, info, warn};

use gatefs_types::config::SubscriberConfig;
use gatefs_types::error::{BlockError, Result};

/// Periodic range-fetcher appending a remote denylist to a local file.
pub struct HttpSubscriber {
    pub config: SubscriberConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl HttpSubscriber {
    pub fn new(config: SubscriberConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
        }
    }

    /// Start the refresh task. The first fetch happens immediately; fetch
    /// failures are logged and the subscription keeps running.
    pub fn start(&mut self) {
        if self.shutdown_tx.is_some() {
            return;
        }
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let config = self.config.clone();

        tokio::spawn(async move {
            let client = reqwest::Client::new();
            info!(
                url = %config.remote_url,
                file = %config.local_file.display(),
                "denylist subscription started"
            );
            loop {
                match download_and_append(&client, &config).await {
                    Ok(0) => {}
                    Ok(n) => {
                        info!(file = %config.local_file.display(), bytes = n, "appended remote denylist data");
                    }
                    Err(e) => {
                        warn!(url = %config.remote_url, %e, "denylist fetch failed");
                    }
                }
                tokio::select! {
                    _ = time::sleep(config.interval) => {}
                    _ = &mut shutdown_rx => {
                        debug!(url = %config.remote_url, "denylist subscription stopped");
                        return;
                    }
                }
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
    }

    /// Stop the refresh task. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for HttpSubscriber {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Request the bytes past the local length and append them. Returns the
/// number of bytes appended.
async fn download_and_append(client: &reqwest::Client, config: &SubscriberConfig) -> Result<u64> {
    let local_len = match tokio::fs::metadata(&config.local_file).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e.into()),
    };

    let resp = client
        .get(&config.remote_url)
        .header(header::RANGE, format!("bytes={local_len}-"))
        .send()
        .await
        .map_err(|e| BlockError::Http(e.to_string()))?;

    match resp.status() {
        StatusCode::PARTIAL_CONTENT => {
            let body = resp
                .bytes()
                .await
                .map_err(|e| BlockError::Http(e.to_string()))?;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.local_file)
                .await?;
            file.write_all(&body).await?;
            file.flush().await?;
            Ok(body.len() as u64)
        }
        // Nothing past the local length on the remote side.
        StatusCode::RANGE_NOT_SATISFIABLE => Ok(0),
        status if status.is_success() => {
            // The server ignored the range request; skip rather than
            // re-append the whole list.
            debug!(url = %config.remote_url, %status, "server ignored range request");
            Ok(0)
        }
        status => Err(BlockError::Http(format!(
            "{}: unexpected status {status}",
            config.remote_url
        ))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    /// Serve canned 206 responses for every connection until dropped.
    async fn spawn_range_server(body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                let body = body.to_vec();
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = sock.read(&mut buf).await;
                    let head = format!(
                        "HTTP/1.1 206 Partial Content\r\n\
                         Content-Length: {}\r\n\
                         Content-Range: bytes 0-{}/{}\r\n\
                         Connection: close\r\n\r\n",
                        body.len(),
                        body.len().saturating_sub(1),
                        body.len()
                    );
                    let _ = sock.write_all(head.as_bytes()).await;
                    let _ = sock.write_all(&body).await;
                });
            }
        });
        format!("http://{addr}/list.deny")
    }

    #[tokio::test]
    async fn appends_partial_content() {
        let url = spawn_range_server(b"/ipfs/QmdWFA9FL52hx3j9EJZPQP1ZUH8Ygi5tLCX2cRDs6knSf8\n").await;
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("list.deny");

        let client = reqwest::Client::new();
        let config = SubscriberConfig::new(url, &local);
        let n = download_and_append(&client, &config).await.unwrap();
        assert!(n > 0);

        let contents = std::fs::read_to_string(&local).unwrap();
        assert!(contents.contains("/ipfs/QmdWFA9FL52hx3j9EJZPQP1ZUH8Ygi5tLCX2cRDs6knSf8"));
    }

    #[tokio::test]
    async fn subscriber_runs_and_stops() {
        let url = spawn_range_server(b"# empty update\n").await;
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("list.deny");

        let mut config = SubscriberConfig::new(url, &local);
        config.interval = Duration::from_millis(50);

        let mut sub = HttpSubscriber::new(config);
        assert!(!sub.is_running());
        sub.start();
        assert!(sub.is_running());

        // Wait for the first fetch to land.
        for _ in 0..100 {
            if local.exists() {
                break;
            }
            time::sleep(Duration::from_millis(20)).await;
        }
        assert!(local.exists());

        sub.stop();
        sub.stop();
        assert!(!sub.is_running());
    }
}
