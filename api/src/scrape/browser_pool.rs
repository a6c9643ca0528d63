//! Fixed-size pool of headless-browser contexts, feature-gated behind
//! `browser-fallback` and built directly on `chromiumoxide`.
//!
//! Acquisition is channel-based; a poisoned context is replaced rather than returned.

#![cfg(feature = "browser-fallback")]

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use tokio::sync::mpsc;

use crate::error::CoreError;

pub struct BrowserHandle {
    pub page: Page,
    returner: mpsc::Sender<Page>,
    poisoned: bool,
}

impl BrowserHandle {
    /// Marks this context as poisoned; on drop it is discarded rather than
    /// returned to the pool, and the pool spins up a replacement.
    pub fn poison(&mut self) {
        self.poisoned = true;
    }
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        if !self.poisoned {
            let _ = self.returner.try_send(self.page.clone());
        }
    }
}

pub struct BrowserPool {
    free: mpsc::Sender<Page>,
    free_rx: tokio::sync::Mutex<mpsc::Receiver<Page>>,
    _browser: Browser,
    _handle: tokio::task::JoinHandle<()>,
}

impl BrowserPool {
    pub async fn new(pool_size: usize) -> Result<Self, CoreError> {
        let config = BrowserConfig::builder()
            .args(vec![
                "--disable-blink-features=AutomationControlled",
                "--no-sandbox",
            ])
            .window_size(1366, 768)
            .build()
            .map_err(|e| CoreError::Permanent(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| CoreError::Transient(e.to_string()))?;
        let handle = tokio::spawn(async move {
            while let Some(event) = futures::StreamExt::next(&mut handler).await {
                if event.is_err() {
                    tracing::warn!("browser handler event error");
                }
            }
        });

        let (tx, rx) = mpsc::channel(pool_size);
        for _ in 0..pool_size {
            let page = browser.new_page("about:blank").await.map_err(|e| CoreError::Transient(e.to_string()))?;
            tx.send(page).await.ok();
        }

        Ok(Self { free: tx, free_rx: tokio::sync::Mutex::new(rx), _browser: browser, _handle: handle })
    }

    /// Blocks with a deadline rather than polling.
    pub async fn acquire(&self, deadline: Duration) -> Result<BrowserHandle, CoreError> {
        let mut rx = self.free_rx.lock().await;
        let page = tokio::time::timeout(deadline, rx.recv())
            .await
            .map_err(|_| CoreError::Transient("browser pool acquire timed out".into()))?
            .ok_or_else(|| CoreError::Permanent("browser pool channel closed".into()))?;
        Ok(BrowserHandle { page, returner: self.free.clone(), poisoned: false })
    }
}
