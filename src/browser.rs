//! Headless Chromium session used to render operator pages

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::extract::LANDMARK_SELECTOR;

const LANDMARK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Something that can turn a URL into rendered page HTML
#[async_trait(?Send)]
pub trait PageLoader {
    async fn load(&mut self, url: &str) -> Result<String, ScrapeError>;
}

/// Page-load and landmark wait limits
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub page_load: Duration,
    pub landmark: Duration,
}

/// One browser with a single working tab and a throwaway profile.
///
/// The profile directory lives as long as the session and is removed when
/// the session is dropped, even if closing the browser failed.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    timeouts: Timeouts,
    // Fields drop in declaration order. `browser` kills Chromium on drop, so
    // this must stay last for the directory to outlive the process using it.
    profile_dir: TempDir,
}

impl BrowserSession {
    /// Launch Chromium on a fresh profile. `executable` overrides the
    /// browser found on the system.
    pub async fn launch(timeouts: Timeouts, executable: Option<&Path>) -> Result<Self> {
        let profile_dir = tempfile::Builder::new()
            .prefix("outage-tracker-profile-")
            .tempdir()
            .context("Failed to create browser profile directory")?;
        Self::launch_in(profile_dir, timeouts, executable).await
    }

    /// Takes ownership of the profile so it is removed if launching fails
    async fn launch_in(
        profile_dir: TempDir,
        timeouts: Timeouts,
        executable: Option<&Path>,
    ) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .user_data_dir(profile_dir.path())
            .request_timeout(timeouts.page_load);
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        info!(profile = %profile_dir.path().display(), "launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;

        Ok(Self {
            browser,
            page,
            handler_task,
            timeouts,
            profile_dir,
        })
    }

    async fn wait_for_landmark(&self) -> Result<(), ScrapeError> {
        let wait = async {
            loop {
                if self.page.find_element(LANDMARK_SELECTOR).await.is_ok() {
                    return;
                }
                tokio::time::sleep(LANDMARK_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(self.timeouts.landmark, wait)
            .await
            .map_err(|_| ScrapeError::LandmarkTimeout {
                selector: LANDMARK_SELECTOR.to_string(),
                secs: self.timeouts.landmark.as_secs(),
            })
    }

    /// Close the browser. Failures are logged; the profile is removed on drop.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.handler_task.abort();
        debug!(profile = %self.profile_dir.path().display(), "removing browser profile");
    }
}

#[async_trait(?Send)]
impl PageLoader for BrowserSession {
    async fn load(&mut self, url: &str) -> Result<String, ScrapeError> {
        match tokio::time::timeout(self.timeouts.page_load, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(ScrapeError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ScrapeError::PageLoadTimeout {
                    url: url.to_string(),
                    secs: self.timeouts.page_load.as_secs(),
                })
            }
        }

        self.wait_for_landmark().await?;

        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeouts() -> Timeouts {
        Timeouts {
            page_load: Duration::from_secs(5),
            landmark: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_profile_removed_when_launch_fails() {
        let profile_dir = tempfile::Builder::new()
            .prefix("outage-tracker-profile-")
            .tempdir()
            .unwrap();
        let profile_path = profile_dir.path().to_path_buf();
        assert!(profile_path.exists());

        let missing = Path::new("/nonexistent/outage-tracker/chromium");
        let result = BrowserSession::launch_in(profile_dir, timeouts(), Some(missing)).await;

        assert!(result.is_err());
        assert!(!profile_path.exists());
    }

    #[tokio::test]
    async fn test_launch_with_missing_executable_is_error() {
        let missing = Path::new("/nonexistent/outage-tracker/chromium");
        assert!(BrowserSession::launch(timeouts(), Some(missing)).await.is_err());
    }
}
