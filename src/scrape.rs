use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::{BrowserSession, PageLoader};
use crate::config::Config;
use crate::extract::parse_page;
use crate::types::{OperatorTarget, ScrapeResult};

/// Scrape every target in order with one loader.
///
/// A failing target is recorded as a failed result and the loop moves on.
/// `delay` is slept between targets, not after the last one.
pub async fn scrape_targets<L: PageLoader>(
    loader: &mut L,
    targets: &[OperatorTarget],
    delay: Duration,
) -> Vec<ScrapeResult> {
    let total = targets.len();
    let mut results = Vec::with_capacity(total);

    for (i, target) in targets.iter().enumerate() {
        info!("[{:02}/{:02}] Scraping {} ({})", i + 1, total, target.name, target.url);

        let outcome = match loader.load(&target.url).await {
            Ok(html) => parse_page(&html),
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(stats) => {
                info!(
                    operator = %target.name,
                    hourly = stats.hourly_complaints,
                    daily = stats.daily_complaints,
                    complaint_level = stats.complaint_level.as_str(),
                    regions = stats.regions.len(),
                    "scraped"
                );
                ScrapeResult::from_stats(&target.name, stats)
            }
            Err(e) => {
                warn!(operator = %target.name, "scrape failed: {}", e);
                ScrapeResult::failed(&target.name, e.to_string())
            }
        };
        results.push(result);

        if i + 1 < total && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    results
}

/// Launch the browser, scrape all configured operators, and tear it down.
///
/// Runs on its own single-threaded runtime, which is gone again by the time
/// this returns, so callers can use blocking HTTP afterwards.
pub fn run_scrape(config: &Config) -> Result<Vec<ScrapeResult>> {
    let targets = config.targets();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        let mut session =
            BrowserSession::launch(config.timeouts(), config.chrome_executable.as_deref()).await?;
        let results = scrape_targets(&mut session, &targets, config.delay()).await;
        session.close().await;
        Ok::<_, anyhow::Error>(results)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::sheets::sync_snapshot;
    use crate::sheets::testing::MemorySheet;
    use crate::types::{collect_metrics, Cell, ComplaintLevel};
    use async_trait::async_trait;
    use std::collections::HashMap;

    const GOOD_PAGE: &str = r#"<div class="social">
        За последний час <em>4</em> жалоб, за сутки <em>40</em>. Жалоб мало.
      </div>"#;

    /// Serves canned pages; unknown URLs fail navigation
    struct ScriptedLoader {
        pages: HashMap<String, String>,
        visited: Vec<String>,
    }

    impl ScriptedLoader {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, h)| (u.to_string(), h.to_string()))
                    .collect(),
                visited: Vec::new(),
            }
        }
    }

    #[async_trait(?Send)]
    impl PageLoader for ScriptedLoader {
        async fn load(&mut self, url: &str) -> Result<String, ScrapeError> {
            self.visited.push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ScrapeError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                })
        }
    }

    fn six_targets() -> Vec<OperatorTarget> {
        (1..=6)
            .map(|i| OperatorTarget::new(format!("Op{}", i), format!("https://example.test/op{}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_landmark_on_every_target() {
        let targets = six_targets();
        let blank = "<html><body><p>checking your browser</p></body></html>";
        let pages: Vec<(&str, &str)> = targets.iter().map(|t| (t.url.as_str(), blank)).collect();
        let mut loader = ScriptedLoader::new(&pages);

        let results = scrape_targets(&mut loader, &targets, Duration::ZERO).await;

        assert_eq!(results.len(), 6);
        for result in &results {
            assert_eq!(result.complaint_level, ComplaintLevel::Unknown);
            assert_eq!(result.hourly_complaints, 0);
            assert_eq!(result.daily_complaints, 0);
            let text = result.regions.to_cell_text();
            assert!(text.starts_with("Error: "));
            assert!(text.len() > "Error: ".len());
        }
    }

    #[tokio::test]
    async fn test_navigation_failure_does_not_stop_the_run() {
        let targets = six_targets();
        // op3 is not served, so navigation fails for it
        let pages: Vec<(&str, &str)> = targets
            .iter()
            .filter(|t| t.name != "Op3")
            .map(|t| (t.url.as_str(), GOOD_PAGE))
            .collect();
        let mut loader = ScriptedLoader::new(&pages);

        let results = scrape_targets(&mut loader, &targets, Duration::ZERO).await;

        assert_eq!(loader.visited.len(), 6);
        assert_eq!(results.len(), 6);
        for result in &results {
            if result.operator == "Op3" {
                assert!(result.regions.is_failed());
                assert!(result
                    .regions
                    .to_cell_text()
                    .contains("net::ERR_NAME_NOT_RESOLVED"));
            } else {
                assert_eq!(result.hourly_complaints, 4);
                assert_eq!(result.daily_complaints, 40);
                assert_eq!(result.complaint_level, ComplaintLevel::Low);
            }
        }

        let metrics = collect_metrics(&results);
        assert_eq!(metrics.len(), 24);
        assert!(metrics.contains(&("Op3 - Hourly complaints".to_string(), Cell::Number(0))));
        assert!(metrics.contains(&("Op3 - Complaint level".to_string(), Cell::from("Unknown"))));
    }

    #[tokio::test]
    async fn test_failed_target_still_commits_one_update() {
        let targets = six_targets();
        let pages: Vec<(&str, &str)> = targets
            .iter()
            .filter(|t| t.name != "Op5")
            .map(|t| (t.url.as_str(), GOOD_PAGE))
            .collect();
        let mut loader = ScriptedLoader::new(&pages);
        let results = scrape_targets(&mut loader, &targets, Duration::ZERO).await;

        let store = MemorySheet::default();
        let metrics = collect_metrics(&results);
        let grid = sync_snapshot(&store, "Sheet1", "Operator/Metric", "t1", &metrics).unwrap();

        assert_eq!(store.updates.get(), 1);
        assert_eq!(grid.len(), 25);
        assert!(grid.iter().all(|row| row.len() == 2));
        assert!(grid.contains(&vec![
            Cell::from("Op1 - Daily complaints"),
            Cell::Number(40)
        ]));
        let failed = grid
            .iter()
            .find(|row| row[0] == Cell::from("Op5 - Regions"))
            .unwrap();
        assert!(failed[1].as_str().unwrap().starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_targets_visited_in_order() {
        let targets = six_targets();
        let pages: Vec<(&str, &str)> = targets.iter().map(|t| (t.url.as_str(), GOOD_PAGE)).collect();
        let mut loader = ScriptedLoader::new(&pages);

        scrape_targets(&mut loader, &targets, Duration::ZERO).await;

        let expected: Vec<String> = targets.iter().map(|t| t.url.clone()).collect();
        assert_eq!(loader.visited, expected);
    }
}
