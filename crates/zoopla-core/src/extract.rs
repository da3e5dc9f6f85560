use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{ExtractionTarget, Record, RecordKind};
use crate::proxy::ProxyRotator;
use crate::traits::{Fetcher, RecordParser};

/// Concurrency and cap settings for one extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Maximum number of pages fetched at the same time.
    pub concurrency: usize,
    /// Stop once this many records have been collected. `None` = unbounded.
    pub max_items: Option<usize>,
}

impl ExtractorConfig {
    /// Builds a config, clamping concurrency to at least 1 and treating a
    /// cap of 0 as unbounded.
    pub fn new(concurrency: usize, max_items: Option<usize>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            max_items: max_items.filter(|&n| n > 0),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_items: None,
        }
    }
}

/// Events emitted by the extractor for monitoring/logging.
#[derive(Debug)]
pub enum ExtractionEvent<'a> {
    Started {
        kind: RecordKind,
        urls: usize,
    },
    NoUrls {
        kind: RecordKind,
    },
    PageParsed {
        url: &'a str,
        records: usize,
    },
    PageFailed {
        url: &'a str,
        error: &'a AppError,
    },
    TaskPanicked {
        error: &'a str,
    },
    CapReached {
        max_items: usize,
        abandoned: usize,
    },
    Finished {
        kind: RecordKind,
        records: usize,
        failed: usize,
    },
}

/// Trait for receiving extraction events (decoupled logging).
pub trait ExtractionReporter: Send + Sync {
    fn report(&self, event: ExtractionEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingExtractionReporter;

impl ExtractionReporter for TracingExtractionReporter {
    fn report(&self, event: ExtractionEvent<'_>) {
        match event {
            ExtractionEvent::Started { kind, urls } => {
                tracing::info!(%kind, urls, "Extracting from {} URL(s)", urls);
            }
            ExtractionEvent::NoUrls { kind } => {
                tracing::warn!(%kind, "No {} URLs provided; nothing to extract", kind);
            }
            ExtractionEvent::PageParsed { url, records } => {
                tracing::info!(%url, records, "Parsed {} record(s)", records);
            }
            ExtractionEvent::PageFailed { url, error } => {
                tracing::error!(%url, %error, "Request failed");
            }
            ExtractionEvent::TaskPanicked { error } => {
                tracing::error!(%error, "Extraction task panicked");
            }
            ExtractionEvent::CapReached {
                max_items,
                abandoned,
            } => {
                tracing::info!(
                    max_items,
                    abandoned,
                    "Reached max_items limit ({}); stopping early",
                    max_items
                );
            }
            ExtractionEvent::Finished {
                kind,
                records,
                failed,
            } => {
                tracing::info!(%kind, records, failed, "Extraction finished");
            }
        }
    }
}

/// What a single fetch-and-parse task produced.
enum PageOutcome {
    Parsed { url: String, records: Vec<Record> },
    Failed { url: String, error: AppError },
    /// The run was cancelled before this task got a worker slot.
    Skipped,
}

/// Fetches a set of URLs concurrently and parses each page into records.
///
/// Generic over the fetcher and parser so the orchestration can be tested
/// without real HTTP. One URL failing never fails the run: the error is
/// reported and the URL contributes no records.
pub struct ConcurrentExtractor<F, P>
where
    F: Fetcher,
    P: RecordParser,
{
    fetcher: F,
    parser: P,
    proxies: Arc<ProxyRotator>,
    config: ExtractorConfig,
}

impl<F, P> ConcurrentExtractor<F, P>
where
    F: Fetcher,
    P: RecordParser,
{
    pub fn new(fetcher: F, parser: P, proxies: Arc<ProxyRotator>, config: ExtractorConfig) -> Self {
        Self {
            fetcher,
            parser,
            proxies,
            config,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.parser.kind()
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract records from `urls`, logging progress through `tracing`.
    pub async fn extract(&self, urls: &[String]) -> Vec<Record> {
        self.extract_with(urls, &TracingExtractionReporter).await
    }

    /// Extract from the targets whose kind matches this extractor's parser.
    pub async fn extract_targets(&self, targets: &[ExtractionTarget]) -> Vec<Record> {
        let kind = self.kind();
        let urls: Vec<String> = targets
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.url.clone())
            .collect();
        self.extract(&urls).await
    }

    /// Extract records from `urls`, sending events to `reporter`.
    ///
    /// Records come back in completion order. When `max_items` is set, the
    /// run stops as soon as that many records are collected: the batch that
    /// crossed the cap keeps its leading records, queued tasks are cancelled
    /// before fetching and in-flight tasks are left to finish unobserved.
    pub async fn extract_with<R: ExtractionReporter>(
        &self,
        urls: &[String],
        reporter: &R,
    ) -> Vec<Record> {
        let kind = self.kind();
        let urls: Vec<String> = urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();

        if urls.is_empty() {
            reporter.report(ExtractionEvent::NoUrls { kind });
            return Vec::new();
        }

        reporter.report(ExtractionEvent::Started {
            kind,
            urls: urls.len(),
        });

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for url in urls {
            let fetcher = self.fetcher.clone();
            let parser = self.parser.clone();
            let proxies = Arc::clone(&self.proxies);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return PageOutcome::Skipped,
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return PageOutcome::Skipped,
                    },
                };

                let proxy = proxies.next();
                tracing::debug!(%url, proxy = ?proxy.as_ref().map(|p| p.as_str()), "Fetching page");

                match fetcher.fetch(&url, proxy.as_ref()).await {
                    Ok(html) => {
                        let records = parser.parse(&html);
                        PageOutcome::Parsed { url, records }
                    }
                    Err(error) => PageOutcome::Failed { url, error },
                }
            });
        }

        let mut results: Vec<Record> = Vec::new();
        let mut failed = 0usize;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(PageOutcome::Parsed { url, records }) => {
                    reporter.report(ExtractionEvent::PageParsed {
                        url: &url,
                        records: records.len(),
                    });
                    results.extend(records);
                }
                Ok(PageOutcome::Failed { url, error }) => {
                    failed += 1;
                    reporter.report(ExtractionEvent::PageFailed {
                        url: &url,
                        error: &error,
                    });
                }
                Ok(PageOutcome::Skipped) => {}
                Err(e) => {
                    failed += 1;
                    let error = e.to_string();
                    reporter.report(ExtractionEvent::TaskPanicked { error: &error });
                }
            }

            if let Some(max_items) = self.config.max_items {
                if results.len() >= max_items {
                    cancel.cancel();
                    results.truncate(max_items);
                    let abandoned = tasks.len();
                    tasks.detach_all();
                    reporter.report(ExtractionEvent::CapReached {
                        max_items,
                        abandoned,
                    });
                    break;
                }
            }
        }

        reporter.report(ExtractionEvent::Finished {
            kind,
            records: results.len(),
            failed,
        });

        results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::models::RecordSource;
    use crate::proxy::ProxyEndpoint;
    use crate::testutil::*;

    /// Reporter that keeps a compact trace of the events it saw.
    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.events()
                .iter()
                .filter(|e| e.starts_with(prefix))
                .count()
        }
    }

    impl ExtractionReporter for RecordingReporter {
        fn report(&self, event: ExtractionEvent<'_>) {
            let line = match event {
                ExtractionEvent::Started { urls, .. } => format!("started:{urls}"),
                ExtractionEvent::NoUrls { .. } => "no_urls".to_string(),
                ExtractionEvent::PageParsed { url, records } => format!("parsed:{url}:{records}"),
                ExtractionEvent::PageFailed { url, .. } => format!("failed:{url}"),
                ExtractionEvent::TaskPanicked { .. } => "panicked".to_string(),
                ExtractionEvent::CapReached { max_items, .. } => format!("cap:{max_items}"),
                ExtractionEvent::Finished { records, failed, .. } => {
                    format!("finished:{records}:{failed}")
                }
            };
            self.events.lock().unwrap().push(line);
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://example.com/page/{i}")).collect()
    }

    fn extractor(
        fetcher: MockFetcher,
        config: ExtractorConfig,
    ) -> ConcurrentExtractor<MockFetcher, MockParser> {
        ConcurrentExtractor::new(
            fetcher,
            MockParser::new(),
            Arc::new(ProxyRotator::disabled()),
            config,
        )
    }

    fn names(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| match r {
                Record::Agent(a) => a.name.clone().unwrap_or_default(),
                other => panic!("unexpected record {other:?}"),
            })
            .collect()
    }

    #[test]
    fn config_clamps_values() {
        let config = ExtractorConfig::new(0, Some(0));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_items, None);
        assert_eq!(ExtractorConfig::default().concurrency, 5);
    }

    #[tokio::test]
    async fn empty_url_list_returns_immediately() {
        let fetcher = MockFetcher::new();
        let reporter = RecordingReporter::default();
        let ex = extractor(fetcher.clone(), ExtractorConfig::default());

        let records = ex.extract_with(&[], &reporter).await;

        assert!(records.is_empty());
        assert_eq!(reporter.events(), vec!["no_urls"]);
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn blank_urls_are_discarded() {
        let fetcher = MockFetcher::new().with_page("https://example.com/a", "a1");
        let ex = extractor(fetcher.clone(), ExtractorConfig::default());

        let input = vec![
            String::new(),
            "   ".to_string(),
            "https://example.com/a".to_string(),
        ];
        let records = ex.extract(&input).await;

        assert_eq!(names(&records), vec!["a1"]);
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn unbounded_run_collects_everything() {
        let mut fetcher = MockFetcher::new();
        for (i, url) in urls(3).iter().enumerate() {
            fetcher = fetcher.with_page(url, &format!("p{i}-a\np{i}-b"));
        }
        let ex = extractor(fetcher, ExtractorConfig::new(2, None));

        let mut got = names(&ex.extract(&urls(3)).await);
        got.sort();

        assert_eq!(got, vec!["p0-a", "p0-b", "p1-a", "p1-b", "p2-a", "p2-b"]);
    }

    #[tokio::test]
    async fn cap_stops_without_waiting_for_slow_pages() {
        let all = urls(10);
        let mut fetcher = MockFetcher::new();
        for (i, url) in all.iter().enumerate() {
            fetcher = fetcher.with_page(url, &format!("record-{i}"));
            if i >= 4 {
                fetcher = fetcher.with_delay(url, Duration::from_secs(3600));
            }
        }
        let reporter = RecordingReporter::default();
        let ex = extractor(fetcher.clone(), ExtractorConfig::new(3, Some(4)));

        let records = tokio::time::timeout(Duration::from_secs(5), ex.extract_with(&all, &reporter))
            .await
            .expect("extractor should stop once the cap is reached");

        assert_eq!(records.len(), 4);
        assert_eq!(reporter.count("cap:4"), 1);
        assert!(reporter.events().contains(&"finished:4:0".to_string()));

        // Give detached tasks a chance to run: queued ones must exit on the
        // cancelled token without fetching.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let requested: Vec<String> = fetcher.requests().into_iter().map(|(url, _)| url).collect();
        assert!(requested.len() <= 4 + 3, "requested {requested:?}");
        for url in &all[..4] {
            assert!(requested.contains(url));
        }
        for url in &all[7..] {
            assert!(!requested.contains(url), "{url} was fetched after the cap");
        }
    }

    #[tokio::test]
    async fn running_fetches_never_exceed_concurrency() {
        let all = urls(10);
        let mut fetcher = MockFetcher::new();
        for (i, url) in all.iter().enumerate() {
            fetcher = fetcher
                .with_page(url, &format!("record-{i}"))
                .with_delay(url, Duration::from_millis(20));
        }
        let ex = extractor(fetcher.clone(), ExtractorConfig::new(3, None));

        let records = ex.extract(&all).await;

        assert_eq!(records.len(), 10);
        assert_eq!(fetcher.requests().len(), 10);
        assert_eq!(fetcher.max_in_flight(), 3);
    }

    #[tokio::test]
    async fn cap_truncates_tail_of_crossing_batch() {
        let fetcher = MockFetcher::new()
            .with_page("https://example.com/a", "a1\na2")
            .with_page("https://example.com/b", "b1\nb2");
        let ex = extractor(fetcher, ExtractorConfig::new(1, Some(3)));

        let input = vec![
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
        ];
        let got = names(&ex.extract(&input).await);

        assert_eq!(got.len(), 3);
        // First page kept whole, only the head of the second page survives.
        let first = &got[0][..1];
        assert!(got[..2].iter().all(|n| n.starts_with(first)));
        assert!(got[2].ends_with('1'));
        assert!(!got[2].starts_with(first));
    }

    #[tokio::test]
    async fn failed_url_does_not_abort_run() {
        let fetcher = MockFetcher::new()
            .with_error("https://example.com/slow", AppError::Timeout(30))
            .with_page("https://example.com/good", "agent-1\nagent-2");
        let reporter = RecordingReporter::default();
        let ex = extractor(fetcher, ExtractorConfig::default());

        let input = vec![
            "https://example.com/slow".to_string(),
            "https://example.com/good".to_string(),
        ];
        let records = ex.extract_with(&input, &reporter).await;

        assert_eq!(names(&records), vec!["agent-1", "agent-2"]);
        assert_eq!(reporter.count("failed:"), 1);
        assert!(reporter.events().contains(&"failed:https://example.com/slow".to_string()));
        assert!(reporter.events().contains(&"finished:2:1".to_string()));
    }

    #[tokio::test]
    async fn proxies_rotate_across_requests() {
        let all = urls(4);
        let mut fetcher = MockFetcher::new();
        for url in &all {
            fetcher = fetcher.with_page(url, "x");
        }
        let rotator = Arc::new(ProxyRotator::new(vec!["p1:80", "p2:80"], true));
        let ex = ConcurrentExtractor::new(
            fetcher.clone(),
            MockParser::new(),
            rotator,
            ExtractorConfig::new(1, None),
        );

        ex.extract(&all).await;

        let used: Vec<Option<ProxyEndpoint>> = fetcher.requests().into_iter().map(|(_, p)| p).collect();
        assert_eq!(used.len(), 4);
        let p1 = used.iter().filter(|p| p.as_ref().map(|p| p.as_str()) == Some("p1:80")).count();
        let p2 = used.iter().filter(|p| p.as_ref().map(|p| p.as_str()) == Some("p2:80")).count();
        assert_eq!((p1, p2), (2, 2));
    }

    #[tokio::test]
    async fn extract_targets_filters_by_kind() {
        let fetcher = MockFetcher::new()
            .with_page("https://example.com/agents", "agent")
            .with_page("https://example.com/homes", "home");
        let ex = extractor(fetcher.clone(), ExtractorConfig::default());

        let targets = vec![
            ExtractionTarget::new("https://example.com/agents", RecordKind::Agent),
            ExtractionTarget::new("https://example.com/homes", RecordKind::Property),
        ];
        let records = ex.extract_targets(&targets).await;

        assert_eq!(names(&records), vec!["agent"]);
        assert_eq!(records[0].source(), RecordSource::Dom);
        assert_eq!(fetcher.requests().len(), 1);
    }
}
