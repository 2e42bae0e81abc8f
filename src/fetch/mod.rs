// src/fetch/mod.rs
//! Page loading with a wait-for-marker retry loop.
//!
//! A page counts as loaded once an element matching the marker selector
//! is present. Until then the fetcher pauses, refreshes and re-checks.
//! Anything that goes wrong while opening, navigating or refreshing is
//! fatal for that URL. A page the server refused to serve (for example a
//! 503) only counts as "not ready" when a marker is being waited for.

pub mod http;

use anyhow::Result as AnyResult;
use scraper::{Html, Selector};
use std::{fmt::Display, sync::Arc, thread, time::Duration};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{PipelineError, Result};

/// One browsing session. Opened per fetch, closed exactly once.
pub trait PageSession: Send {
    fn navigate(&mut self, url: &Url) -> AnyResult<()>;
    /// Reissue the last navigation.
    fn refresh(&mut self) -> AnyResult<()>;
    /// Current page markup.
    fn markup(&self) -> AnyResult<String>;
    /// Whether the last navigation or refresh produced a real page.
    fn loaded(&self) -> bool {
        true
    }
    fn close(&mut self);
}

pub trait SessionFactory: Send + Sync {
    fn open(&self) -> AnyResult<Box<dyn PageSession>>;
}

/// Closes the session when dropped, on every exit path.
struct SessionGuard(Box<dyn PageSession>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// Refreshes allowed after the first check; `None` is unbounded.
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

enum LoadState {
    Loading { attempt: u32 },
    Ready(String),
    Fatal(PipelineError),
}

fn fatal(url: &str, err: impl Display) -> PipelineError {
    PipelineError::FatalFetch {
        url: url.to_string(),
        reason: format!("{:#}", err),
    }
}

fn parse_marker(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| PipelineError::Selector {
        selector: s.to_string(),
        reason: format!("{:?}", e),
    })
}

#[derive(Clone)]
pub struct PageFetcher {
    factory: Arc<dyn SessionFactory>,
    retry: RetryPolicy,
}

impl PageFetcher {
    pub fn new(factory: Arc<dyn SessionFactory>, retry: RetryPolicy) -> Self {
        Self { factory, retry }
    }

    /// Load `url` and return its markup once `marker` is present.
    ///
    /// With no marker the page is ready as soon as navigation succeeds.
    #[instrument(level = "debug", skip(self))]
    pub fn fetch(&self, url: &str, marker: Option<&str>) -> Result<String> {
        let target = Url::parse(url).map_err(|e| fatal(url, e))?;
        let marker = marker.map(parse_marker).transpose()?;

        let mut session = SessionGuard(self.factory.open().map_err(|e| fatal(url, e))?);
        session.0.navigate(&target).map_err(|e| fatal(url, e))?;

        let mut state = LoadState::Loading { attempt: 1 };
        loop {
            state = match state {
                LoadState::Loading { attempt } => {
                    self.check(session.0.as_mut(), url, marker.as_ref(), attempt)
                }
                LoadState::Ready(markup) => return Ok(markup),
                LoadState::Fatal(err) => return Err(err),
            };
        }
    }

    /// One transition out of `Loading`.
    fn check(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        marker: Option<&Selector>,
        attempt: u32,
    ) -> LoadState {
        let markup = match session.markup() {
            Ok(m) => m,
            Err(e) => return LoadState::Fatal(fatal(url, e)),
        };

        let ready = match marker {
            Some(sel) => {
                session.loaded() && Html::parse_document(&markup).select(sel).next().is_some()
            }
            None if !session.loaded() => {
                return LoadState::Fatal(fatal(url, "server did not return the page"))
            }
            None => true,
        };
        if ready {
            debug!(attempt, "page ready");
            return LoadState::Ready(markup);
        }

        if let Some(max) = self.retry.max_retries {
            if attempt > max {
                return LoadState::Fatal(PipelineError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                });
            }
        }

        warn!(attempt, wait = ?self.retry.interval, "page marker missing, refreshing");
        thread::sleep(self.retry.interval);
        match session.refresh() {
            Ok(()) => LoadState::Loading {
                attempt: attempt.saturating_add(1),
            },
            Err(e) => LoadState::Fatal(fatal(url, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const READY: &str = r#"<html><body><div id="header-logo"></div><p>statement</p></body></html>"#;
    const LOADING: &str = r#"<html><body><p>please wait</p></body></html>"#;

    /// Scripted session: the marker appears on check number `ready_on`,
    /// refresh number `fail_refresh_on` errors out.
    struct FakeSession {
        checks: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        ready_on: Option<usize>,
        fail_refresh_on: Option<usize>,
        fail_navigate: bool,
        unloaded: bool,
        refreshes: usize,
    }

    impl PageSession for FakeSession {
        fn navigate(&mut self, _url: &Url) -> AnyResult<()> {
            if self.fail_navigate {
                Err(anyhow!("connection refused"))
            } else {
                Ok(())
            }
        }

        fn refresh(&mut self) -> AnyResult<()> {
            self.refreshes += 1;
            if Some(self.refreshes) == self.fail_refresh_on {
                return Err(anyhow!("browser crashed"));
            }
            Ok(())
        }

        fn markup(&self) -> AnyResult<String> {
            let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
            if matches!(self.ready_on, Some(r) if n >= r) {
                Ok(READY.into())
            } else {
                Ok(LOADING.into())
            }
        }

        fn loaded(&self) -> bool {
            !self.unloaded
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        checks: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        ready_on: Option<usize>,
        fail_refresh_on: Option<usize>,
        fail_navigate: bool,
        unloaded: bool,
    }

    impl SessionFactory for FakeFactory {
        fn open(&self) -> AnyResult<Box<dyn PageSession>> {
            Ok(Box::new(FakeSession {
                checks: self.checks.clone(),
                closes: self.closes.clone(),
                ready_on: self.ready_on,
                fail_refresh_on: self.fail_refresh_on,
                fail_navigate: self.fail_navigate,
                unloaded: self.unloaded,
                refreshes: 0,
            }))
        }
    }

    fn fetcher(factory: Arc<FakeFactory>, max_retries: Option<u32>) -> PageFetcher {
        PageFetcher::new(
            factory,
            RetryPolicy {
                interval: Duration::ZERO,
                max_retries,
            },
        )
    }

    #[test]
    fn waits_for_marker() -> Result<()> {
        let factory = Arc::new(FakeFactory {
            ready_on: Some(4),
            ..Default::default()
        });
        let html = fetcher(factory.clone(), None).fetch("https://example.com/q/AAPL", Some("#header-logo"))?;
        assert!(html.contains("statement"));
        assert_eq!(factory.checks.load(Ordering::SeqCst), 4);
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn no_marker_means_ready_immediately() -> Result<()> {
        let factory = Arc::new(FakeFactory::default());
        let html = fetcher(factory.clone(), Some(0)).fetch("https://example.com/index", None)?;
        assert_eq!(html, LOADING);
        assert_eq!(factory.checks.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn unbounded_retry_stops_only_on_fatal_refresh() {
        // marker never appears; the tenth refresh fails
        let factory = Arc::new(FakeFactory {
            fail_refresh_on: Some(10),
            ..Default::default()
        });
        let err = fetcher(factory.clone(), None)
            .fetch("https://example.com/q/AAPL", Some("#header-logo"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::FatalFetch { .. }));
        assert_eq!(factory.checks.load(Ordering::SeqCst), 10);
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capped_retry_is_distinguishable() {
        let factory = Arc::new(FakeFactory::default());
        let err = fetcher(factory.clone(), Some(2))
            .fetch("https://example.com/q/AAPL", Some("#header-logo"))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(factory.checks.load(Ordering::SeqCst), 3);
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn navigation_failure_is_fatal_and_closes() {
        let factory = Arc::new(FakeFactory {
            fail_navigate: true,
            ..Default::default()
        });
        let err = fetcher(factory.clone(), None)
            .fetch("https://example.com/q/AAPL", Some("#header-logo"))
            .unwrap_err();
        assert!(err.is_fetch());
        assert_eq!(factory.checks.load(Ordering::SeqCst), 0);
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_url_never_opens_a_session() {
        let factory = Arc::new(FakeFactory::default());
        let err = fetcher(factory.clone(), None)
            .fetch("not a url", None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::FatalFetch { .. }));
        assert_eq!(factory.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unloaded_page_without_marker_is_fatal() {
        let factory = Arc::new(FakeFactory {
            unloaded: true,
            ..Default::default()
        });
        let err = fetcher(factory.clone(), None)
            .fetch("https://example.com/index", None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::FatalFetch { .. }));
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unloaded_page_with_marker_is_retried() {
        // marker markup is served but the status said otherwise
        let factory = Arc::new(FakeFactory {
            ready_on: Some(1),
            unloaded: true,
            ..Default::default()
        });
        let err = fetcher(factory.clone(), Some(1))
            .fetch("https://example.com/q/AAPL", Some("#header-logo"))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RetriesExhausted { attempts: 2, .. }
        ));
    }

    #[test]
    fn attempt_counter_saturates() {
        let factory = FakeFactory::default();
        let mut session = factory.open().expect("fake session");
        let marker = parse_marker("#header-logo").expect("valid selector");
        let next = fetcher(Arc::new(FakeFactory::default()), None).check(
            session.as_mut(),
            "https://example.com/q/AAPL",
            Some(&marker),
            u32::MAX,
        );
        assert!(matches!(next, LoadState::Loading { attempt: u32::MAX }));
    }
}
