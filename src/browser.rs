use std::cell::Cell;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use scraper::Html;
use tracing::debug;

use crate::error::ExtractError;
use crate::settings::Settings;

/// Something that can load a URL and hand back the rendered HTML.
// Only implemented and awaited inside this binary; no Send bound is needed.
#[allow(async_fn_in_trait)]
pub trait Navigator {
    async fn fetch(&self, url: &str) -> Result<String, ExtractError>;
}

/// Plain HTTP navigation; the ranking and lookup pages are server-rendered.
pub struct HttpNavigator {
    client: reqwest::Client,
}

impl HttpNavigator {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.wait_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Navigator for HttpNavigator {
    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        let navigation = |e: reqwest::Error| ExtractError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };
        self.client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(navigation)?
            .text()
            .await
            .map_err(navigation)
    }
}

/// A loaded page. The body is kept as text and parsed on demand.
pub struct Page {
    pub url: String,
    body: String,
}

impl Page {
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Exclusive handle on a navigator, with the wait policy applied to every
/// navigation. Dropping it ends the session.
pub struct Browser<N> {
    navigator: N,
    timeout: Duration,
    visits: Cell<usize>,
}

impl<N: Navigator> Browser<N> {
    pub fn new(navigator: N, timeout: Duration) -> Self {
        Self {
            navigator,
            timeout,
            visits: Cell::new(0),
        }
    }

    pub fn from_settings(navigator: N, settings: &Settings) -> Self {
        Self::new(navigator, settings.wait_timeout())
    }

    /// Load `url` once, bounded by the timeout, and hand the page back only
    /// if `ready` holds for that document. Pages are never re-requested.
    pub async fn open_when<F>(&self, url: &str, what: &str, ready: F) -> Result<Page, ExtractError>
    where
        F: Fn(&Html) -> bool,
    {
        let start = Instant::now();
        debug!("Visiting: {}", url);
        self.visits.set(self.visits.get() + 1);
        let body = tokio::time::timeout(self.timeout, self.navigator.fetch(url))
            .await
            .map_err(|_| ExtractError::Timeout {
                url: url.to_string(),
                waited: start.elapsed(),
            })??;

        if !ready(&Html::parse_document(&body)) {
            debug!("{} not present on {}", what, url);
            return Err(ExtractError::ElementMissing(format!("{} on {}", what, url)));
        }
        Ok(Page {
            url: url.to_string(),
            body,
        })
    }

    pub fn visits(&self) -> usize {
        self.visits.get()
    }
}

impl<N> Drop for Browser<N> {
    fn drop(&mut self) {
        debug!("Browser closed after {} page loads", self.visits.get());
    }
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    use super::*;

    /// Serves canned HTML per URL. A URL may be given several bodies, served
    /// in order, the last one repeating.
    #[derive(Default)]
    pub struct FixtureNavigator {
        pages: RefCell<HashMap<String, VecDeque<String>>>,
    }

    impl FixtureNavigator {
        pub fn with_page(self, url: &str, html: impl Into<String>) -> Self {
            self.pages
                .borrow_mut()
                .entry(url.to_string())
                .or_default()
                .push_back(html.into());
            self
        }

        pub fn with_fixture(self, url: &str, name: &str) -> Self {
            let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
            self.with_page(url, html)
        }
    }

    impl Navigator for FixtureNavigator {
        async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
            let mut pages = self.pages.borrow_mut();
            let bodies = pages.get_mut(url).ok_or_else(|| ExtractError::Navigation {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })?;
            let body = if bodies.len() > 1 {
                bodies.pop_front()
            } else {
                bodies.front().cloned()
            };
            Ok(body.unwrap_or_default())
        }
    }

    pub fn browser(navigator: FixtureNavigator) -> Browser<FixtureNavigator> {
        Browser::new(navigator, Duration::from_secs(5))
    }
}
