//! Remote source retrieval.
//!
//! [`Fetcher`] is the seam the ingestion pipeline depends on; [`HttpFetcher`]
//! is the production implementation on top of `reqwest`'s blocking client.
//! [`fetch_all`] retrieves several URLs concurrently on scoped threads and
//! hands results back in the order the URLs were given.

use std::{thread, time::Duration};

use log::debug;
use reqwest::header::CONTENT_TYPE;

use crate::{
    error::{ReportError, Result},
    merge::SourceInput,
};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("sales-report/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub trait Fetcher: Send + Sync {
    /// Fails with [`ReportError::SourceFetch`] on transport errors and
    /// non-2xx responses.
    fn fetch(&self, url: &str) -> Result<FetchedBody>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn fetch(&self, url: &str) -> Result<FetchedBody> {
        (**self).fetch(url)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| ReportError::fetch("<client>", err))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedBody> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| ReportError::fetch(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::fetch(url, format!("HTTP status {status}")));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .map_err(|err| ReportError::fetch(url, err))?
            .to_vec();
        debug!(
            "Fetched {} byte(s) from {url} (content type {:?})",
            bytes.len(),
            content_type
        );
        Ok(FetchedBody {
            bytes,
            content_type,
        })
    }
}

/// Fetches every URL concurrently. Completion order is irrelevant: the
/// returned inputs line up with `urls`, and on failure the error of the
/// earliest failing URL is returned.
pub fn fetch_all<F>(fetcher: &F, urls: &[String]) -> Result<Vec<SourceInput>>
where
    F: Fetcher + ?Sized,
{
    if urls.is_empty() {
        return Ok(Vec::new());
    }
    let mut results: Vec<Option<Result<FetchedBody>>> = Vec::with_capacity(urls.len());
    results.resize_with(urls.len(), || None);
    thread::scope(|scope| {
        let handles = urls
            .iter()
            .enumerate()
            .map(|(idx, url)| (idx, scope.spawn(move || fetcher.fetch(url))))
            .collect::<Vec<_>>();
        for (idx, handle) in handles {
            let result = handle.join().unwrap_or_else(|_| {
                Err(ReportError::fetch(
                    urls[idx].as_str(),
                    "fetch worker panicked",
                ))
            });
            results[idx] = Some(result);
        }
    });

    urls.iter()
        .zip(results)
        .map(|(url, result)| {
            let body = result
                .unwrap_or_else(|| Err(ReportError::fetch(url.as_str(), "fetch did not run")))?;
            Ok(SourceInput::url(url.clone(), body.content_type, body.bytes))
        })
        .collect()
}
